use serde::{Deserialize, Serialize};

use super::Cents;

pub type AccountId = i64;

/// A money-holding account. Accounts are created implicitly by the first
/// credit and are never deleted; the balance is only ever changed through
/// ledger operations, each of which leaves one audit log entry behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: Cents,
}
