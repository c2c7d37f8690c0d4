use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Cents};

pub type EntryId = i64;

/// What kind of balance-affecting event a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Money credited into an account from outside the system.
    Enrollment,
    /// Money moved between two accounts.
    Transfer,
    /// Money set aside for a pending order.
    Reservation,
    /// A reservation returned to the account on order cancellation.
    CancelReservation,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Enrollment => "enrollment",
            EntryType::Transfer => "transfer",
            EntryType::Reservation => "reservation",
            EntryType::CancelReservation => "cancel_reservation",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "enrollment" => Some(EntryType::Enrollment),
            "transfer" => Some(EntryType::Transfer),
            "reservation" => Some(EntryType::Reservation),
            "cancel_reservation" => Some(EntryType::CancelReservation),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable row of the audit trail.
///
/// Entries are append-only: there is no update or delete anywhere in the
/// crate, and the sequence of entries for an account is the source of
/// truth for how its balance got where it is. Self-referential events
/// (enrollment, reservation, cancel_reservation) carry the same account
/// as sender and receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub entry_type: EntryType,
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: Cents,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for appending a new entry; id and timestamp are assigned by the
/// store.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub entry_type: EntryType,
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: Cents,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_roundtrip() {
        for entry_type in [
            EntryType::Enrollment,
            EntryType::Transfer,
            EntryType::Reservation,
            EntryType::CancelReservation,
        ] {
            let s = entry_type.as_str();
            assert_eq!(EntryType::from_str(s), Some(entry_type));
        }
    }

    #[test]
    fn test_entry_type_unknown() {
        assert_eq!(EntryType::from_str("withdrawal"), None);
        assert_eq!(EntryType::from_str(""), None);
    }
}
