use thiserror::Error;

use crate::domain::{AccountId, Cents, OrderId, ReportPeriod};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("account already exists: {0}")]
    AccountAlreadyExists(AccountId),

    #[error("insufficient funds on account {account_id}: {required} cents required")]
    InsufficientFunds {
        account_id: AccountId,
        required: Cents,
    },

    /// No pending order matches the given id and fields. Deliberately
    /// covers "does not exist", "already paid", "already cancelled" and
    /// "fields don't match" uniformly.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("order already exists: {0}")]
    OrderAlreadyExists(OrderId),

    #[error("transaction already exists")]
    TransactionAlreadyExists,

    #[error("transaction log write failed: {0}")]
    TransactionLogWriteFailed(String),

    #[error("no report for period {0}")]
    ReportNotFound(ReportPeriod),

    #[error("report for period {0} is not available yet")]
    ReportNotAvailable(ReportPeriod),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),
}
