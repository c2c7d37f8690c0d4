use tracing::info;

use crate::domain::{
    format_cents, AccountId, Cents, EntryType, LedgerEntry, NewEntry, Order, OrderId, OrderParams,
};
use crate::storage::Repository;

use super::AppError;

/// Page size applied when a history request asks for nothing, zero, or
/// more than the maximum.
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;
pub const MAX_HISTORY_LIMIT: u32 = 100;

/// Application service for the balance/order engine. This is the primary
/// interface for any client (CLI, API, tests). Every multi-step mutation
/// runs inside one unit of work from [`Repository::begin`]: either all of
/// its store writes commit or none do.
pub struct LedgerService {
    repo: Repository,
}

/// Result of a peer transfer, balances in (sender, receiver) order.
#[derive(Debug)]
pub struct TransferResult {
    pub sender_balance: Cents,
    pub receiver_balance: Cents,
}

/// Result of creating an order: the pending order plus the account
/// balance after the reservation.
#[derive(Debug)]
pub struct CreateOrderResult {
    pub order: Order,
    pub balance: Cents,
}

/// One page of an account's audit trail, with the total count of matching
/// entries regardless of pagination.
pub struct HistoryPage {
    pub entries: Vec<LedgerEntry>,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistorySort {
    Date,
    Amount,
}

/// Pagination and ordering for history listings.
#[derive(Debug, Clone, Copy)]
pub struct HistoryFilter {
    pub limit: u32,
    pub offset: u32,
    pub sort: HistorySort,
    pub descending: bool,
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self {
            limit: DEFAULT_HISTORY_LIMIT,
            offset: 0,
            sort: HistorySort::Date,
            descending: false,
        }
    }
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    // ========================
    // Account operations
    // ========================

    /// Credit an account, creating it first if this is its first credit.
    /// Appends one `enrollment` log entry in the same unit of work and
    /// returns the resulting balance.
    pub async fn credit(&self, account_id: AccountId, amount: Cents) -> Result<Cents, AppError> {
        if amount < 0 {
            return Err(AppError::InvalidAmount(format!(
                "credit amount must not be negative, got {amount}"
            )));
        }

        let mut tx = self.repo.begin().await?;

        let balance = match Repository::add_balance(&mut tx, account_id, amount).await? {
            Some(balance) => balance,
            None => {
                // First credit opens the account, then the increase is
                // applied to the fresh row.
                Repository::create_account(&mut tx, account_id).await?;
                Repository::add_balance(&mut tx, account_id, amount)
                    .await?
                    .ok_or(AppError::AccountNotFound(account_id))?
            }
        };

        Repository::append_entry(
            &mut tx,
            &NewEntry {
                entry_type: EntryType::Enrollment,
                sender_id: account_id,
                receiver_id: account_id,
                amount,
                description: format!(
                    "credit {} to account {}",
                    format_cents(amount),
                    account_id
                ),
            },
        )
        .await?;

        Repository::commit(tx).await?;
        info!(account_id, balance, amount, "credited account");

        Ok(balance)
    }

    /// Current balance of an account.
    pub async fn balance(&self, account_id: AccountId) -> Result<Cents, AppError> {
        let mut conn = self.repo.acquire().await?;
        let account = Repository::get_account(&mut conn, account_id)
            .await?
            .ok_or(AppError::AccountNotFound(account_id))?;
        Ok(account.balance)
    }

    /// Move `amount` from one account to another. Both legs and the single
    /// `transfer` log entry share one unit of work; transfers never create
    /// accounts, so an absent party fails the whole operation.
    pub async fn transfer(
        &self,
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: Cents,
    ) -> Result<TransferResult, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount(format!(
                "transfer amount must be positive, got {amount}"
            )));
        }

        let mut tx = self.repo.begin().await?;

        let sender_balance = Repository::sub_balance(&mut tx, sender_id, amount).await?;
        let receiver_balance = Repository::add_balance(&mut tx, receiver_id, amount)
            .await?
            .ok_or(AppError::AccountNotFound(receiver_id))?;

        Repository::append_entry(
            &mut tx,
            &NewEntry {
                entry_type: EntryType::Transfer,
                sender_id,
                receiver_id,
                amount,
                description: format!(
                    "transfer {} from account {} to account {}",
                    format_cents(amount),
                    sender_id,
                    receiver_id
                ),
            },
        )
        .await?;

        Repository::commit(tx).await?;
        info!(sender_id, receiver_id, amount, "transferred balance");

        Ok(TransferResult {
            sender_balance,
            receiver_balance,
        })
    }

    // ========================
    // Order operations
    // ========================

    /// Create a pending order, reserving its amount from the account.
    /// Reservation, order row and `reservation` log entry commit as one
    /// unit: a failure at any step leaves nothing behind.
    pub async fn create_order(&self, params: OrderParams) -> Result<CreateOrderResult, AppError> {
        if params.amount <= 0 {
            return Err(AppError::InvalidAmount(format!(
                "order amount must be positive, got {}",
                params.amount
            )));
        }

        let mut tx = self.repo.begin().await?;

        let balance = Repository::sub_balance(&mut tx, params.account_id, params.amount).await?;
        let order = Repository::insert_order(&mut tx, &params).await?;

        Repository::append_entry(
            &mut tx,
            &NewEntry {
                entry_type: EntryType::Reservation,
                sender_id: params.account_id,
                receiver_id: params.account_id,
                amount: params.amount,
                description: format!(
                    "reserve {} for order {}",
                    format_cents(params.amount),
                    params.order_id
                ),
            },
        )
        .await?;

        Repository::commit(tx).await?;
        info!(
            order_id = params.order_id,
            account_id = params.account_id,
            amount = params.amount,
            balance,
            "created order"
        );

        Ok(CreateOrderResult { order, balance })
    }

    /// Mark an order paid. A pure state transition: the money already left
    /// the balance at reservation time, so no balance or log side effect
    /// happens here. Anything but a pending order with matching fields is
    /// reported as [`AppError::OrderNotFound`].
    pub async fn pay_order(&self, params: OrderParams) -> Result<(), AppError> {
        // Single conditional statement; row-level atomicity is enough.
        let mut conn = self.repo.acquire().await?;
        let updated = Repository::mark_order_paid(&mut conn, &params).await?;
        if !updated {
            return Err(AppError::OrderNotFound(params.order_id));
        }

        info!(order_id = params.order_id, "order paid");
        Ok(())
    }

    /// Cancel a pending order: terminal transition, return of the reserved
    /// amount and `cancel_reservation` log entry in one unit of work.
    /// Returns the account balance after the return.
    pub async fn cancel_order(&self, params: OrderParams) -> Result<Cents, AppError> {
        let mut tx = self.repo.begin().await?;

        let updated = Repository::mark_order_cancelled(&mut tx, &params).await?;
        if !updated {
            return Err(AppError::OrderNotFound(params.order_id));
        }

        let balance = Repository::add_balance(&mut tx, params.account_id, params.amount)
            .await?
            .ok_or(AppError::AccountNotFound(params.account_id))?;

        Repository::append_entry(
            &mut tx,
            &NewEntry {
                entry_type: EntryType::CancelReservation,
                sender_id: params.account_id,
                receiver_id: params.account_id,
                amount: params.amount,
                description: format!(
                    "return {} for cancelled order {}",
                    format_cents(params.amount),
                    params.order_id
                ),
            },
        )
        .await?;

        Repository::commit(tx).await?;
        info!(
            order_id = params.order_id,
            account_id = params.account_id,
            balance,
            "cancelled order"
        );

        Ok(balance)
    }

    /// Look up one order by id.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, AppError> {
        let mut conn = self.repo.acquire().await?;
        Repository::get_order(&mut conn, order_id)
            .await?
            .ok_or(AppError::OrderNotFound(order_id))
    }

    // ========================
    // Audit trail
    // ========================

    /// List the log entries touching an account. Out-of-range limits fall
    /// back to the default page size.
    pub async fn history(
        &self,
        account_id: AccountId,
        filter: HistoryFilter,
    ) -> Result<HistoryPage, AppError> {
        let filter = HistoryFilter {
            limit: if filter.limit == 0 || filter.limit > MAX_HISTORY_LIMIT {
                DEFAULT_HISTORY_LIMIT
            } else {
                filter.limit
            },
            ..filter
        };

        let mut conn = self.repo.acquire().await?;
        let (entries, total) =
            Repository::list_entries_for_account(&mut conn, account_id, &filter).await?;

        Ok(HistoryPage { entries, total })
    }
}
