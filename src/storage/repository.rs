use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

use crate::application::{AppError, HistoryFilter, HistorySort};
use crate::domain::{
    Account, AccountId, Cents, EntryType, LedgerEntry, NewEntry, Order, OrderId, OrderParams,
    ReportPeriod, ServiceAmount,
};

use super::MIGRATION_001_INITIAL;

/// How long a writer waits on SQLite's write lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Repository over the SQLite ledger store.
///
/// The instance owns the connection pool and hands out unit-of-work
/// handles via [`Repository::begin`]. Every store operation is an
/// associated function taking `&mut SqliteConnection` so the transaction
/// scope is visible in the signature: callers decide whether a statement
/// runs inside a unit of work or on a plain pooled connection.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database given a `sqlite:` URL.
    /// Foreign keys are enforced on every connection.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("parse database url")?
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePool::connect_with(options)
            .await
            .context("connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self, AppError> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Start an atomic unit of work. All statements issued on the returned
    /// handle commit together through [`Repository::commit`] or roll back
    /// together when the handle is dropped. Step errors are propagated to
    /// the caller unchanged.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        let tx = self.pool.begin().await.context("begin unit of work")?;
        Ok(tx)
    }

    /// Commit a unit of work started with [`Repository::begin`].
    pub async fn commit(tx: Transaction<'static, Sqlite>) -> Result<(), AppError> {
        tx.commit().await.context("commit unit of work")?;
        Ok(())
    }

    /// Check out a pooled connection for statements that do not need a
    /// surrounding unit of work.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>, AppError> {
        let conn = self.pool.acquire().await.context("acquire connection")?;
        Ok(conn)
    }

    /// Direct pool access, for embedders and test fixtures.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ========================
    // Account operations
    // ========================

    /// Insert an account with a zero balance.
    pub async fn create_account(
        conn: &mut SqliteConnection,
        id: AccountId,
    ) -> Result<Account, AppError> {
        let result = sqlx::query("INSERT INTO accounts (id, balance) VALUES (?, 0) RETURNING id, balance")
            .bind(id)
            .fetch_one(&mut *conn)
            .await;

        match result {
            Ok(row) => Ok(Self::row_to_account(&row)),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(AppError::AccountAlreadyExists(id))
            }
            Err(err) => Err(anyhow::Error::new(err).context("insert account").into()),
        }
    }

    /// Get an account by id.
    pub async fn get_account(
        conn: &mut SqliteConnection,
        id: AccountId,
    ) -> Result<Option<Account>, AppError> {
        let row = sqlx::query("SELECT id, balance FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .context("fetch account")?;

        Ok(row.map(|row| Self::row_to_account(&row)))
    }

    /// Increase an account's balance, returning the new balance or `None`
    /// when no such account exists.
    pub async fn add_balance(
        conn: &mut SqliteConnection,
        id: AccountId,
        amount: Cents,
    ) -> Result<Option<Cents>, AppError> {
        let row = sqlx::query("UPDATE accounts SET balance = balance + ? WHERE id = ? RETURNING balance")
            .bind(amount)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .context("add balance")?;

        Ok(row.map(|row| row.get("balance")))
    }

    /// Decrease an account's balance. The store rejects a decrease past
    /// zero via the balance CHECK constraint, surfaced here as
    /// [`AppError::InsufficientFunds`].
    pub async fn sub_balance(
        conn: &mut SqliteConnection,
        id: AccountId,
        amount: Cents,
    ) -> Result<Cents, AppError> {
        let result = sqlx::query("UPDATE accounts SET balance = balance - ? WHERE id = ? RETURNING balance")
            .bind(amount)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await;

        match result {
            Ok(Some(row)) => Ok(row.get("balance")),
            Ok(None) => Err(AppError::AccountNotFound(id)),
            Err(sqlx::Error::Database(db)) if db.is_check_violation() => {
                Err(AppError::InsufficientFunds {
                    account_id: id,
                    required: amount,
                })
            }
            Err(err) => Err(anyhow::Error::new(err).context("subtract balance").into()),
        }
    }

    fn row_to_account(row: &SqliteRow) -> Account {
        Account {
            id: row.get("id"),
            balance: row.get("balance"),
        }
    }

    // ========================
    // Order operations
    // ========================

    /// Insert a new order in pending state.
    pub async fn insert_order(
        conn: &mut SqliteConnection,
        params: &OrderParams,
    ) -> Result<Order, AppError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO orders (order_id, account_id, service_id, amount, is_paid, is_cancelled, created_at, updated_at)
            VALUES (?, ?, ?, ?, 0, 0, ?, ?)
            "#,
        )
        .bind(params.order_id)
        .bind(params.account_id)
        .bind(params.service_id)
        .bind(params.amount)
        .bind(Self::timestamp(now))
        .bind(Self::timestamp(now))
        .execute(&mut *conn)
        .await;

        match result {
            Ok(_) => Ok(Order {
                order_id: params.order_id,
                account_id: params.account_id,
                service_id: params.service_id,
                amount: params.amount,
                is_paid: false,
                is_cancelled: false,
                created_at: now,
                updated_at: now,
            }),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(AppError::OrderAlreadyExists(params.order_id))
            }
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(AppError::AccountNotFound(params.account_id))
            }
            Err(err) => Err(anyhow::Error::new(err).context("insert order").into()),
        }
    }

    /// Get an order by id.
    pub async fn get_order(
        conn: &mut SqliteConnection,
        id: OrderId,
    ) -> Result<Option<Order>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT order_id, account_id, service_id, amount, is_paid, is_cancelled, created_at, updated_at
            FROM orders
            WHERE order_id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("fetch order")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_order(&row)?)),
            None => Ok(None),
        }
    }

    /// Conditionally mark an order paid. The update matches only when the
    /// stored order agrees with every supplied field and is still pending;
    /// the returned flag is whether a row was affected.
    pub async fn mark_order_paid(
        conn: &mut SqliteConnection,
        params: &OrderParams,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET is_paid = 1, updated_at = ?
            WHERE order_id = ? AND account_id = ? AND service_id = ? AND amount = ?
              AND is_paid = 0 AND is_cancelled = 0
            "#,
        )
        .bind(Self::timestamp(Utc::now()))
        .bind(params.order_id)
        .bind(params.account_id)
        .bind(params.service_id)
        .bind(params.amount)
        .execute(&mut *conn)
        .await
        .context("mark order paid")?;

        Ok(result.rows_affected() > 0)
    }

    /// Conditionally mark an order cancelled, under the same still-pending,
    /// fields-match precondition as [`Repository::mark_order_paid`].
    pub async fn mark_order_cancelled(
        conn: &mut SqliteConnection,
        params: &OrderParams,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET is_cancelled = 1, updated_at = ?
            WHERE order_id = ? AND account_id = ? AND service_id = ? AND amount = ?
              AND is_paid = 0 AND is_cancelled = 0
            "#,
        )
        .bind(Self::timestamp(Utc::now()))
        .bind(params.order_id)
        .bind(params.account_id)
        .bind(params.service_id)
        .bind(params.amount)
        .execute(&mut *conn)
        .await
        .context("mark order cancelled")?;

        Ok(result.rows_affected() > 0)
    }

    fn row_to_order(row: &SqliteRow) -> Result<Order, AppError> {
        Ok(Order {
            order_id: row.get("order_id"),
            account_id: row.get("account_id"),
            service_id: row.get("service_id"),
            amount: row.get("amount"),
            is_paid: row.get::<i64, _>("is_paid") != 0,
            is_cancelled: row.get::<i64, _>("is_cancelled") != 0,
            created_at: Self::parse_timestamp(row.get("created_at"))?,
            updated_at: Self::parse_timestamp(row.get("updated_at"))?,
        })
    }

    // ========================
    // Transaction log operations
    // ========================

    /// Append one immutable entry to the audit trail.
    pub async fn append_entry(
        conn: &mut SqliteConnection,
        entry: &NewEntry,
    ) -> Result<LedgerEntry, AppError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (type, sender_id, receiver_id, amount, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(entry.entry_type.as_str())
        .bind(entry.sender_id)
        .bind(entry.receiver_id)
        .bind(entry.amount)
        .bind(&entry.description)
        .bind(Self::timestamp(now))
        .fetch_optional(&mut *conn)
        .await;

        match result {
            Ok(Some(row)) => Ok(LedgerEntry {
                id: row.get("id"),
                entry_type: entry.entry_type,
                sender_id: entry.sender_id,
                receiver_id: entry.receiver_id,
                amount: entry.amount,
                description: entry.description.clone(),
                created_at: now,
            }),
            Ok(None) => Err(AppError::TransactionLogWriteFailed(
                "insert affected no row".to_string(),
            )),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(AppError::TransactionAlreadyExists)
            }
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(AppError::AccountNotFound(entry.receiver_id))
            }
            Err(err) => Err(anyhow::Error::new(err).context("insert transaction").into()),
        }
    }

    /// List log entries touching an account (as sender or receiver), with
    /// pagination and sorting. Also returns the total number of matching
    /// entries, independent of the page.
    pub async fn list_entries_for_account(
        conn: &mut SqliteConnection,
        account_id: AccountId,
        filter: &HistoryFilter,
    ) -> Result<(Vec<LedgerEntry>, i64), AppError> {
        let mut query = String::from(
            "SELECT id, type, sender_id, receiver_id, amount, description, created_at, \
             COUNT(*) OVER () AS total \
             FROM transactions WHERE sender_id = ? OR receiver_id = ?",
        );

        query.push_str(match filter.sort {
            HistorySort::Date => " ORDER BY created_at",
            HistorySort::Amount => " ORDER BY amount",
        });
        query.push_str(if filter.descending { " DESC" } else { " ASC" });
        query.push_str(", id LIMIT ? OFFSET ?");

        debug!(%query, account_id, "list entries query");

        let rows = sqlx::query(&query)
            .bind(account_id)
            .bind(account_id)
            .bind(i64::from(filter.limit))
            .bind(i64::from(filter.offset))
            .fetch_all(&mut *conn)
            .await
            .context("list entries for account")?;

        let total = rows.first().map(|row| row.get("total")).unwrap_or(0);
        let entries = rows
            .iter()
            .map(Self::row_to_entry)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((entries, total))
    }

    fn row_to_entry(row: &SqliteRow) -> Result<LedgerEntry, AppError> {
        let type_str: String = row.get("type");
        let entry_type = EntryType::from_str(&type_str)
            .ok_or_else(|| anyhow::anyhow!("invalid transaction type: {type_str}"))?;

        Ok(LedgerEntry {
            id: row.get("id"),
            entry_type,
            sender_id: row.get("sender_id"),
            receiver_id: row.get("receiver_id"),
            amount: row.get("amount"),
            description: row.get("description"),
            created_at: Self::parse_timestamp(row.get("created_at"))?,
        })
    }

    // ========================
    // Report aggregation
    // ========================

    /// Sum the paid order amounts per service for one calendar month.
    /// Orders count toward the month they were created in.
    pub async fn paid_amount_by_service(
        conn: &mut SqliteConnection,
        period: ReportPeriod,
    ) -> Result<Vec<ServiceAmount>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT service_id, SUM(amount) AS amount
            FROM orders
            WHERE is_paid = 1 AND is_cancelled = 0
              AND CAST(strftime('%Y', created_at) AS INTEGER) = ?
              AND CAST(strftime('%m', created_at) AS INTEGER) = ?
            GROUP BY service_id
            HAVING SUM(amount) > 0
            ORDER BY service_id
            "#,
        )
        .bind(period.year)
        .bind(i64::from(period.month))
        .fetch_all(&mut *conn)
        .await
        .context("aggregate paid amounts")?;

        Ok(rows
            .iter()
            .map(|row| ServiceAmount {
                service_id: row.get("service_id"),
                amount: row.get("amount"),
            })
            .collect())
    }

    // ========================
    // Helpers
    // ========================

    /// Timestamps are stored as RFC 3339 UTC text with millisecond
    /// precision, so SQLite's strftime can slice them by month.
    fn timestamp(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn parse_timestamp(text: String) -> Result<DateTime<Utc>, AppError> {
        let parsed = DateTime::parse_from_rfc3339(&text)
            .context("invalid stored timestamp")?
            .with_timezone(&Utc);
        Ok(parsed)
    }
}
