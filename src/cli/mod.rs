use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::application::{HistoryFilter, HistorySort, LedgerService, ReportingService};
use crate::cache::{ReportCache, DEFAULT_TTL_SECS};
use crate::domain::{format_cents, parse_cents, LedgerEntry, OrderParams, ReportPeriod};

/// Saldo - balance and order settlement ledger
#[derive(Parser)]
#[command(name = "saldo")]
#[command(about = "A balance and order settlement ledger with an immutable audit trail")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "saldo.db", env = "SALDO_DATABASE")]
    pub database: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Credit an account, creating it on first use
    Credit {
        /// Account id
        account: i64,

        /// Amount to credit (e.g., "50.00" or "50")
        amount: String,
    },

    /// Show the balance of an account
    Balance {
        /// Account id
        account: i64,
    },

    /// Move money between two accounts
    Transfer {
        /// Amount to transfer (e.g., "50.00" or "50")
        amount: String,

        /// Sender account id
        #[arg(long)]
        from: i64,

        /// Receiver account id
        #[arg(long)]
        to: i64,
    },

    /// Order lifecycle commands
    #[command(subcommand)]
    Order(OrderCommands),

    /// List ledger entries for an account
    History {
        /// Account id
        account: i64,

        /// Maximum number of entries to show
        #[arg(short, long)]
        limit: Option<u32>,

        /// Number of entries to skip
        #[arg(long)]
        offset: Option<u32>,

        /// Sort by: date, amount
        #[arg(long, default_value = "date")]
        sort: String,

        /// Sort in descending order
        #[arg(long)]
        desc: bool,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Monthly paid-amount report per service, as CSV
    Report {
        /// Report year
        #[arg(long)]
        year: i32,

        /// Report month (1-12)
        #[arg(long)]
        month: u32,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Cache time-to-live in seconds
        #[arg(long, env = "SALDO_REPORT_TTL", default_value_t = DEFAULT_TTL_SECS)]
        ttl: u64,
    },
}

#[derive(Subcommand)]
pub enum OrderCommands {
    /// Create an order, reserving its amount from the account
    Create {
        /// Order id (must be unique)
        order: i64,

        /// Paying account id
        #[arg(long)]
        account: i64,

        /// Service id the order is for
        #[arg(long)]
        service: i64,

        /// Amount to reserve (e.g., "50.00" or "50")
        #[arg(long)]
        amount: String,
    },

    /// Mark a pending order as paid
    Pay {
        /// Order id
        order: i64,

        /// Paying account id
        #[arg(long)]
        account: i64,

        /// Service id the order is for
        #[arg(long)]
        service: i64,

        /// Reserved amount (must match the order)
        #[arg(long)]
        amount: String,
    },

    /// Cancel a pending order, returning the reservation
    Cancel {
        /// Order id
        order: i64,

        /// Paying account id
        #[arg(long)]
        account: i64,

        /// Service id the order is for
        #[arg(long)]
        service: i64,

        /// Reserved amount (must match the order)
        #[arg(long)]
        amount: String,
    },

    /// Show detailed order information
    Show {
        /// Order id
        order: i64,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                LedgerService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Credit { account, amount } => {
                let service = LedgerService::connect(&self.database).await?;
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;

                let balance = service.credit(account, amount_cents).await?;
                println!(
                    "Credited {} to account {} (balance: {})",
                    format_cents(amount_cents),
                    account,
                    format_cents(balance)
                );
            }

            Commands::Balance { account } => {
                let service = LedgerService::connect(&self.database).await?;
                let balance = service.balance(account).await?;
                println!("Account {}: {}", account, format_cents(balance));
            }

            Commands::Transfer { amount, from, to } => {
                let service = LedgerService::connect(&self.database).await?;
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;

                let result = service.transfer(from, to, amount_cents).await?;
                println!(
                    "Transferred {} from account {} (balance: {}) to account {} (balance: {})",
                    format_cents(amount_cents),
                    from,
                    format_cents(result.sender_balance),
                    to,
                    format_cents(result.receiver_balance)
                );
            }

            Commands::Order(order_cmd) => {
                let service = LedgerService::connect(&self.database).await?;
                run_order_command(&service, order_cmd).await?;
            }

            Commands::History {
                account,
                limit,
                offset,
                sort,
                desc,
                format,
            } => {
                let service = LedgerService::connect(&self.database).await?;

                let sort = match sort.as_str() {
                    "date" => HistorySort::Date,
                    "amount" => HistorySort::Amount,
                    other => anyhow::bail!("Invalid sort '{}'. Use 'date' or 'amount'", other),
                };
                let filter = HistoryFilter {
                    limit: limit.unwrap_or_default(),
                    offset: offset.unwrap_or_default(),
                    sort,
                    descending: desc,
                };

                let page = service.history(account, filter).await?;
                match format.as_str() {
                    "table" => print_history_table(account, &page.entries, page.total),
                    "json" => println!("{}", serde_json::to_string_pretty(&page.entries)?),
                    other => anyhow::bail!("Invalid format '{}'. Use 'table' or 'json'", other),
                }
            }

            Commands::Report {
                year,
                month,
                output,
                ttl,
            } => {
                let period = ReportPeriod::new(year, month)
                    .with_context(|| format!("Invalid month {} (expected 1-12)", month))?;

                let service = LedgerService::connect(&self.database).await?;
                let cache = ReportCache::new(Duration::from_secs(ttl));
                let reporting = ReportingService::new(service.repository().clone(), cache);

                let bytes = reporting.monthly_report(period).await?;
                match output {
                    Some(path) => {
                        std::fs::write(&path, &bytes)
                            .with_context(|| format!("Failed to write report to {}", path))?;
                        println!("Report for {} written to {}", period, path);
                    }
                    None => std::io::stdout().write_all(&bytes)?,
                }
            }
        }

        Ok(())
    }
}

async fn run_order_command(service: &LedgerService, command: OrderCommands) -> Result<()> {
    match command {
        OrderCommands::Create {
            order,
            account,
            service: service_id,
            amount,
        } => {
            let params = order_params(order, account, service_id, &amount)?;
            let result = service.create_order(params).await?;
            println!(
                "Created order {} reserving {} from account {} (balance: {})",
                result.order.order_id,
                format_cents(result.order.amount),
                result.order.account_id,
                format_cents(result.balance)
            );
        }

        OrderCommands::Pay {
            order,
            account,
            service: service_id,
            amount,
        } => {
            let params = order_params(order, account, service_id, &amount)?;
            service.pay_order(params).await?;
            println!("Order {} paid", order);
        }

        OrderCommands::Cancel {
            order,
            account,
            service: service_id,
            amount,
        } => {
            let params = order_params(order, account, service_id, &amount)?;
            let balance = service.cancel_order(params).await?;
            println!(
                "Cancelled order {}, returned {} to account {} (balance: {})",
                order,
                format_cents(params.amount),
                account,
                format_cents(balance)
            );
        }

        OrderCommands::Show { order } => {
            let order = service.get_order(order).await?;
            println!("Order:      {}", order.order_id);
            println!("Account:    {}", order.account_id);
            println!("Service:    {}", order.service_id);
            println!("Amount:     {}", format_cents(order.amount));
            println!("Status:     {}", order.status());
            println!("Created:    {}", order.created_at.format("%Y-%m-%d %H:%M:%S"));
            println!("Updated:    {}", order.updated_at.format("%Y-%m-%d %H:%M:%S"));
        }
    }

    Ok(())
}

fn order_params(
    order_id: i64,
    account_id: i64,
    service_id: i64,
    amount: &str,
) -> Result<OrderParams> {
    let amount = parse_cents(amount).context("Invalid amount format. Use '50.00' or '50'")?;
    Ok(OrderParams {
        order_id,
        account_id,
        service_id,
        amount,
    })
}

fn print_history_table(account: i64, entries: &[LedgerEntry], total: i64) {
    if entries.is_empty() {
        println!("No entries for account {}", account);
        return;
    }

    println!(
        "{:<6} {:<19} {:<20} {:>8} {:>10}  {}",
        "ID", "DATE", "TYPE", "FROM/TO", "AMOUNT", "DESCRIPTION"
    );
    for entry in entries {
        println!(
            "{:<6} {:<19} {:<20} {:>3}->{:<4} {:>10}  {}",
            entry.id,
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.entry_type.as_str(),
            entry.sender_id,
            entry.receiver_id,
            format_cents(entry.amount),
            entry.description
        );
    }
    println!("{} of {} entries", entries.len(), total);
}
