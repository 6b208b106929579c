use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::application::{AppError, LedgerService};
use crate::domain::{
    CartItem, PaymentStatus, SaleOptions, SaleType, Transaction, TransactionPatch, format_cents,
    parse_cents, parse_due_date,
};
use crate::storage::SqliteStore;

/// Bakery ledger - sales and expenses at the counter
#[derive(Parser)]
#[command(name = "bakery-ledger")]
#[command(about = "Record bakery sales and expenses and follow the daily balance")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "bakery.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a sale
    Sale {
        /// Cart line as PRODUCT_ID:NAME:PRICE:QTY (e.g. "1:Brigadeiro:3.95:2"), repeatable
        #[arg(short, long = "item", required = true)]
        items: Vec<String>,

        /// Sale on credit, to be paid later
        #[arg(long)]
        pending: bool,

        /// When a pending sale is due (YYYY-MM-DD)
        #[arg(long)]
        due_date: Option<String>,

        /// Sold through a reseller
        #[arg(long)]
        resale: bool,

        /// Client or reseller name
        #[arg(short, long)]
        client: Option<String>,

        /// Date of the sale (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// Record an expense
    Expense {
        /// Amount spent (e.g. "15.00" or "15,00")
        amount: String,

        /// What was bought (defaults to "Compra")
        description: Option<String>,

        /// Date of the expense (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// Mark a pending sale as paid
    Pay {
        /// Transaction ID
        id: String,
    },

    /// Change fields of a transaction
    Update {
        /// Transaction ID
        id: String,

        #[arg(short, long)]
        description: Option<String>,

        /// paid or pending
        #[arg(short, long)]
        status: Option<String>,

        /// YYYY-MM-DD
        #[arg(long, conflicts_with = "clear_due_date")]
        due_date: Option<String>,

        /// Remove the due date
        #[arg(long)]
        clear_due_date: bool,

        /// direct or resale
        #[arg(long)]
        sale_type: Option<String>,

        #[arg(short, long, conflicts_with = "clear_client")]
        client: Option<String>,

        /// Remove the client name
        #[arg(long)]
        clear_client: bool,
    },

    /// Delete a transaction
    Remove {
        /// Transaction ID
        id: String,
    },

    /// Show one transaction
    Show {
        /// Transaction ID
        id: String,
    },

    /// Today's numbers and overall balances
    Summary,

    /// Sales still waiting for payment
    Pending,

    /// Today's sales
    Today,

    /// Every transaction grouped by day
    History {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Install the tracing subscriber. `RUST_LOG` wins unless `--verbose` is set.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut service = LedgerService::<SqliteStore>::open(&self.database).await?;

        match self.command {
            Commands::Sale {
                items,
                pending,
                due_date,
                resale,
                client,
                date,
            } => {
                let items = items
                    .iter()
                    .map(|raw| parse_cart_item(raw))
                    .collect::<Result<Vec<_>>>()?;

                let mut options = SaleOptions::default();
                if pending {
                    options = options.with_status(PaymentStatus::Pending);
                }
                if let Some(due) = due_date {
                    options = options.with_due_date(parse_day(&due)?);
                }
                if resale {
                    options = options.with_sale_type(SaleType::Resale);
                }
                if let Some(client) = client {
                    options = options.with_client_name(client);
                }

                let timestamp = parse_timestamp(date)?;
                let sale = warn_unsaved(
                    service.register_sale_at(items, options, timestamp).await,
                    &service,
                )?;
                println!(
                    "Recorded sale: {} {} [{}] ({})",
                    format_cents(sale.amount),
                    sale.description,
                    sale.status,
                    sale.id
                );
            }

            Commands::Expense {
                amount,
                description,
                date,
            } => {
                let amount_cents = parse_cents(&amount)
                    .map_err(AppError::from)
                    .context("Invalid amount format. Use '15.00' or '15,00'")?;
                let timestamp = parse_timestamp(date)?;
                let expense = warn_unsaved(
                    service
                        .register_expense_at(
                            amount_cents,
                            description.as_deref().unwrap_or_default(),
                            timestamp,
                        )
                        .await,
                    &service,
                )?;
                println!(
                    "Recorded expense: {} {} ({})",
                    format_cents(expense.amount),
                    expense.description,
                    expense.id
                );
            }

            Commands::Pay { id } => match service.mark_paid(&id).await? {
                Some(sale) => println!("Marked as paid: {} ({})", format_cents(sale.amount), sale.id),
                None => println!("No transaction with id {}", id),
            },

            Commands::Update {
                id,
                description,
                status,
                due_date,
                clear_due_date,
                sale_type,
                client,
                clear_client,
            } => {
                let patch = TransactionPatch {
                    description,
                    status: status
                        .map(|s| {
                            PaymentStatus::from_str(&s)
                                .ok_or_else(|| anyhow::anyhow!("Invalid status: {}", s))
                        })
                        .transpose()?,
                    due_date: if clear_due_date {
                        Some(None)
                    } else {
                        due_date.map(|d| parse_day(&d).map(Some)).transpose()?
                    },
                    sale_type: sale_type
                        .map(|s| {
                            SaleType::from_str(&s)
                                .ok_or_else(|| anyhow::anyhow!("Invalid sale type: {}", s))
                        })
                        .transpose()?,
                    client_name: if clear_client { Some(None) } else { client.map(Some) },
                };
                if patch.is_empty() {
                    anyhow::bail!("Nothing to update");
                }
                match service.update_transaction(&id, patch).await? {
                    Some(t) => print_transaction(&t),
                    None => println!("No transaction with id {}", id),
                }
            }

            Commands::Remove { id } => {
                if service.remove_transaction(&id).await? {
                    println!("Removed transaction {}", id);
                } else {
                    println!("No transaction with id {}", id);
                }
            }

            Commands::Show { id } => {
                let transaction = service.get(&id)?;
                print_transaction(transaction);
            }

            Commands::Summary => {
                println!("Today");
                println!("  Sales:     {:>10}", format_cents(service.today_total()));
                println!("  Expenses:  {:>10}", format_cents(service.today_expenses()));
                println!("  Balance:   {:>10}", format_cents(service.today_balance()));
                println!();
                println!("Overall");
                println!("  Total:     {:>10}", format_cents(service.total_balance()));
                println!("  Received:  {:>10}", format_cents(service.received_balance()));
                println!("  Pending:   {:>10}", format_cents(service.total_pending_amount()));
            }

            Commands::Pending => {
                let pending = service.pending_transactions();
                if pending.is_empty() {
                    println!("Nothing to collect.");
                }
                for t in &pending {
                    println!(
                        "{:<12} {:>10}  {:<20} {}",
                        t.due_date
                            .map(|d| d.format("%d/%m/%Y").to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        format_cents(t.amount),
                        t.client_name.as_deref().unwrap_or("-"),
                        t.id
                    );
                }
            }

            Commands::Today => {
                let sales = service.today_sales_list();
                if sales.is_empty() {
                    println!("No sales today.");
                }
                for sale in &sales {
                    println!(
                        "{} {:>10} [{}] {}",
                        sale.time,
                        format_cents(sale.total),
                        sale.status,
                        sale.items_summary
                    );
                }
            }

            Commands::History { json } => {
                let groups = service.transactions_grouped_by_date();
                if json {
                    println!("{}", serde_json::to_string_pretty(&groups)?);
                } else {
                    for group in &groups {
                        println!("{}", group.date_label);
                        for t in &group.transactions {
                            println!(
                                "  {} {:<8} {:>10}  {}",
                                t.date.with_timezone(&Local).format("%H:%M"),
                                t.kind.as_str(),
                                format_cents(t.amount),
                                t.description
                            );
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// A mutation that failed to persist is still applied in memory; tell the user
/// before propagating.
fn warn_unsaved(
    result: Result<Transaction, AppError>,
    service: &LedgerService<SqliteStore>,
) -> Result<Transaction> {
    if let Err(AppError::StorageFull | AppError::Storage(_)) = &result {
        eprintln!(
            "Warning: the change was not saved ({} transactions in memory)",
            service.transactions().len()
        );
    }
    Ok(result?)
}

fn print_transaction(t: &Transaction) {
    println!("ID:          {}", t.id);
    println!("Type:        {}", t.kind);
    println!("Date:        {}", t.date.with_timezone(&Local).format("%d/%m/%Y %H:%M"));
    println!("Amount:      {}", format_cents(t.amount));
    println!("Description: {}", t.description);
    if t.is_sale() {
        println!("Status:      {}", t.status);
        println!("Sale type:   {}", t.sale_type);
        if let Some(due) = t.due_date {
            println!("Due date:    {}", due.format("%d/%m/%Y"));
        }
        if let Some(client) = &t.client_name {
            println!("Client:      {}", client);
        }
        for item in &t.items {
            println!(
                "  {}x {} @ {}",
                item.qty,
                item.name,
                format_cents(item.price)
            );
        }
    }
}

/// Parse "PRODUCT_ID:NAME:PRICE:QTY". The name may itself contain colons.
fn parse_cart_item(raw: &str) -> Result<CartItem> {
    let mut tail = raw.rsplitn(3, ':');
    let qty = tail.next();
    let price = tail.next();
    let head = tail.next();
    let (Some(qty), Some(price), Some(head)) = (qty, price, head) else {
        anyhow::bail!("Item must be PRODUCT_ID:NAME:PRICE:QTY, got '{}'", raw);
    };
    let (product_id, name) = head
        .split_once(':')
        .with_context(|| format!("Item must be PRODUCT_ID:NAME:PRICE:QTY, got '{}'", raw))?;

    let price = parse_cents(price).with_context(|| format!("Invalid price in '{}'", raw))?;
    let qty: u32 = qty
        .trim()
        .parse()
        .with_context(|| format!("Invalid quantity in '{}'", raw))?;
    if qty == 0 {
        anyhow::bail!("Quantity must be positive in '{}'", raw);
    }
    Ok(CartItem::new(product_id.trim(), name.trim(), price, qty))
}

fn parse_day(date_str: &str) -> Result<NaiveDate> {
    parse_due_date(date_str)
        .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str))
}

/// Backdated entries are placed at local noon so they land on the requested day.
fn parse_timestamp(date: Option<String>) -> Result<DateTime<Utc>> {
    let Some(date_str) = date else {
        return Ok(Utc::now());
    };
    let day = parse_day(&date_str)?;
    let noon = day
        .and_hms_opt(12, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid date"))?;
    let local = Local
        .from_local_datetime(&noon)
        .earliest()
        .ok_or_else(|| anyhow::anyhow!("Date does not exist in the local time zone"))?;
    Ok(local.with_timezone(&Utc))
}
