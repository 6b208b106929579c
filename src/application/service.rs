use chrono::{DateTime, Local, NaiveDate, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::{
    self, CartItem, Cents, SaleOptions, Transaction, TransactionPatch, newest_first,
};
use crate::storage::{
    BlobStore, DecodedLedger, FINANCE_KEY, LEGACY_FINANCE_KEY, LEGACY_VERSION, SqliteStore,
    UNVERSIONED, decode_ledger, encode_ledger,
};

use super::{AppError, DateGroup, SaleSummary, group_by_date, sales_list_on};

/// The bakery's sales and expense ledger.
///
/// Owns the transaction list, loaded once from the blob store at construction.
/// Every mutation takes `&mut self` and rewrites the whole envelope before
/// returning, so mutations never interleave. Views are recomputed on each call.
///
/// Stored records that fail to normalize stay out of every view but are
/// written back with each save.
pub struct LedgerService<S: BlobStore> {
    store: S,
    transactions: Vec<Transaction>,
    unreadable: Vec<Value>,
}

impl LedgerService<SqliteStore> {
    /// Open the SQLite database at the given path (created if missing) and load
    /// the ledger from it.
    pub async fn open(database_path: &str) -> anyhow::Result<Self> {
        let store = SqliteStore::open(database_path).await?;
        Ok(Self::load(store).await)
    }
}

impl<S: BlobStore> LedgerService<S> {
    /// Load the ledger from `store`. Never fails: unreadable or missing data
    /// yields an empty ledger.
    pub async fn load(store: S) -> Self {
        let ledger = load_transactions(&store).await;
        Self {
            store,
            transactions: ledger.transactions,
            unreadable: ledger.unreadable,
        }
    }

    /// Discard in-memory state and load again from storage.
    pub async fn reload(&mut self) {
        let ledger = load_transactions(&self.store).await;
        self.transactions = ledger.transactions;
        self.unreadable = ledger.unreadable;
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Transactions in recording order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Stored records that could not be read, as found in storage.
    pub fn unreadable(&self) -> &[Value] {
        &self.unreadable
    }

    pub fn find(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    pub fn get(&self, id: &str) -> Result<&Transaction, AppError> {
        self.find(id)
            .ok_or_else(|| AppError::TransactionNotFound(id.to_string()))
    }

    async fn persist(&self) -> Result<(), AppError> {
        let encoded = encode_ledger(&self.transactions, &self.unreadable)?;
        self.store.put(FINANCE_KEY, &encoded).await?;
        debug!(
            transactions = self.transactions.len(),
            unreadable = self.unreadable.len(),
            bytes = encoded.len(),
            "Ledger saved"
        );
        Ok(())
    }

    // ========================
    // Mutations
    // ========================

    /// Record a sale dated now.
    pub async fn register_sale(
        &mut self,
        items: Vec<CartItem>,
        options: SaleOptions,
    ) -> Result<Transaction, AppError> {
        self.register_sale_at(items, options, Utc::now()).await
    }

    /// Record a sale with an explicit timestamp.
    pub async fn register_sale_at(
        &mut self,
        items: Vec<CartItem>,
        options: SaleOptions,
        date: DateTime<Utc>,
    ) -> Result<Transaction, AppError> {
        if items.is_empty() {
            return Err(AppError::EmptySale);
        }
        let sale = Transaction::sale(items, options, date);
        info!(id = %sale.id, amount = sale.amount, status = %sale.status, "Sale recorded");
        self.transactions.push(sale.clone());
        self.persist().await?;
        Ok(sale)
    }

    /// Record an expense dated now.
    pub async fn register_expense(
        &mut self,
        amount: Cents,
        description: &str,
    ) -> Result<Transaction, AppError> {
        self.register_expense_at(amount, description, Utc::now()).await
    }

    /// Record an expense with an explicit timestamp.
    pub async fn register_expense_at(
        &mut self,
        amount: Cents,
        description: &str,
        date: DateTime<Utc>,
    ) -> Result<Transaction, AppError> {
        if amount < 0 {
            return Err(AppError::InvalidAmount(
                "Expense amount cannot be negative".to_string(),
            ));
        }
        let expense = Transaction::expense(amount, description, date);
        info!(id = %expense.id, amount = expense.amount, "Expense recorded");
        self.transactions.push(expense.clone());
        self.persist().await?;
        Ok(expense)
    }

    /// Remove a transaction. Unknown ids are not an error; returns whether
    /// anything was removed.
    pub async fn remove_transaction(&mut self, id: &str) -> Result<bool, AppError> {
        let before = self.transactions.len();
        self.transactions.retain(|t| t.id != id);
        let removed = self.transactions.len() != before;
        if removed {
            info!(id, "Transaction removed");
        }
        self.persist().await?;
        Ok(removed)
    }

    /// Merge `patch` into the transaction with `id`. Returns `None` without
    /// touching storage when the id is unknown.
    pub async fn update_transaction(
        &mut self,
        id: &str,
        patch: TransactionPatch,
    ) -> Result<Option<Transaction>, AppError> {
        let Some(transaction) = self.transactions.iter_mut().find(|t| t.id == id) else {
            debug!(id, "Update ignored, transaction not found");
            return Ok(None);
        };
        transaction.apply_patch(patch);
        let updated = transaction.clone();
        info!(id, status = %updated.status, "Transaction updated");
        self.persist().await?;
        Ok(Some(updated))
    }

    /// Settle a pending sale.
    pub async fn mark_paid(&mut self, id: &str) -> Result<Option<Transaction>, AppError> {
        self.update_transaction(id, TransactionPatch::mark_paid())
            .await
    }

    // ========================
    // Views
    // ========================

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    pub fn today_total(&self) -> Cents {
        self.sales_on(Self::today())
    }

    pub fn sales_on(&self, day: NaiveDate) -> Cents {
        domain::sales_on(&self.transactions, day)
    }

    pub fn today_expenses(&self) -> Cents {
        self.expenses_on(Self::today())
    }

    pub fn expenses_on(&self, day: NaiveDate) -> Cents {
        domain::expenses_on(&self.transactions, day)
    }

    pub fn today_balance(&self) -> Cents {
        self.balance_on(Self::today())
    }

    pub fn balance_on(&self, day: NaiveDate) -> Cents {
        domain::balance_on(&self.transactions, day)
    }

    pub fn total_balance(&self) -> Cents {
        domain::total_balance(&self.transactions)
    }

    pub fn received_balance(&self) -> Cents {
        domain::received_balance(&self.transactions)
    }

    pub fn total_pending_amount(&self) -> Cents {
        domain::total_pending(&self.transactions)
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        domain::pending_sales(&self.transactions)
    }

    pub fn today_sales_list(&self) -> Vec<SaleSummary> {
        self.sales_list_on(Self::today())
    }

    pub fn sales_list_on(&self, day: NaiveDate) -> Vec<SaleSummary> {
        sales_list_on(&self.transactions, day)
    }

    /// Every transaction, most recent first.
    pub fn all(&self) -> Vec<Transaction> {
        newest_first(&self.transactions)
    }

    pub fn transactions_grouped_by_date(&self) -> Vec<DateGroup> {
        group_by_date(&self.transactions)
    }
}

async fn load_transactions<S: BlobStore>(store: &S) -> DecodedLedger {
    let current = match store.get(FINANCE_KEY).await {
        Ok(current) => current,
        Err(err) => {
            warn!(error = %err, "Storage unavailable, starting with an empty ledger");
            return DecodedLedger::default();
        }
    };
    if let Some(raw) = current {
        return match decode_ledger(&raw, UNVERSIONED) {
            Ok(decoded) => {
                info!(
                    transactions = decoded.transactions.len(),
                    unreadable = decoded.unreadable.len(),
                    version = decoded.version,
                    "Ledger loaded"
                );
                decoded
            }
            Err(err) => {
                warn!(error = %err, "Stored ledger is unreadable, starting with an empty ledger");
                DecodedLedger::default()
            }
        };
    }

    let legacy = match store.get(LEGACY_FINANCE_KEY).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return DecodedLedger::default(),
        Err(err) => {
            warn!(error = %err, "Storage unavailable, starting with an empty ledger");
            return DecodedLedger::default();
        }
    };
    let decoded = match decode_ledger(&legacy, LEGACY_VERSION) {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!(error = %err, "Legacy ledger is unreadable, starting with an empty ledger");
            return DecodedLedger::default();
        }
    };

    match encode_ledger(&decoded.transactions, &decoded.unreadable) {
        Ok(encoded) => match store.put(FINANCE_KEY, &encoded).await {
            Ok(()) => info!(
                transactions = decoded.transactions.len(),
                unreadable = decoded.unreadable.len(),
                "Migrated legacy ledger"
            ),
            Err(err) => warn!(error = %err, "Failed to save migrated legacy ledger"),
        },
        Err(err) => warn!(error = %err, "Failed to encode migrated legacy ledger"),
    }
    decoded
}
