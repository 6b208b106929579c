use chrono::{DateTime, Local, NaiveDate, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{Cents, cents_from_decimal, cents_to_decimal};

pub type TransactionId = String;

/// Description used for an expense recorded without one.
pub const DEFAULT_EXPENSE_DESCRIPTION: &str = "Compra";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Sale,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Sale => "SALE",
            TransactionType::Expense => "EXPENSE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "SALE" => Some(TransactionType::Sale),
            "EXPENSE" => Some(TransactionType::Expense),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settlement status of a sale. Pending means the client still owes the money.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    #[default]
    Paid,
    Pending,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Pending => "PENDING",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PAID" => Some(PaymentStatus::Paid),
            "PENDING" => Some(PaymentStatus::Pending),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sale channel. Resale goes through a third-party reseller, usually on credit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SaleType {
    #[default]
    Direct,
    Resale,
}

impl SaleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleType::Direct => "DIRECT",
            SaleType::Resale => "RESALE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DIRECT" => Some(SaleType::Direct),
            "RESALE" => Some(SaleType::Resale),
            _ => None,
        }
    }
}

impl std::fmt::Display for SaleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A line of a sale. Name and price are snapshots taken at sale time, so later
/// catalog edits never change past transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    pub name: String,
    #[serde(with = "decimal_cents")]
    pub price: Cents,
    pub qty: u32,
}

impl CartItem {
    pub fn new(product_id: impl Into<String>, name: impl Into<String>, price: Cents, qty: u32) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            price,
            qty,
        }
    }

    pub fn line_total(&self) -> Cents {
        self.price * Cents::from(self.qty)
    }
}

mod decimal_cents {
    use serde::{Deserialize, Deserializer, Serializer, de};

    use crate::domain::{Cents, cents_from_decimal, cents_to_decimal};

    pub fn serialize<S: Serializer>(cents: &Cents, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(cents_to_decimal(*cents))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Cents, D::Error> {
        let value = f64::deserialize(deserializer)?;
        cents_from_decimal(value).ok_or_else(|| de::Error::custom("amount is not a finite number"))
    }
}

/// Optional settings for a new sale. Unset fields fall back to PAID / DIRECT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaleOptions {
    pub status: Option<PaymentStatus>,
    pub due_date: Option<NaiveDate>,
    pub sale_type: Option<SaleType>,
    pub client_name: Option<String>,
}

impl SaleOptions {
    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_sale_type(mut self, sale_type: SaleType) -> Self {
        self.sale_type = Some(sale_type);
        self
    }

    pub fn with_client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = Some(client_name.into());
        self
    }
}

/// Partial update of a transaction. Set fields override, the rest is kept.
/// `Some(None)` clears the due date or client name.
/// Amount, items, type and date are not patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionPatch {
    pub description: Option<String>,
    pub status: Option<PaymentStatus>,
    pub due_date: Option<Option<NaiveDate>>,
    pub sale_type: Option<SaleType>,
    pub client_name: Option<Option<String>>,
}

impl TransactionPatch {
    pub fn mark_paid() -> Self {
        Self {
            status: Some(PaymentStatus::Paid),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("transaction {id}: unknown type '{kind}'")]
    UnknownType { id: String, kind: String },

    #[error("transaction {id}: amount is missing or not a number")]
    InvalidAmount { id: String },

    #[error("transaction {id}: invalid date '{value}'")]
    InvalidDate { id: String, value: String },
}

/// Transaction record exactly as it appears in persisted JSON. Any field added
/// by a later schema version is optional here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<CartItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_type: Option<SaleType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
}

/// A recorded sale or expense. Always normalized: status and sale type are
/// never missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTransaction", into = "RawTransaction")]
pub struct Transaction {
    pub id: TransactionId,
    pub kind: TransactionType,
    pub amount: Cents,
    pub description: String,
    pub date: DateTime<Utc>,
    pub items: Vec<CartItem>,
    pub status: PaymentStatus,
    pub due_date: Option<NaiveDate>,
    pub sale_type: SaleType,
    pub client_name: Option<String>,
}

/// Timestamp-ordered unique id. Two ids minted in the same millisecond differ.
pub fn new_transaction_id() -> TransactionId {
    Uuid::now_v7().to_string()
}

/// "Venda (1 item)" / "Venda (N itens)" from the total quantity sold.
pub fn sale_description(count: u64) -> String {
    if count == 1 {
        "Venda (1 item)".to_string()
    } else {
        format!("Venda ({} itens)", count)
    }
}

impl Transaction {
    /// Build a new sale from cart items. The amount is fixed here and never
    /// recomputed. Timestamps keep millisecond precision, as persisted.
    pub fn sale(items: Vec<CartItem>, options: SaleOptions, date: DateTime<Utc>) -> Self {
        let amount = items.iter().map(CartItem::line_total).sum();
        let count: u64 = items.iter().map(|i| u64::from(i.qty)).sum();
        Self {
            id: new_transaction_id(),
            kind: TransactionType::Sale,
            amount,
            description: sale_description(count),
            date: date.trunc_subsecs(3),
            items,
            status: options.status.unwrap_or_default(),
            due_date: options.due_date,
            sale_type: options.sale_type.unwrap_or_default(),
            client_name: non_blank(options.client_name),
        }
    }

    /// Build a new expense. A blank description becomes "Compra".
    pub fn expense(amount: Cents, description: &str, date: DateTime<Utc>) -> Self {
        let description = match description.trim() {
            "" => DEFAULT_EXPENSE_DESCRIPTION,
            trimmed => trimmed,
        };
        Self {
            id: new_transaction_id(),
            kind: TransactionType::Expense,
            amount,
            description: description.to_string(),
            date: date.trunc_subsecs(3),
            items: Vec::new(),
            status: PaymentStatus::default(),
            due_date: None,
            sale_type: SaleType::default(),
            client_name: None,
        }
    }

    /// Normalize a persisted record, backfilling fields that predate the
    /// current schema.
    pub fn normalize(raw: RawTransaction) -> Result<Self, NormalizeError> {
        let kind = TransactionType::from_str(&raw.kind).ok_or_else(|| NormalizeError::UnknownType {
            id: raw.id.clone(),
            kind: raw.kind.clone(),
        })?;
        let amount = raw
            .amount
            .and_then(cents_from_decimal)
            .ok_or_else(|| NormalizeError::InvalidAmount { id: raw.id.clone() })?;
        let date = DateTime::parse_from_rfc3339(&raw.date)
            .map_err(|_| NormalizeError::InvalidDate {
                id: raw.id.clone(),
                value: raw.date.clone(),
            })?
            .with_timezone(&Utc);
        let due_date = raw.due_date.as_deref().and_then(|value| {
            let parsed = parse_due_date(value);
            if parsed.is_none() && !value.trim().is_empty() {
                tracing::warn!(id = %raw.id, due_date = value, "Ignoring unparseable due date");
            }
            parsed
        });

        Ok(Self {
            id: raw.id,
            kind,
            amount,
            description: raw.description.unwrap_or_default(),
            date,
            items: raw.items.unwrap_or_default(),
            status: raw.status.unwrap_or_default(),
            due_date,
            sale_type: raw.sale_type.unwrap_or_default(),
            client_name: non_blank(raw.client_name),
        })
    }

    /// Shallow-merge a patch into this record.
    pub fn apply_patch(&mut self, patch: TransactionPatch) {
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(sale_type) = patch.sale_type {
            self.sale_type = sale_type;
        }
        if let Some(client_name) = patch.client_name {
            self.client_name = non_blank(client_name);
        }
    }

    pub fn is_sale(&self) -> bool {
        self.kind == TransactionType::Sale
    }

    pub fn is_expense(&self) -> bool {
        self.kind == TransactionType::Expense
    }

    pub fn is_pending(&self) -> bool {
        self.is_sale() && self.status == PaymentStatus::Pending
    }

    pub fn is_paid_sale(&self) -> bool {
        self.is_sale() && self.status == PaymentStatus::Paid
    }

    /// Calendar day of the transaction in the local time zone.
    pub fn local_date(&self) -> NaiveDate {
        self.date.with_timezone(&Local).date_naive()
    }

    /// When the money is expected: the due date at midnight UTC, or the sale
    /// date if no due date was set.
    pub fn settlement_time(&self) -> DateTime<Utc> {
        self.due_date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| d.and_utc())
            .unwrap_or(self.date)
    }

    /// Total quantity of units sold.
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.qty)).sum()
    }
}

impl TryFrom<RawTransaction> for Transaction {
    type Error = NormalizeError;

    fn try_from(raw: RawTransaction) -> Result<Self, Self::Error> {
        Transaction::normalize(raw)
    }
}

/// Expenses are written without `status` and `saleType`, which only apply to
/// sales. Normalization restores the defaults on load.
impl From<Transaction> for RawTransaction {
    fn from(t: Transaction) -> Self {
        let is_sale = t.is_sale();
        RawTransaction {
            id: t.id,
            kind: t.kind.as_str().to_string(),
            amount: Some(cents_to_decimal(t.amount)),
            description: Some(t.description),
            date: t.date.to_rfc3339_opts(SecondsFormat::Millis, true),
            items: if t.items.is_empty() { None } else { Some(t.items) },
            status: is_sale.then_some(t.status),
            due_date: t.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
            sale_type: is_sale.then_some(t.sale_type),
            client_name: t.client_name,
        }
    }
}

/// Accepts "YYYY-MM-DD" or a full RFC 3339 timestamp (truncated to its UTC day).
pub fn parse_due_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).date_naive())
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
