use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::domain::{PaymentStatus, SaleType, Transaction};

/// Schema version written by this release.
pub const CURRENT_VERSION: u64 = 2;

/// Flat `income`/`expense` type tags, stored under the legacy key.
pub const LEGACY_VERSION: u64 = 0;

/// `{ state: { transactions } }` with SALE/EXPENSE tags but no version field.
pub const UNVERSIONED: u64 = 1;

type Migration = fn(Vec<Value>) -> Vec<Value>;

/// Upgrade steps, keyed by the version they upgrade from.
const MIGRATIONS: &[(u64, Migration)] = &[
    (LEGACY_VERSION, rename_legacy_types),
    (UNVERSIONED, backfill_sale_defaults),
];

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported ledger schema version {0}")]
    UnsupportedVersion(u64),

    #[error("Ledger envelope has no transaction list")]
    InvalidShape,
}

/// Result of decoding a persisted envelope.
#[derive(Debug, Clone, Default)]
pub struct DecodedLedger {
    pub transactions: Vec<Transaction>,
    /// Version the blob was written with.
    pub version: u64,
    /// Records that could not be normalized, kept as stored (after schema
    /// upgrades) so that saving the ledger writes them back untouched.
    pub unreadable: Vec<Value>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    version: u64,
    state: LedgerState<'a>,
}

#[derive(Serialize)]
struct LedgerState<'a> {
    transactions: Vec<StoredRecord<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum StoredRecord<'a> {
    Known(&'a Transaction),
    Unreadable(&'a Value),
}

/// Serialize the full ledger as a current-version envelope. Unreadable
/// records follow the normalized ones.
pub fn encode_ledger(
    transactions: &[Transaction],
    unreadable: &[Value],
) -> Result<String, serde_json::Error> {
    let transactions = transactions
        .iter()
        .map(StoredRecord::Known)
        .chain(unreadable.iter().map(StoredRecord::Unreadable))
        .collect();
    serde_json::to_string(&Envelope {
        version: CURRENT_VERSION,
        state: LedgerState { transactions },
    })
}

/// Decode an envelope, upgrading it to the current schema in memory.
/// `assumed_version` applies when the blob carries no version field.
pub fn decode_ledger(raw: &str, assumed_version: u64) -> Result<DecodedLedger, EnvelopeError> {
    let document: Value = serde_json::from_str(raw)?;
    let version = document
        .get("version")
        .and_then(Value::as_u64)
        .unwrap_or(assumed_version);
    if version > CURRENT_VERSION {
        return Err(EnvelopeError::UnsupportedVersion(version));
    }

    let records = extract_records(document)?;
    let records = migrate_records(records, version);

    let mut decoded = DecodedLedger {
        version,
        ..DecodedLedger::default()
    };
    for record in records {
        match Transaction::deserialize(&record) {
            Ok(transaction) => decoded.transactions.push(transaction),
            Err(err) => {
                tracing::warn!(error = %err, "Keeping unreadable transaction record aside");
                decoded.unreadable.push(record);
            }
        }
    }
    Ok(decoded)
}

/// Accepts `{state:{transactions}}` and the older bare `{transactions}`.
/// A document with neither yields an empty list.
fn extract_records(mut document: Value) -> Result<Vec<Value>, EnvelopeError> {
    let nested = document
        .pointer_mut("/state/transactions")
        .map(Value::take)
        .unwrap_or(Value::Null);
    let list = if nested.is_null() {
        document
            .get_mut("transactions")
            .map(Value::take)
            .unwrap_or(Value::Null)
    } else {
        nested
    };
    match list {
        Value::Null => Ok(Vec::new()),
        Value::Array(records) => Ok(records),
        _ => Err(EnvelopeError::InvalidShape),
    }
}

fn migrate_records(mut records: Vec<Value>, from_version: u64) -> Vec<Value> {
    for (version, migration) in MIGRATIONS {
        if *version >= from_version {
            records = migration(records);
        }
    }
    records
}

fn record_fields(record: &mut Value) -> Option<&mut Map<String, Value>> {
    record.as_object_mut()
}

/// v0 -> v1: `income` becomes SALE, `expense` becomes EXPENSE. Other tags pass through.
fn rename_legacy_types(mut records: Vec<Value>) -> Vec<Value> {
    for record in &mut records {
        let Some(fields) = record_fields(record) else {
            continue;
        };
        let renamed = match fields.get("type").and_then(Value::as_str) {
            Some("income") => "SALE",
            Some("expense") => "EXPENSE",
            _ => continue,
        };
        fields.insert("type".to_string(), json!(renamed));
    }
    records
}

/// v1 -> v2: status and saleType become mandatory.
fn backfill_sale_defaults(mut records: Vec<Value>) -> Vec<Value> {
    for record in &mut records {
        let Some(fields) = record_fields(record) else {
            continue;
        };
        if fields.get("status").is_none_or(Value::is_null) {
            fields.insert("status".to_string(), json!(PaymentStatus::default()));
        }
        if fields.get("saleType").is_none_or(Value::is_null) {
            fields.insert("saleType".to_string(), json!(SaleType::default()));
        }
    }
    records
}
