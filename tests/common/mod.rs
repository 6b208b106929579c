// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use bakery_ledger::LedgerService;
use bakery_ledger::domain::CartItem;
use bakery_ledger::storage::{MemoryStore, SqliteStore};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

/// Helper to create a ledger backed by a temporary SQLite database
pub async fn sqlite_service() -> Result<(LedgerService<SqliteStore>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::<SqliteStore>::open(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to create an empty in-memory ledger
pub async fn memory_service() -> LedgerService<MemoryStore> {
    LedgerService::load(MemoryStore::new()).await
}

/// Helper to build a timestamp at a local wall-clock time
pub fn local_time(date_str: &str, hour: u32, minute: u32) -> DateTime<Utc> {
    let day = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap();
    Local
        .from_local_datetime(&day.and_hms_opt(hour, minute, 0).unwrap())
        .earliest()
        .unwrap()
        .with_timezone(&Utc)
}

pub fn parse_day(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Test fixture: items from the default catalog
pub struct Catalog;

impl Catalog {
    pub fn brigadeiro(qty: u32) -> CartItem {
        CartItem::new("1", "Brigadeiro", 395, qty)
    }

    pub fn lasanha(qty: u32) -> CartItem {
        CartItem::new("2", "Lasanha", 2800, qty)
    }

    pub fn bolo_pote(qty: u32) -> CartItem {
        CartItem::new("3", "Bolo Pote", 1275, qty)
    }

    pub fn mini_pizza(qty: u32) -> CartItem {
        CartItem::new("4", "Mini Pizza", 2825, qty)
    }
}
