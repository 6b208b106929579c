use chrono::{Local, Locale, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::{
    CartItem, Cents, PaymentStatus, SaleType, Transaction, TransactionId, newest_first,
};

/// Locale used for the labels shown at the counter.
pub const DISPLAY_LOCALE: Locale = Locale::pt_BR;

/// One line of the "today's sales" list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleSummary {
    pub id: TransactionId,
    /// Local time of the sale, "HH:MM"
    pub time: String,
    /// "2x Brigadeiro, 1x Lasanha"
    pub items_summary: String,
    pub items: Vec<CartItem>,
    pub total: Cents,
    pub status: PaymentStatus,
    pub sale_type: SaleType,
    pub due_date: Option<NaiveDate>,
    pub client_name: Option<String>,
}

/// All transactions of one local calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateGroup {
    /// "YYYY-MM-DD"
    pub date_key: String,
    /// e.g. "segunda-feira, 15/01/2024"
    pub date_label: String,
    pub transactions: Vec<Transaction>,
}

pub fn items_summary(items: &[CartItem]) -> String {
    items
        .iter()
        .map(|i| format!("{}x {}", i.qty, i.name))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<&Transaction> for SaleSummary {
    fn from(t: &Transaction) -> Self {
        SaleSummary {
            id: t.id.clone(),
            time: t.date.with_timezone(&Local).format("%H:%M").to_string(),
            items_summary: items_summary(&t.items),
            items: t.items.clone(),
            total: t.amount,
            status: t.status,
            sale_type: t.sale_type,
            due_date: t.due_date,
            client_name: t.client_name.clone(),
        }
    }
}

/// Sales with items recorded on `day`, most recent first.
pub fn sales_list_on(transactions: &[Transaction], day: NaiveDate) -> Vec<SaleSummary> {
    newest_first(transactions)
        .iter()
        .filter(|t| t.is_sale() && !t.items.is_empty() && t.local_date() == day)
        .map(SaleSummary::from)
        .collect()
}

fn date_label(t: &Transaction) -> String {
    t.date
        .with_timezone(&Local)
        .format_localized("%A, %d/%m/%Y", DISPLAY_LOCALE)
        .to_string()
}

/// Transactions bucketed by local calendar day. Buckets and their contents
/// are both most recent first.
pub fn group_by_date(transactions: &[Transaction]) -> Vec<DateGroup> {
    let mut groups: Vec<DateGroup> = Vec::new();
    for t in newest_first(transactions) {
        let date_key = t.local_date().format("%Y-%m-%d").to_string();
        match groups.last_mut() {
            Some(group) if group.date_key == date_key => group.transactions.push(t),
            _ => {
                let date_label = date_label(&t);
                groups.push(DateGroup {
                    date_key,
                    date_label,
                    transactions: vec![t],
                });
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;
    use crate::domain::SaleOptions;

    #[test]
    fn test_items_summary() {
        let items = vec![
            CartItem::new("1", "Brigadeiro", 395, 2),
            CartItem::new("2", "Lasanha", 2800, 1),
        ];
        assert_eq!(items_summary(&items), "2x Brigadeiro, 1x Lasanha");
        assert_eq!(items_summary(&[]), "");
    }

    #[test]
    fn test_sale_summary_projection() {
        let date = Local
            .with_ymd_and_hms(2024, 3, 8, 14, 5, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc);
        let options = SaleOptions::default()
            .with_status(PaymentStatus::Pending)
            .with_sale_type(SaleType::Resale)
            .with_client_name("Ana");
        let sale = Transaction::sale(vec![CartItem::new("4", "Mini Pizza", 2825, 2)], options, date);

        let summary = SaleSummary::from(&sale);

        assert_eq!(summary.time, "14:05");
        assert_eq!(summary.items_summary, "2x Mini Pizza");
        assert_eq!(summary.total, 5650);
        assert_eq!(summary.status, PaymentStatus::Pending);
        assert_eq!(summary.sale_type, SaleType::Resale);
        assert_eq!(summary.client_name.as_deref(), Some("Ana"));
    }

    #[test]
    fn test_views_serialize_in_camel_case() {
        let date = "2024-05-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let sale = Transaction::sale(
            vec![CartItem::new("1", "Brigadeiro", 395, 1)],
            SaleOptions::default().with_client_name("Ana"),
            date,
        );

        let summary = serde_json::to_value(SaleSummary::from(&sale)).unwrap();
        assert_eq!(summary["itemsSummary"], "1x Brigadeiro");
        assert_eq!(summary["saleType"], "DIRECT");
        assert_eq!(summary["clientName"], "Ana");
        assert!(summary.get("items_summary").is_none());

        let groups = serde_json::to_value(group_by_date(&[sale])).unwrap();
        assert!(groups[0]["dateKey"].is_string());
        assert!(groups[0]["dateLabel"].is_string());
        assert_eq!(groups[0]["transactions"][0]["saleType"], "DIRECT");
    }

    #[test]
    fn test_sales_list_skips_expenses_and_other_days() {
        let now = Utc::now();
        let today = now.with_timezone(&Local).date_naive();
        let earlier = Transaction::sale(
            vec![CartItem::new("1", "Brigadeiro", 395, 1)],
            SaleOptions::default(),
            now - Duration::minutes(1),
        );
        let latest = Transaction::sale(
            vec![CartItem::new("5", "Mini Lanche", 600, 3)],
            SaleOptions::default(),
            now,
        );
        let old = Transaction::sale(
            vec![CartItem::new("1", "Brigadeiro", 395, 1)],
            SaleOptions::default(),
            now - Duration::days(2),
        );
        let mut itemless = latest.clone();
        itemless.id = "no-items".to_string();
        itemless.items.clear();
        let expense = Transaction::expense(1000, "Leite", now);

        let list = sales_list_on(&[earlier.clone(), expense, old, itemless, latest.clone()], today);
        let ids: Vec<&str> = list.iter().map(|s| s.id.as_str()).collect();

        assert_eq!(ids, vec![latest.id.as_str(), earlier.id.as_str()]);
    }

    #[test]
    fn test_group_by_date_labels_in_portuguese() {
        let date = Local
            .with_ymd_and_hms(2024, 1, 15, 12, 0, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc);
        let groups = group_by_date(&[Transaction::expense(100, "Ovos", date)]);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].date_key, "2024-01-15");
        assert!(groups[0].date_label.starts_with("segunda"));
        assert!(groups[0].date_label.ends_with(", 15/01/2024"));
    }

    #[test]
    fn test_group_by_date_partitions_every_transaction_once() {
        let base = "2024-05-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let mut transactions = Vec::new();
        for day in 0..4 {
            for hour in 0..3 {
                let date = base + Duration::days(day) + Duration::minutes(hour * 10);
                transactions.push(Transaction::expense(100, "Gás", date));
            }
        }
        transactions.reverse();

        let groups = group_by_date(&transactions);

        assert_eq!(groups.len(), 4);
        let total: usize = groups.iter().map(|g| g.transactions.len()).sum();
        assert_eq!(total, transactions.len());
        for window in groups.windows(2) {
            assert!(window[0].date_key > window[1].date_key);
        }
        for group in &groups {
            for pair in group.transactions.windows(2) {
                assert!(pair[0].date >= pair[1].date);
            }
        }
    }
}
