use chrono::NaiveDate;

use super::{Cents, Transaction};

fn sum_where(transactions: &[Transaction], pred: impl Fn(&Transaction) -> bool) -> Cents {
    transactions
        .iter()
        .filter(|&t| pred(t))
        .map(|t| t.amount)
        .sum()
}

/// Sum of sales recorded on the given local calendar day.
pub fn sales_on(transactions: &[Transaction], day: NaiveDate) -> Cents {
    sum_where(transactions, |t| t.is_sale() && t.local_date() == day)
}

/// Sum of expenses recorded on the given local calendar day.
pub fn expenses_on(transactions: &[Transaction], day: NaiveDate) -> Cents {
    sum_where(transactions, |t| t.is_expense() && t.local_date() == day)
}

/// Sales minus expenses for one day.
pub fn balance_on(transactions: &[Transaction], day: NaiveDate) -> Cents {
    sales_on(transactions, day) - expenses_on(transactions, day)
}

pub fn total_sales(transactions: &[Transaction]) -> Cents {
    sum_where(transactions, Transaction::is_sale)
}

pub fn total_expenses(transactions: &[Transaction]) -> Cents {
    sum_where(transactions, Transaction::is_expense)
}

/// Lifetime net: every sale minus every expense, regardless of payment status.
pub fn total_balance(transactions: &[Transaction]) -> Cents {
    total_sales(transactions) - total_expenses(transactions)
}

/// Cash actually received: paid sales minus every expense.
pub fn received_balance(transactions: &[Transaction]) -> Cents {
    sum_where(transactions, Transaction::is_paid_sale) - total_expenses(transactions)
}

/// Money still owed by clients.
pub fn total_pending(transactions: &[Transaction]) -> Cents {
    sum_where(transactions, Transaction::is_pending)
}

/// Pending sales, earliest settlement first. Ties keep ledger order.
pub fn pending_sales(transactions: &[Transaction]) -> Vec<Transaction> {
    let mut pending: Vec<Transaction> = transactions
        .iter()
        .filter(|t| t.is_pending())
        .cloned()
        .collect();
    pending.sort_by_key(Transaction::settlement_time);
    pending
}

/// Every transaction, most recent first.
pub fn newest_first(transactions: &[Transaction]) -> Vec<Transaction> {
    let mut sorted = transactions.to_vec();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));
    sorted
}
