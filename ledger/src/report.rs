//! Aggregates behind the role dashboards.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Inclusive date window of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl ReportWindow {
    /// Check if a date falls inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }
}

impl From<(NaiveDate, NaiveDate)> for ReportWindow {
    fn from((from, to): (NaiveDate, NaiveDate)) -> Self {
        Self { from, to }
    }
}

/// Count and nominal sum of a set of transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tally {
    pub count: u64,
    pub nominal: Decimal,
}

impl Tally {
    /// Add one transaction.
    pub fn add(&mut self, nominal: Decimal) {
        self.count += 1;
        self.nominal += nominal;
    }
}

/// Nominal sum of one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyNominal {
    /// 1-based month.
    pub month: u32,
    pub nominal: Decimal,
}

/// Platform-wide figures.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdminReport {
    /// P2P transactions in the window.
    pub peer_trx_count: u64,
    /// P2B transactions in the window.
    pub merchant_trx_count: u64,
    /// System transactions in the window.
    pub system_trx_count: u64,
    pub total_customers: u64,
    pub total_merchants: u64,
    /// Nominal of every month (1 to 12) of the window's year.
    pub trx_traffic: Vec<MonthlyNominal>,
}

/// Figures for one merchant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MerchantReport {
    /// Incoming P2B transactions in the window.
    pub incoming: Tally,
    /// Pending settlement nominal in the window.
    pub pending_settlement: Decimal,
    /// Paid-out nominal in the window.
    pub paid_out: Decimal,
}

/// Figures for one customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CustomerReport {
    /// Outgoing P2P transactions in the window.
    pub peer: Tally,
    /// Outgoing P2B transactions in the window.
    pub merchant: Tally,
}
