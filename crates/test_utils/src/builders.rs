//! Fluent construction of raw-activity transactions for tests.

use chrono::NaiveDate;
use core_kernel::{field, FieldValue, Transaction};
use rust_decimal::Decimal;

/// Shorthand for a known-valid calendar date.
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

/// Builds a transaction the way a raw activity row would arrive: a code,
/// the two security legs and the monetary facts.
pub struct TransactionBuilder {
    txn: Transaction,
}

impl TransactionBuilder {
    pub fn new(code: &str) -> Self {
        let mut txn = Transaction::new();
        txn.set(field::TRANSACTION_CODE, code);
        Self { txn }
    }

    /// Sets trade and settle date to the same day.
    pub fn on(self, day: NaiveDate) -> Self {
        self.trade_date(day).settle_date(day)
    }

    pub fn trade_date(mut self, day: NaiveDate) -> Self {
        self.txn.set(field::TRADE_DATE, day);
        self
    }

    pub fn settle_date(mut self, day: NaiveDate) -> Self {
        self.txn.set(field::SETTLE_DATE, day);
        self
    }

    pub fn portfolio(mut self, code: &str) -> Self {
        self.txn.set(field::PORTFOLIO_CODE, code);
        self
    }

    pub fn symbols(mut self, symbol1: &str, symbol2: &str) -> Self {
        self.txn.set(field::SYMBOL1, symbol1);
        self.txn.set(field::SYMBOL2, symbol2);
        self
    }

    pub fn security_ids(mut self, id1: i64, id2: i64) -> Self {
        self.txn.set(field::SECURITY_ID1, id1);
        self.txn.set(field::SECURITY_ID2, id2);
        self
    }

    pub fn identity(mut self, ptid: i64, tranid: i64, lot: i64) -> Self {
        self.txn.set(field::PORTFOLIO_TRANSACTION_ID, ptid);
        self.txn.set(field::TRAN_ID, tranid);
        self.txn.set(field::LOT_NUMBER, lot);
        self
    }

    pub fn amount(mut self, amount: Decimal) -> Self {
        self.txn.set(field::TRADE_AMOUNT, amount);
        self
    }

    pub fn amount_local(mut self, amount: Decimal) -> Self {
        self.txn.set(field::TRADE_AMOUNT_LOCAL, amount);
        self
    }

    pub fn quantity(mut self, quantity: Decimal) -> Self {
        self.txn.set(field::QUANTITY, quantity);
        self
    }

    /// Escape hatch for any other field.
    pub fn field(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.txn.set(key, value);
        self
    }

    pub fn build(self) -> Transaction {
        self.txn
    }
}
