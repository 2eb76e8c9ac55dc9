//! Deposit/withdrawal netting.
//!
//! After the wash rules, the surviving cash legs for one security and day
//! are collapsed into a single net movement: withdrawals are negated, legs
//! are summed per group, and the sign of the net trade amount decides
//! whether a Contribution (dp) or Withdrawal (wd) is emitted. A group that
//! nets to exactly zero disappears.

use std::collections::BTreeMap;

use core_kernel::{field, FieldValue, Transaction, TransactionCode};
use rust_decimal::Decimal;
use tracing::debug;

const STAGE: &str = "net_deposits_withdrawals";

const GROUP_FIELDS: [&str; 7] = [
    field::TRADE_CCY,
    field::PORTFOLIO_CODE,
    field::SYMBOL,
    field::SECURITY_ID,
    field::TRADE_DATE,
    field::SETTLE_DATE,
    field::COMMENT01,
];

/// Withdrawal legs enter the sum with reversed signs.
const NEGATE_FIELDS: [&str; 6] = [
    field::QUANTITY,
    field::TRADE_AMOUNT,
    field::COMMISSION,
    field::TAXES,
    field::CHARGES,
    field::TRADE_AMOUNT_LOCAL,
];

const SUM_FIELDS: [&str; 17] = [
    field::QUANTITY,
    field::TRADE_AMOUNT,
    field::COMMISSION,
    field::TAXES,
    field::CHARGES,
    field::TRADE_AMOUNT_LOCAL,
    field::REALIZED_GAIN,
    field::NET_INTEREST,
    field::NET_DIVIDEND,
    field::NET_ELIG_DIVIDEND,
    field::NET_NON_ELIG_DIVIDEND,
    field::NET_FGN_INCOME,
    field::CAP_GAINS_DISTRIB,
    field::RET_OF_CAPITAL,
    field::TOTAL_INCOME,
    field::TFSA_CONTRIB_AMT,
    field::RSP_CONTRIB_AMT,
];

struct Aggregate {
    representative: Transaction,
    keys: Vec<String>,
    legs: usize,
}

impl Aggregate {
    fn seed(mut txn: Transaction) -> Self {
        // Normalize the sum fields so later absorption is plain addition.
        for col in SUM_FIELDS {
            let value = txn.number_or_zero(col);
            txn.set(col, value);
        }
        let key = txn.text(field::LOCAL_TRAN_KEY).unwrap_or("").to_string();
        Self {
            representative: txn,
            keys: vec![key],
            legs: 1,
        }
    }

    fn absorb(&mut self, txn: &Transaction) {
        for col in SUM_FIELDS {
            let total = self.representative.number_or_zero(col) + txn.number_or_zero(col);
            self.representative.set(col, total);
        }
        self.keys
            .push(txn.text(field::LOCAL_TRAN_KEY).unwrap_or("").to_string());
        self.legs += 1;
    }
}

/// Collapses dp/wd legs into net movements; all other transactions pass
/// through unchanged, aggregates appended after them in group-key order.
pub fn net_deposits_withdrawals(transactions: Vec<Transaction>) -> Vec<Transaction> {
    let mut retained = Vec::new();
    let mut groups: BTreeMap<Vec<FieldValue>, Aggregate> = BTreeMap::new();

    for mut txn in transactions {
        let code = txn.code();
        if !code.is_cash_movement() {
            retained.push(txn);
            continue;
        }
        if code == TransactionCode::Withdrawal {
            for col in NEGATE_FIELDS {
                if let Some(n) = txn.number(col) {
                    txn.set(col, -n);
                }
            }
        }
        let group_key: Vec<FieldValue> = GROUP_FIELDS
            .iter()
            .map(|col| txn.get(col).cloned().unwrap_or(FieldValue::Null))
            .collect();
        match groups.get_mut(&group_key) {
            Some(aggregate) => aggregate.absorb(&txn),
            None => {
                groups.insert(group_key, Aggregate::seed(txn));
            }
        }
    }

    for aggregate in groups.into_values() {
        let Aggregate {
            mut representative,
            keys,
            legs,
        } = aggregate;
        let net = representative.number_or_zero(field::TRADE_AMOUNT);
        if net.is_zero() {
            debug!(keys = %keys.join(", "), "cash legs net to zero, omitting");
            continue;
        }
        if net > Decimal::ZERO {
            representative.set_code(&TransactionCode::Deposit);
            representative.set(field::TRANSACTION_NAME, "Contribution");
        } else {
            representative.set_code(&TransactionCode::Withdrawal);
            representative.set(field::TRANSACTION_NAME, "Withdrawal");
            for col in SUM_FIELDS {
                let value = representative.number_or_zero(col);
                representative.set(col, value.abs());
            }
        }
        if legs > 1 {
            representative.add_lineage(
                STAGE,
                format!("Aggregated {legs} cash legs: {}", keys.join(", ")),
            );
        }
        retained.push(representative);
    }
    retained
}
