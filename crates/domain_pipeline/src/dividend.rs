//! Dividend settlement merge.
//!
//! Dividends are reported when they settle, not when they trade, so the
//! engine fetches activity with a lookback window and re-anchors each
//! dividend's trade date to its settle date. A dividend paid in another
//! currency arrives with a companion currency sale; that sale is folded
//! into the dividend record and removed. A companion cash leg is only
//! noted, it still flows through the wash rules on its own.

use std::collections::HashMap;

use core_kernel::{field, DateRange, Transaction, TransactionCode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

const STAGE: &str = "merge_dividends";

/// How far back activity is fetched so settling dividends can find the
/// legs they traded with.
pub const HISTORY_WINDOW_DAYS: u64 = 70;

/// Columns folded from the companion currency sale into the dividend.
const MERGE_COPY_COLUMNS: [&str; 9] = [
    field::SECURITY_ID2,
    field::TRADE_AMOUNT,
    field::TRADE_DATE_FX,
    field::SETTLE_DATE_FX,
    field::SPOT_RATE,
    field::FX_DENOMINATOR_CURRENCY_CODE,
    field::FX_NUMERATOR_CURRENCY_CODE,
    field::SEC_TYPE_CODE2,
    field::FX_RATE,
];

pub struct DividendMergeResolver {
    /// Local-amount tolerance when pairing a dividend with its legs.
    tolerance: Decimal,
}

impl Default for DividendMergeResolver {
    fn default() -> Self {
        Self {
            tolerance: dec!(0.015),
        }
    }
}

impl DividendMergeResolver {
    pub fn new(tolerance: Decimal) -> Self {
        Self { tolerance }
    }

    /// Selects the transactions for `window` out of the raw lookback batch:
    /// non-dividends trading in the window, plus dividends settling in it,
    /// re-anchored and merged with their companion legs.
    pub fn resolve(
        &self,
        transactions: Vec<Transaction>,
        window: &DateRange,
        realized_gains: &HashMap<Decimal, Decimal>,
    ) -> Vec<Transaction> {
        let mut dividends = Vec::new();
        let mut others = Vec::new();
        for txn in transactions {
            let settles_in_window = txn
                .date(field::SETTLE_DATE)
                .map(|d| window.contains(d))
                .unwrap_or(false);
            if txn.code() == TransactionCode::Dividend && settles_in_window {
                dividends.push(txn);
            } else {
                others.push(txn);
            }
        }

        let mut consumed = vec![false; others.len()];
        for dividend in &mut dividends {
            let Some(settle) = dividend.date(field::SETTLE_DATE) else {
                continue;
            };
            dividend.set(field::TRADE_DATE, settle);
            dividend.add_lineage(
                STAGE,
                format!("Re-anchored TradeDate to SettleDate {settle}"),
            );
            let dividend_local = dividend.number_or_zero(field::TRADE_AMOUNT_LOCAL);

            // Companion cash leg: noted for the audit trail, never removed.
            if dividend.is_set(field::SECURITY_ID2) {
                for (i, other) in others.iter().enumerate() {
                    if consumed[i] || !other.code().is_cash_movement() {
                        continue;
                    }
                    if other.date(field::SETTLE_DATE) != Some(settle) {
                        continue;
                    }
                    if other.get(field::SECURITY_ID1) != dividend.get(field::SECURITY_ID2) {
                        continue;
                    }
                    let diff =
                        (other.number_or_zero(field::TRADE_AMOUNT_LOCAL) - dividend_local).abs();
                    if diff < self.tolerance {
                        dividend.add_lineage(
                            STAGE,
                            format!("Matched cash leg settling {settle} within {}", self.tolerance),
                        );
                        break;
                    }
                }
            }

            // Companion currency sale: folded in and removed.
            for i in 0..others.len() {
                if consumed[i] {
                    continue;
                }
                let other = &others[i];
                if other.code() != TransactionCode::Sell
                    || other.date(field::SETTLE_DATE) != Some(settle)
                    || other.text(field::SEC_TYPE_CODE1) != Some("ca")
                    || other.text(field::SEC_TYPE_CODE2) != Some("ca")
                {
                    continue;
                }
                let diff = (other.number_or_zero(field::TRADE_AMOUNT_LOCAL) - dividend_local).abs();
                if diff >= self.tolerance {
                    continue;
                }
                consumed[i] = true;
                let sale = others[i].clone();
                for col in MERGE_COPY_COLUMNS {
                    if let Some(value) = sale.get(col).cloned() {
                        dividend.set(col, value);
                    }
                }
                let gain = sale
                    .number(field::PORTFOLIO_TRANSACTION_ID)
                    .and_then(|id| realized_gains.get(&id).copied())
                    .unwrap_or_default();
                if !gain.is_zero() {
                    let total = dividend.number_or_zero(field::REALIZED_GAIN_LOSS) + gain;
                    dividend.set(field::REALIZED_GAIN_LOSS, total);
                }
                dividend.add_lineage(
                    STAGE,
                    format!(
                        "Merged currency sale settling {settle}; RealizedGainLoss adjusted by {gain}"
                    ),
                );
                break;
            }
        }

        let mut selected: Vec<Transaction> = others
            .into_iter()
            .zip(consumed)
            .filter_map(|(txn, used)| {
                if used {
                    return None;
                }
                // Dividends are settle-dated; one not settling in this
                // window belongs to another day's batch.
                if txn.code() == TransactionCode::Dividend {
                    return None;
                }
                let trades_in_window = txn
                    .date(field::TRADE_DATE)
                    .map(|d| window.contains(d))
                    .unwrap_or(false);
                trades_in_window.then_some(txn)
            })
            .collect();
        debug!(
            selected = selected.len(),
            dividends = dividends.len(),
            "dividend merge complete"
        );
        selected.extend(dividends);
        selected
    }
}
