//! Fixed-income maturity handling.
//!
//! A sale of a short-term instrument with a known cost basis is really two
//! economic events: the return of principal and the interest earned. The
//! sale is split into a residual principal record and a synthetic interest
//! record so income reporting sees the interest separately. Sales on or
//! after the maturity date become maturities.

use core_kernel::{field, Transaction, TransactionCode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::PipelineError;
use crate::rules::build_local_tran_key;

const STAGE: &str = "split_fixed_income_maturity";

/// Splits an st sale into principal and interest, or reclassifies a matured
/// sale as `mt`. Returns the synthetic interest record when a split occurs;
/// the caller emits it without re-running the rules over it.
pub fn split_fixed_income_maturity(
    txn: &mut Transaction,
) -> Result<Option<Transaction>, PipelineError> {
    if txn.code() != TransactionCode::Sell {
        return Ok(None);
    }
    if txn.text(field::SEC_TYPE_BASE_CODE1) != Some("st") {
        reclassify_if_matured(txn);
        return Ok(None);
    }
    if !txn.is_set(field::RPT_COST_BASIS) {
        return Ok(None);
    }

    let amount = txn.number_or_zero(field::TRADE_AMOUNT);
    let amount_local = txn.number_or_zero(field::TRADE_AMOUNT_LOCAL);
    let income_local = amount_local - txn.number_or_zero(field::LOCAL_COST_BASIS);
    let fx_rate = match txn.nonzero(field::TRADE_AMOUNT_LOCAL) {
        Some(local) => amount / local,
        None => Decimal::ONE,
    };
    // The FX quotient is a full-precision Decimal; rounding the interest to
    // monetary scale keeps principal + interest equal to the original amount.
    let income = (fx_rate * income_local).round_dp(2);

    let spawned = build_interest_record(txn, fx_rate, income, income_local)?;

    let rpt_cost = txn.number_or_zero(field::RPT_COST_BASIS);
    txn.set(field::REALIZED_GAIN, amount - rpt_cost - income);
    txn.add_lineage(
        STAGE,
        format!("Assigned RealizedGain net of interest component {income}"),
    );

    let matured = matches!(
        (txn.date(field::TRADE_DATE), txn.date(field::MATURITY_DATE1)),
        (Some(trade), Some(maturity)) if trade >= maturity
    );
    if matured {
        txn.set(field::PRICE_PER_UNIT, dec!(100));
        txn.set(field::TRADE_AMOUNT, rpt_cost);
        txn.set(field::REALIZED_GAIN, Decimal::ZERO);
        txn.set_code(&TransactionCode::Maturity);
        txn.add_lineage(STAGE, "Reclassified matured short-term sale as mt at par");
    } else {
        txn.set(field::TRADE_AMOUNT, amount - income);
        txn.set(field::TRADE_AMOUNT_LOCAL, amount_local - income_local);
        txn.add_lineage(
            STAGE,
            format!("Reduced trade amounts by interest component {income}"),
        );
    }
    Ok(Some(spawned))
}

fn build_interest_record(
    txn: &Transaction,
    fx_rate: Decimal,
    income: Decimal,
    income_local: Decimal,
) -> Result<Transaction, PipelineError> {
    let mut spawned = txn.clone();
    spawned.set(field::TRADE_DATE_FX, fx_rate);
    spawned.set_code(&TransactionCode::Interest);
    spawned.set(field::TRADE_AMOUNT, income);
    spawned.set(field::TRADE_AMOUNT_LOCAL, income_local);
    spawned.set(field::REALIZED_GAIN, Decimal::ZERO);
    spawned.set(field::COMMISSION, Decimal::ZERO);
    for col in [
        field::PRICE_PER_UNIT,
        field::PRICE_PER_UNIT_LOCAL,
        field::COST_PER_UNIT,
        field::COST_PER_UNIT_LOCAL,
        field::QUANTITY,
    ] {
        spawned.unset(col);
    }
    spawned.set(field::NET_INTEREST, income);
    spawned.set(field::NET_DIVIDEND, Decimal::ZERO);
    spawned.set(field::NET_ELIG_DIVIDEND, Decimal::ZERO);
    spawned.set(field::NET_NON_ELIG_DIVIDEND, Decimal::ZERO);
    spawned.set(field::NET_FGN_INCOME, Decimal::ZERO);
    spawned.set(field::CAP_GAINS_DISTRIB, Decimal::ZERO);
    spawned.set(field::TOTAL_INCOME, income);
    spawned.set(field::LOCAL_TRAN_KEY_SUFFIX, "_A_B");
    let key = build_local_tran_key(&spawned, field::SYMBOL1)?;
    spawned.set(field::LOCAL_TRAN_KEY, key);

    let parent_key = txn.text(field::LOCAL_TRAN_KEY).unwrap_or("").to_string();
    spawned.add_lineage(
        STAGE,
        format!("*** Created as the interest component of {parent_key} ***"),
    );
    Ok(spawned)
}

fn reclassify_if_matured(txn: &mut Transaction) {
    if let (Some(trade), Some(maturity)) = (
        txn.date(field::TRADE_DATE),
        txn.date(field::MATURITY_DATE1),
    ) {
        if trade >= maturity {
            txn.set_code(&TransactionCode::Maturity);
            txn.add_lineage(STAGE, "Reclassified sale on or after maturity as mt");
        }
    }
}
