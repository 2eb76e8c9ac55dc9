//! The per-transaction normalization rules, applied in a fixed order.
//!
//! Rules mutate the record in place and report a [`Disposition`]: most keep
//! the transaction, wash legs drop it, and a fixed-income maturity can spawn
//! a synthetic interest record. Drop and spawn both short-circuit whatever
//! rules remain for that transaction.

use chrono::Days;
use core_kernel::{field, Transaction, TransactionCode};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::PipelineError;
use crate::maturity::split_fixed_income_maturity;

/// Outcome of the rule pass for one transaction.
#[derive(Debug)]
pub enum Disposition {
    /// Continue downstream.
    Keep,
    /// Discard the transaction; the reason is logged, not persisted.
    Drop(String),
    /// Keep the transaction and additionally emit a synthetic one. The
    /// spawned record does not re-enter the rule pass.
    Spawn(Box<Transaction>),
}

/// Sale amounts below this are rounding dust, not real interest.
const NEGLIGIBLE_AMOUNT: Decimal = dec!(0.000001);

/// Security columns carried from the second leg onto the first when a cash
/// wash is re-pointed at its security leg.
const WASH_COPY_COLUMNS: [&str; 7] = [
    "Symbol",
    "SecurityID",
    "ProprietarySymbol",
    "PrincipalCurrencyCode",
    "FullName",
    "Name4Stmt",
    "Name4Trading",
];

/// Runs the full ordered rule pass over one transaction.
pub fn apply_rules(txn: &mut Transaction) -> Result<Disposition, PipelineError> {
    assign_fx_rate(txn);

    if txn.code().is_cash_movement() {
        if let Disposition::Drop(reason) = massage_deposits_withdrawals(txn) {
            return Ok(Disposition::Drop(reason));
        }
    }
    if let Some(reason) = drop_cash_to_cash(txn) {
        return Ok(Disposition::Drop(reason));
    }
    if txn.code() == TransactionCode::LongIn {
        assign_cost_basis(txn);
    }
    delay_coupon_settlement(txn);
    if let Some(reason) = drop_negligible_short_term_interest(txn) {
        return Ok(Disposition::Drop(reason));
    }
    if let Some(reason) = drop_unsettled_dividends(txn) {
        return Ok(Disposition::Drop(reason));
    }
    attribute_distribution(txn);
    assign_rebate_comment(txn);
    assign_contribution_amount(txn);
    add_fields(txn)?;
    if let Some(spawned) = split_fixed_income_maturity(txn)? {
        return Ok(Disposition::Spawn(Box::new(spawned)));
    }
    massage_names_for_cash(txn);
    Ok(Disposition::Keep)
}

/// FxRate precedence: the trade-date FX fact, then parity for same-currency
/// records, then the implied quotient of reporting over local amounts.
pub fn assign_fx_rate(txn: &mut Transaction) {
    const STAGE: &str = "assign_fx_rate";
    if let Some(rate) = txn.nonzero(field::TRADE_DATE_FX) {
        txn.set(field::FX_RATE, rate);
        txn.add_lineage(STAGE, format!("Assigned FxRate from TradeDateFX={rate}"));
    } else if txn.text(field::PRINCIPAL_CURRENCY_ISO_CODE1).is_some()
        && txn.text(field::PRINCIPAL_CURRENCY_ISO_CODE1)
            == txn.text(field::REPORTING_CURRENCY_ISO_CODE)
    {
        txn.set(field::FX_RATE, Decimal::ONE);
        txn.add_lineage(
            STAGE,
            "Assigned FxRate as 1.0; security currency matches reporting currency",
        );
    } else if let (Some(amount), Some(local)) = (
        txn.nonzero(field::TRADE_AMOUNT),
        txn.nonzero(field::TRADE_AMOUNT_LOCAL),
    ) {
        let rate = amount / local;
        txn.set(field::FX_RATE, rate);
        txn.add_lineage(
            STAGE,
            format!("Assigned FxRate as TradeAmount/TradeAmountLocal={rate}"),
        );
    }
}

fn copy_leg2_security_columns(txn: &mut Transaction) {
    for col in WASH_COPY_COLUMNS {
        txn.copy_field(&format!("{col}2"), &format!("{col}1"));
    }
}

/// Classifies deposit/withdrawal legs by their wash symbols. Internal wash
/// legs are dropped; fee, tax and client-cash legs are re-pointed at the
/// security side or reclassified.
pub fn massage_deposits_withdrawals(txn: &mut Transaction) -> Disposition {
    const STAGE: &str = "massage_deposits_withdrawals";
    let symbol1_lower = txn.text(field::SYMBOL1).unwrap_or("").to_lowercase();
    let symbol2_lower = txn.text(field::SYMBOL2).unwrap_or("").to_lowercase();

    if symbol2_lower == "client" {
        copy_leg2_security_columns(txn);
        txn.add_lineage(STAGE, "Re-pointed client cash wash at its security leg");
        Disposition::Keep
    } else if symbol2_lower == "whnrtax" || symbol2_lower == "whfedtax" {
        txn.set_code(&TransactionCode::WithholdingTax);
        copy_leg2_security_columns(txn);
        txn.add_lineage(
            STAGE,
            format!("Reclassified as wt against wash symbol {symbol2_lower}"),
        );
        Disposition::Keep
    } else if matches!(
        symbol1_lower.as_str(),
        "whnrtax" | "whfedtax" | "dvshrt" | "dvwash" | "mfr"
    ) {
        Disposition::Drop(format!("internal wash leg '{symbol1_lower}'"))
    } else if symbol1_lower == "manfee" || symbol1_lower == "manrfee" {
        if !txn.is_truthy(field::SECURITY_ID2) {
            Disposition::Drop(format!("management fee leg '{symbol1_lower}' with no security"))
        } else {
            txn.set_code(&TransactionCode::ExpensePaid);
            txn.add_lineage(STAGE, "Reclassified management fee as ep");
            Disposition::Keep
        }
    } else if symbol1_lower == "cust" {
        txn.set_code(&TransactionCode::Expense);
        txn.add_lineage(STAGE, "Reclassified custody fee as ex");
        Disposition::Keep
    } else if txn.text(field::SYMBOL1) == Some("cash")
        && txn.text(field::SEC_TYPE_BASE_CODE2) == Some("aw")
    {
        Disposition::Drop("cash leg of an accrual wash".to_string())
    } else if txn.text(field::SYMBOL1) == Some("income")
        && !txn.is_truthy(field::SECURITY_ID2)
        && txn.text(field::SEC_TYPE_BASE_CODE2) == Some("aw")
    {
        Disposition::Drop("income accrual wash with no security".to_string())
    } else if txn.text(field::SYMBOL1) == Some("income")
        && txn.text(field::SYMBOL2) == Some("cash")
        && txn.text(field::SEC_TYPE_BASE_CODE2) == Some("aw")
    {
        txn.set(field::SYMBOL1, "client");
        txn.add_lineage(STAGE, "Represented income accrual wash as client cash");
        Disposition::Keep
    } else {
        Disposition::Drop(format!(
            "unrecognized cash movement (Symbol1={symbol1_lower}, Symbol2={symbol2_lower})"
        ))
    }
}

fn drop_cash_to_cash(txn: &mut Transaction) -> Option<String> {
    let code = txn.code();
    if matches!(code, TransactionCode::Sell | TransactionCode::Buy)
        && txn.text(field::SYMBOL1) == Some("cash")
        && txn.text(field::SYMBOL2) == Some("cash")
    {
        Some("cash-to-cash transfer leg".to_string())
    } else {
        None
    }
}

/// Long-in transfers carry their original cost; derive the per-unit costs.
pub fn assign_cost_basis(txn: &mut Transaction) {
    const STAGE: &str = "assign_cost_basis";
    let quantity = txn.number_or_zero(field::QUANTITY);
    if let Some(local_cost) = txn.nonzero(field::ORIGINAL_COST_LOCAL_CURRENCY) {
        let per_unit = if quantity.is_zero() {
            Decimal::ZERO
        } else {
            local_cost / quantity
        };
        txn.set(field::LOCAL_COST_BASIS, local_cost);
        txn.set(field::LOCAL_COST_PER_UNIT, per_unit);
        txn.add_lineage(
            STAGE,
            format!("Assigned LocalCostBasis={local_cost}, LocalCostPerUnit={per_unit}"),
        );
    }
    if let Some(cost) = txn.nonzero(field::ORIGINAL_COST) {
        let per_unit = if quantity.is_zero() {
            Decimal::ZERO
        } else {
            cost / quantity
        };
        txn.set(field::RPT_COST_BASIS, cost);
        txn.set(field::RPT_COST_PER_UNIT, per_unit);
        txn.add_lineage(
            STAGE,
            format!("Assigned RptCostBasis={cost}, RptCostPerUnit={per_unit}"),
        );
    }
}

/// Mortgage and variable-rate coupons settle after a delay, but the raw feed
/// books them same-day. Push the settle date forward by the security's
/// configured delay unless the sentinel flag says the delay is type-derived.
pub fn delay_coupon_settlement(txn: &mut Transaction) {
    const STAGE: &str = "delay_coupon_settlement";
    if !matches!(
        txn.code(),
        TransactionCode::Paydown | TransactionCode::Interest
    ) {
        return;
    }
    if !matches!(txn.text(field::SEC_TYPE_BASE_CODE1), Some("cm") | Some("vm")) {
        return;
    }
    let (Some(trade), Some(settle)) = (
        txn.date(field::TRADE_DATE),
        txn.date(field::SETTLE_DATE),
    ) else {
        return;
    };
    if trade != settle || txn.flag(field::USE_SEC_TYPE_FOR_COUPON_DELAY_DAYS1) {
        return;
    }
    let days = txn
        .number(field::COUPON_DELAY_DAYS1)
        .and_then(|d| d.to_i64())
        .unwrap_or(0);
    if days <= 0 {
        return;
    }
    if let Some(delayed) = settle.checked_add_days(Days::new(days as u64)) {
        txn.set(field::SETTLE_DATE, delayed);
        txn.add_lineage(STAGE, format!("Delayed SettleDate by {days} coupon days"));
    }
}

fn drop_negligible_short_term_interest(txn: &mut Transaction) -> Option<String> {
    if txn.text(field::SEC_TYPE_BASE_CODE1) == Some("st")
        && txn.code() == TransactionCode::AccruedInterestSold
        && txn.number_or_zero(field::TRADE_AMOUNT).abs() < NEGLIGIBLE_AMOUNT
    {
        Some("negligible short-term interest sale".to_string())
    } else {
        None
    }
}

fn drop_unsettled_dividends(txn: &mut Transaction) -> Option<String> {
    if matches!(
        txn.code(),
        TransactionCode::Dividend | TransactionCode::DividendReclaim
    ) && txn.text(field::SEC_TYPE_BASE_CODE2) == Some("aw")
        && !txn.is_truthy(field::SECURITY_ID2)
    {
        Some("dividend accrual wash with no security".to_string())
    } else {
        None
    }
}

/// Splits the trade amount of income transactions into the reporting income
/// buckets and blanks the unit facts, which are meaningless for income.
pub fn attribute_distribution(txn: &mut Transaction) {
    const STAGE: &str = "attribute_distribution";
    let amount = txn.number_or_zero(field::TRADE_AMOUNT);
    match txn.code() {
        TransactionCode::Interest
        | TransactionCode::AccruedInterestSold
        | TransactionCode::AccruedInterestBought => {
            txn.set(field::NET_INTEREST, amount);
            txn.set(field::TOTAL_INCOME, amount);
            txn.set(field::QUANTITY, Decimal::ZERO);
            txn.set(field::UNIT_PRICE, Decimal::ZERO);
            txn.set(field::UNIT_PRICE_LOCAL, Decimal::ZERO);
            txn.add_lineage(STAGE, format!("Attributed {amount} to NetInterest"));
        }
        TransactionCode::Dividend => {
            txn.set(field::TOTAL_INCOME, amount);
            txn.set(field::QUANTITY, Decimal::ZERO);
            txn.set(field::UNIT_PRICE, Decimal::ZERO);
            txn.set(field::UNIT_PRICE_LOCAL, Decimal::ZERO);
            if txn.text(field::PRINCIPAL_CURRENCY_ISO_CODE1) == Some("CAD") {
                txn.set(field::NET_DIVIDEND, amount);
                txn.set(field::NET_ELIG_DIVIDEND, amount);
                txn.add_lineage(
                    STAGE,
                    format!("Attributed {amount} to NetDividend/NetEligDividend"),
                );
            } else {
                txn.set(field::NET_FGN_INCOME, amount);
                txn.add_lineage(STAGE, format!("Attributed {amount} to NetFgnIncome"));
            }
        }
        _ => {}
    }
}

fn assign_rebate_comment(txn: &mut Transaction) {
    if txn.code() == TransactionCode::Buy
        && txn.text(field::SYMBOL1) == Some("MFR")
        && !txn.is_truthy(field::COMMENT01)
    {
        txn.set(field::COMMENT01, "Management Fee Rebate");
        txn.add_lineage(
            "assign_rebate_comment",
            "Assigned Comment01 for management fee rebate",
        );
    }
}

/// Registered-plan contributions: client cash flagged CONTRIBUTION counts
/// toward the RRSP or TFSA contribution amount for the year.
pub fn assign_contribution_amount(txn: &mut Transaction) {
    const STAGE: &str = "assign_contribution_amount";
    let portfolio_type = txn.text(field::PORTFOLIO_TYPE_CODE).unwrap_or("");
    let target = if portfolio_type.contains("RRSP") {
        field::RSP_CONTRIB_AMT
    } else if portfolio_type.contains("TFSA") {
        field::TFSA_CONTRIB_AMT
    } else {
        return;
    };
    if txn.text(field::COMMENT01) != Some("CONTRIBUTION") {
        return;
    }
    let applies = match txn.code() {
        TransactionCode::Deposit => txn.text(field::SYMBOL2) == Some("client"),
        TransactionCode::Withdrawal => txn.text(field::SYMBOL1) == Some("client"),
        _ => false,
    };
    if applies {
        let amount = txn.number_or_zero(field::TRADE_AMOUNT);
        txn.set(target, amount);
        txn.add_lineage(STAGE, format!("Assigned {target}={amount}"));
    }
}

/// Projects the normalized output columns from the raw and enriched fields,
/// and builds the LocalTranKey identity.
pub fn add_fields(txn: &mut Transaction) -> Result<(), PipelineError> {
    const STAGE: &str = "add_fields";
    txn.copy_field(field::REPORT_HEADING1, field::PORTFOLIO_NAME);
    txn.copy_field(field::TRADE_DATE, field::AS_OF_DATE);
    txn.copy_field(field::SECURITY_ID1, field::SECURITY_ID);
    txn.copy_field(field::PROPRIETARY_SYMBOL1, field::PROPRIETARY_ID);
    txn.copy_field(field::SYMBOL1, field::SYMBOL);
    txn.copy_field(field::UNIT_PRICE, field::PRICE_PER_UNIT);
    txn.copy_field(field::UNIT_PRICE_LOCAL, field::PRICE_PER_UNIT_LOCAL);

    if !txn.is_set(field::FX_RATE) && txn.is_set(field::TRADE_DATE_FX) {
        txn.copy_field(field::TRADE_DATE_FX, field::FX_RATE);
        txn.add_lineage(STAGE, "Assigned FxRate from TradeDateFX");
    }
    if txn.is_set(field::ISO_CODE) {
        txn.copy_field(field::ISO_CODE, field::TRADE_CCY);
        txn.copy_field(field::ISO_CODE, field::SEC_CCY);
        txn.add_lineage(STAGE, "Assigned TradeCcy/SecCcy from ISOCode");
    }
    txn.copy_field(field::REPORTING_CURRENCY_CODE, field::RPT_CCY);

    txn.copy_field(field::RPT_COST_BASIS, field::COST_BASIS);
    txn.copy_field(field::RPT_COST_PER_UNIT, field::COST_PER_UNIT);
    txn.copy_field(field::LOCAL_COST_BASIS, field::COST_BASIS_LOCAL);
    txn.copy_field(field::LOCAL_COST_PER_UNIT, field::COST_PER_UNIT_LOCAL);
    txn.copy_field(field::REALIZED_GAIN_LOSS, field::REALIZED_GAIN);
    txn.copy_field(field::BROKER_FIRM_NAME, field::BROKER_NAME);
    txn.copy_field(field::BROKER_FIRM_SYMBOL, field::BROKER_ID);

    if !txn.is_truthy(field::LOCAL_TRAN_KEY_SUFFIX) {
        txn.set(field::LOCAL_TRAN_KEY_SUFFIX, "_A");
        txn.add_lineage(STAGE, "Assigned LocalTranKeySuffix as default=_A");
    }
    let key = build_local_tran_key(txn, field::SYMBOL)?;
    txn.set(field::LOCAL_TRAN_KEY, key.clone());

    for suffix in ["1", "2"] {
        let base_col = format!("{}{}", "SecTypeBaseCode", suffix);
        if let Some(base) = txn.text(&base_col).map(str::to_string) {
            let ccy = txn
                .text(&format!("{}{}", "PrincipalCurrencyCode", suffix))
                .unwrap_or("");
            txn.set(&format!("{}{}", "SecTypeCode", suffix), format!("{base}{ccy}"));
        }
    }

    if txn.is_set(field::FED_TAX_WITHHELD) {
        txn.copy_field(field::FED_TAX_WITHHELD, field::WH_FED_TAX_AMT);
        txn.add_lineage(STAGE, "Assigned WhFedTaxAmt from FedTaxWithheld");
    }
    if txn.is_set(field::FGN_TAX_PAID) {
        txn.copy_field(field::FGN_TAX_PAID, field::WH_NR_TAX_AMT);
        txn.add_lineage(STAGE, "Assigned WhNrTaxAmt from FgnTaxPaid");
    }
    txn.add_lineage(STAGE, format!("Assigned output columns; LocalTranKey={key}"));
    Ok(())
}

/// The per-lot transaction identity:
/// `{portfolio}_{trade}_{settle}_{symbol}_{ptid}_{tranid}_{lot}{suffix}`.
pub fn build_local_tran_key(
    txn: &Transaction,
    symbol_field: &str,
) -> Result<String, PipelineError> {
    let portfolio = txn
        .text(field::PORTFOLIO_CODE)
        .map(str::to_string)
        .or_else(|| txn.portfolio_code.clone())
        .ok_or_else(|| PipelineError::missing_field(field::PORTFOLIO_CODE, txn.to_string()))?;
    let trade = txn
        .date(field::TRADE_DATE)
        .ok_or_else(|| PipelineError::missing_field(field::TRADE_DATE, txn.to_string()))?;
    let settle = txn
        .date(field::SETTLE_DATE)
        .ok_or_else(|| PipelineError::missing_field(field::SETTLE_DATE, txn.to_string()))?;
    let symbol = txn.text(symbol_field).unwrap_or("");
    let number_part = |key: &str| {
        txn.number(key)
            .map(|n| n.normalize().to_string())
            .unwrap_or_default()
    };
    let suffix = txn.text(field::LOCAL_TRAN_KEY_SUFFIX).unwrap_or("");
    Ok(format!(
        "{portfolio}_{}_{}_{symbol}_{}_{}_{}{suffix}",
        core_kernel::compact_date(trade),
        core_kernel::compact_date(settle),
        number_part(field::PORTFOLIO_TRANSACTION_ID),
        number_part(field::TRAN_ID),
        number_part(field::LOT_NUMBER),
    ))
}

/// Cash transfer and interest legs get human-readable names when the
/// security master left them blank.
pub fn massage_names_for_cash(txn: &mut Transaction) {
    const STAGE: &str = "massage_names_for_cash";
    if txn.text(field::SYMBOL1) != Some("cash") {
        return;
    }
    match txn.code() {
        TransactionCode::LongOut => {
            for col in [field::NAME4STMT, field::NAME4TRADING] {
                if !txn.is_truthy(col) {
                    txn.set(col, "Cash Transfer Withdrawal");
                    txn.add_lineage(STAGE, format!("Assigned {col}=Cash Transfer Withdrawal"));
                }
            }
        }
        TransactionCode::LongIn => {
            for col in [field::NAME4STMT, field::NAME4TRADING] {
                if !txn.is_truthy(col) {
                    txn.set(col, "Cash Transfer Deposit");
                    txn.add_lineage(STAGE, format!("Assigned {col}=Cash Transfer Deposit"));
                }
            }
        }
        TransactionCode::Interest => {
            for col in [field::NAME4STMT1, field::NAME4TRADING1] {
                if !txn.is_truthy(col) {
                    txn.set(col, "Interest Received");
                    txn.add_lineage(STAGE, format!("Assigned {col}=Interest Received"));
                }
            }
        }
        _ => {}
    }
}
