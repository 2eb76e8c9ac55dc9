//! Final cleanup of normalized transactions.
//!
//! Runs after netting, immediately before persistence: display names and
//! statement sections are assigned from the code tables, facts that make no
//! sense for the code are nulled, withdrawal-family signs are flipped for
//! reporting, and the identity columns are stamped from the queue item.

use core_kernel::{field, QueueItem, Transaction, TransactionCode};
use rust_decimal::Decimal;

/// House fund symbols whose distributions are labelled `Distribution`.
const BALANCED_FUND_SYMBOLS: [&str; 12] = [
    "AVBF", "DPA", "DPB", "IAFA", "IAFB", "IPFA", "UDPA", "UDPB", "BFA", "BFB", "BFF", "IAFF",
];

/// House fund symbols whose distributions are labelled `Interest Received`.
const FIXED_INCOME_FUND_SYMBOLS: [&str; 37] = [
    "CFIA", "TRFA", "TRFB", "CPFIA", "CPFIB", "FIA", "FIB", "LTFA", "MMF", "TRLA", "CPPA",
    "CPPB", "HYA", "HYAH", "HYB", "HYBH", "CPBFA", "CPFIF", "HYF", "HYFH", "MMA", "USSMA",
    "USSMB", "USSMF", "IBHA", "IBHB", "MCA", "MCB", "MCF", "STIFA", "STIFB", "STIFF", "STIFI1",
    "UMMA", "UMMB", "UMMF", "TRFI1",
];

/// Applies every cleanup pass in order.
pub fn finalize(txn: &mut Transaction, item: &QueueItem, modified_by: &str) {
    remove_price_and_quantity(txn);
    zero_registered_contributions(txn);
    assign_sec_columns(txn);
    assign_transaction_name(txn);
    assign_section_and_stmt_tran(txn);
    null_fields_for_dividends(txn);
    reverse_amount_signs(txn);
    assign_name4stmt_for_client_cash(txn);
    unassign_zero_facts(txn);
    assign_cash_flow(txn);
    assign_standard_attributes(txn, item, modified_by);
}

/// Unit facts are meaningless for cash, fee, tax and income codes.
pub fn remove_price_and_quantity(txn: &mut Transaction) {
    if !matches!(
        txn.code(),
        TransactionCode::Deposit
            | TransactionCode::Withdrawal
            | TransactionCode::Expense
            | TransactionCode::ExpensePaid
            | TransactionCode::WithholdingTax
            | TransactionCode::AccruedInterestBought
            | TransactionCode::AccruedInterestSold
            | TransactionCode::Interest
            | TransactionCode::Paydown
            | TransactionCode::ReturnOfCapital
    ) {
        return;
    }
    let mut cleared = Vec::new();
    for col in [
        field::PRICE_PER_UNIT,
        field::PRICE_PER_UNIT_LOCAL,
        field::QUANTITY,
    ] {
        if txn.is_set(col) {
            txn.set_null(col);
            cleared.push(col);
        }
    }
    if !cleared.is_empty() {
        txn.add_lineage(
            "remove_price_and_quantity",
            format!("Nulled {}", cleared.join(", ")),
        );
    }
}

/// A net withdrawal is not a contribution, whatever its legs said.
pub fn zero_registered_contributions(txn: &mut Transaction) {
    const STAGE: &str = "zero_registered_contributions";
    if txn.code() != TransactionCode::Withdrawal {
        return;
    }
    let portfolio_type = txn
        .text(field::PORTFOLIO_TYPE_CODE)
        .unwrap_or("")
        .to_string();
    if portfolio_type.contains("TFSA") {
        txn.set(field::TFSA_CONTRIB_AMT, Decimal::ZERO);
        txn.add_lineage(STAGE, "Zeroed TfsaContribAmt on withdrawal");
    }
    if portfolio_type.contains("RRSP") {
        txn.set(field::RSP_CONTRIB_AMT, Decimal::ZERO);
        txn.add_lineage(STAGE, "Zeroed RspContribAmt on withdrawal");
    }
}

/// Unsuffixed security display columns come from the first leg.
pub fn assign_sec_columns(txn: &mut Transaction) {
    let mut assigned = Vec::new();
    for (source, target) in [
        (field::FULL_NAME1, field::FULL_NAME),
        (field::NAME4STMT1, field::NAME4STMT),
        (field::NAME4TRADING1, field::NAME4TRADING),
    ] {
        if txn.is_set(source) {
            txn.copy_field(source, target);
            assigned.push(target);
        }
    }
    if !assigned.is_empty() {
        txn.add_lineage(
            "assign_sec_columns",
            format!("Assigned {} from first leg", assigned.join(", ")),
        );
    }
}

/// The display name table. House fund distributions are named by what the
/// fund holds rather than calling everything a dividend.
pub fn assign_transaction_name(txn: &mut Transaction) {
    let name = match txn.code() {
        TransactionCode::Dividend => {
            if txn.text(field::SEC_TYPE_BASE_CODE1) == Some("ff") {
                let symbol = txn.text(field::SYMBOL1).unwrap_or("");
                if BALANCED_FUND_SYMBOLS.contains(&symbol) {
                    "Distribution"
                } else if FIXED_INCOME_FUND_SYMBOLS.contains(&symbol) {
                    "Interest Received"
                } else {
                    "Dividend"
                }
            } else {
                "Dividend"
            }
        }
        TransactionCode::Buy | TransactionCode::BuyCancel => "Purchase",
        TransactionCode::Sell | TransactionCode::SellShort => "Sale",
        TransactionCode::ReturnOfCapital => "Return Of Capital",
        TransactionCode::Paydown => "Paydown",
        TransactionCode::Maturity => "Maturity",
        TransactionCode::Withdrawal | TransactionCode::LongOut => "Withdrawal",
        TransactionCode::Deposit | TransactionCode::LongIn => "Contribution",
        TransactionCode::Interest | TransactionCode::AccruedInterestSold => "Interest Received",
        TransactionCode::AccruedInterestBought => "Interest Paid",
        TransactionCode::Expense | TransactionCode::ExpensePaid => "Expense",
        TransactionCode::WithholdingTax => "Withholding Tax",
        TransactionCode::CostAdjustment => "Cost Adjustment",
        _ => "Unknown",
    };
    txn.set(field::TRANSACTION_NAME, name);
    txn.add_lineage(
        "assign_transaction_name",
        format!("Assigned TransactionName={name}"),
    );
}

/// Statement section and statement transaction descriptions. Codes without
/// a statement presence are left untouched.
pub fn assign_section_and_stmt_tran(txn: &mut Transaction) {
    let (section, stmt) = match txn.code() {
        TransactionCode::Buy => ("Buys", "Buy"),
        TransactionCode::Sell => ("Sells", "Sell"),
        TransactionCode::Paydown => ("Repayment", "Repayment"),
        TransactionCode::Maturity => ("Maturity", "Maturity"),
        TransactionCode::Deposit | TransactionCode::LongIn => ("Deposits", "Deposit"),
        TransactionCode::Withdrawal | TransactionCode::LongOut => ("Withdrawals", "Withdrawal"),
        TransactionCode::Expense | TransactionCode::ExpensePaid => ("Fees", "Fee"),
        TransactionCode::Dividend => ("Dividend", "Dividend"),
        TransactionCode::DividendReclaim => ("Dividend Reclaim", "Dividend Reclaim"),
        TransactionCode::Interest => ("Interest", "Interest"),
        TransactionCode::AccruedInterestBought => {
            ("Accrued Interest Bought", "Accrued Interest Bought")
        }
        TransactionCode::AccruedInterestSold => {
            ("Accrued Interest Sold", "Accrued Interest Sold")
        }
        TransactionCode::ReturnOfCapital => ("Return of Capital", "Return of Capital"),
        TransactionCode::TransferIn => ("Transfer In", "Transfer In"),
        TransactionCode::TransferOut => ("Transfer Out", "Transfer Out"),
        TransactionCode::SellShort => ("Sell Short", "Sell Short"),
        TransactionCode::CoverShort => ("Cover Short", "Cover Short"),
        TransactionCode::ShortSecurityDeposit => {
            ("Deposit Security (Short)", "Deposit Security (Short)")
        }
        TransactionCode::CostAdjustment => ("Adjust Cost", "Adjust Cost"),
        _ => return,
    };
    txn.set(field::SECTION_DESC, section);
    txn.set(field::STMT_TRAN_DESC, stmt);
    txn.add_lineage(
        "assign_section_and_stmt_tran",
        format!("Assigned SectionDesc={section}, StmtTranDesc={stmt}"),
    );
}

/// A merged dividend may still carry facts from its currency sale leg.
pub fn null_fields_for_dividends(txn: &mut Transaction) {
    if txn.code() != TransactionCode::Dividend {
        return;
    }
    for col in [
        field::QUANTITY,
        field::PRICE_PER_UNIT,
        field::PRICE_PER_UNIT_LOCAL,
        field::COST_PER_UNIT,
        field::COST_PER_UNIT_LOCAL,
        field::COST_BASIS,
        field::COST_BASIS_LOCAL,
    ] {
        txn.set_null(col);
    }
    txn.add_lineage(
        "null_fields_for_dividends",
        "Nulled unit and cost facts on dividend",
    );
}

/// Outflows are reported negative.
pub fn reverse_amount_signs(txn: &mut Transaction) {
    if !matches!(
        txn.code(),
        TransactionCode::LongOut
            | TransactionCode::Withdrawal
            | TransactionCode::Expense
            | TransactionCode::ExpensePaid
            | TransactionCode::WithholdingTax
    ) {
        return;
    }
    let amount = txn.number_or_zero(field::TRADE_AMOUNT);
    let local = txn.number_or_zero(field::TRADE_AMOUNT_LOCAL);
    txn.set(field::TRADE_AMOUNT, -amount);
    txn.set(field::TRADE_AMOUNT_LOCAL, -local);
    txn.add_lineage(
        "reverse_amount_signs",
        "Reversed TradeAmount/TradeAmountLocal sign for outflow",
    );
}

pub fn assign_name4stmt_for_client_cash(txn: &mut Transaction) {
    const STAGE: &str = "assign_name4stmt_for_client_cash";
    if txn.text(field::SYMBOL1) != Some("client") {
        return;
    }
    match txn.code() {
        TransactionCode::Withdrawal => {
            txn.set(field::NAME4STMT, "CASH WITHDRAWAL");
            txn.add_lineage(STAGE, "Assigned Name4Stmt=CASH WITHDRAWAL");
        }
        TransactionCode::Deposit => {
            txn.set(field::NAME4STMT, "CASH DEPOSIT");
            txn.add_lineage(STAGE, "Assigned Name4Stmt=CASH DEPOSIT");
        }
        _ => {}
    }
}

/// Zero gains, proceeds and quantity read better as null than as 0.
pub fn unassign_zero_facts(txn: &mut Transaction) {
    let mut cleared = Vec::new();
    for col in [field::REALIZED_GAIN, field::PROCEEDS, field::QUANTITY] {
        if !txn.is_truthy(col) {
            txn.set_null(col);
            cleared.push(col);
        }
    }
    if !cleared.is_empty() {
        txn.add_lineage(
            "unassign_zero_facts",
            format!("Nulled zero-valued {}", cleared.join(", ")),
        );
    }
}

/// Cash flow is the trade amount, negated for purchases.
pub fn assign_cash_flow(txn: &mut Transaction) {
    let amount = txn.number_or_zero(field::TRADE_AMOUNT);
    let cash_flow = if txn.code() == TransactionCode::Buy {
        -amount
    } else {
        amount
    };
    txn.set(field::CASH_FLOW, cash_flow);
    txn.add_lineage("assign_cash_flow", format!("Assigned CashFlow={cash_flow}"));
}

/// Stamps the identity columns from the queue item that drove this batch.
/// `trade_date_original` always reflects the queue key, even for dividends
/// whose working trade date was re-anchored.
pub fn assign_standard_attributes(txn: &mut Transaction, item: &QueueItem, modified_by: &str) {
    txn.portfolio_code = Some(item.portfolio_code.clone());
    txn.trade_date = txn.date(field::TRADE_DATE);
    txn.trade_date_original = Some(item.trade_date);
    txn.modified_by = Some(modified_by.to_string());
}
