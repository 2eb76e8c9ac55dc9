use core_kernel::{field, TransactionCode};
use domain_pipeline::rules::{
    add_fields, apply_rules, assign_contribution_amount, assign_cost_basis, assign_fx_rate,
    attribute_distribution, delay_coupon_settlement, massage_deposits_withdrawals,
    massage_names_for_cash,
};
use domain_pipeline::Disposition;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use test_utils::{date, TransactionBuilder};

#[test]
fn fx_rate_prefers_trade_date_fx() {
    let mut txn = TransactionBuilder::new("by")
        .field(field::TRADE_DATE_FX, dec!(1.25))
        .amount(dec!(100))
        .amount_local(dec!(50))
        .build();
    assign_fx_rate(&mut txn);
    assert_eq!(txn.number(field::FX_RATE), Some(dec!(1.25)));
}

#[test]
fn fx_rate_is_parity_for_matching_currencies() {
    let mut txn = TransactionBuilder::new("by")
        .field(field::PRINCIPAL_CURRENCY_ISO_CODE1, "CAD")
        .field(field::REPORTING_CURRENCY_ISO_CODE, "CAD")
        .build();
    assign_fx_rate(&mut txn);
    assert_eq!(txn.number(field::FX_RATE), Some(Decimal::ONE));
}

#[test]
fn fx_rate_falls_back_to_amount_quotient() {
    let mut txn = TransactionBuilder::new("by")
        .amount(dec!(130))
        .amount_local(dec!(100))
        .build();
    assign_fx_rate(&mut txn);
    assert_eq!(txn.number(field::FX_RATE), Some(dec!(1.3)));
}

#[test]
fn fx_rate_left_unset_when_nothing_applies() {
    let mut txn = TransactionBuilder::new("by").build();
    assign_fx_rate(&mut txn);
    assert!(!txn.is_set(field::FX_RATE));
}

#[test]
fn client_cash_wash_copies_second_leg() {
    let mut txn = TransactionBuilder::new("dp")
        .symbols("cash", "client")
        .security_ids(1, 2)
        .build();
    assert!(matches!(
        massage_deposits_withdrawals(&mut txn),
        Disposition::Keep
    ));
    assert_eq!(txn.text(field::SYMBOL1), Some("client"));
    assert_eq!(txn.number(field::SECURITY_ID1), Some(dec!(2)));
}

#[test]
fn withholding_tax_wash_reclassifies_as_wt() {
    let mut txn = TransactionBuilder::new("wd")
        .symbols("cash", "whfedtax")
        .security_ids(1, 2)
        .build();
    assert!(matches!(
        massage_deposits_withdrawals(&mut txn),
        Disposition::Keep
    ));
    assert_eq!(txn.code(), TransactionCode::WithholdingTax);
    assert_eq!(txn.text(field::SYMBOL1), Some("whfedtax"));
}

#[test]
fn internal_wash_legs_are_dropped() {
    for symbol in ["whnrtax", "whfedtax", "dvshrt", "dvwash", "mfr"] {
        let mut txn = TransactionBuilder::new("wd").symbols(symbol, "other").build();
        assert!(
            matches!(massage_deposits_withdrawals(&mut txn), Disposition::Drop(_)),
            "expected drop for {symbol}"
        );
    }
}

#[test]
fn management_fee_keeps_only_with_security() {
    let mut orphan = TransactionBuilder::new("wd").symbols("manfee", "x").build();
    assert!(matches!(
        massage_deposits_withdrawals(&mut orphan),
        Disposition::Drop(_)
    ));

    let mut with_security = TransactionBuilder::new("wd")
        .symbols("manfee", "x")
        .security_ids(1, 2)
        .build();
    assert!(matches!(
        massage_deposits_withdrawals(&mut with_security),
        Disposition::Keep
    ));
    assert_eq!(with_security.code(), TransactionCode::ExpensePaid);
}

#[test]
fn custody_fee_becomes_expense() {
    let mut txn = TransactionBuilder::new("dp").symbols("cust", "x").build();
    assert!(matches!(
        massage_deposits_withdrawals(&mut txn),
        Disposition::Keep
    ));
    assert_eq!(txn.code(), TransactionCode::Expense);
}

#[test]
fn unrecognized_cash_movement_is_dropped() {
    let mut txn = TransactionBuilder::new("dp").symbols("mystery", "other").build();
    assert!(matches!(
        massage_deposits_withdrawals(&mut txn),
        Disposition::Drop(_)
    ));
}

#[test]
fn income_accrual_wash_becomes_client_cash() {
    let mut txn = TransactionBuilder::new("dp")
        .symbols("income", "cash")
        .security_ids(1, 2)
        .field(field::SEC_TYPE_BASE_CODE2, "aw")
        .build();
    assert!(matches!(
        massage_deposits_withdrawals(&mut txn),
        Disposition::Keep
    ));
    assert_eq!(txn.text(field::SYMBOL1), Some("client"));
}

#[test]
fn cash_to_cash_transfer_is_dropped() {
    let mut txn = TransactionBuilder::new("sl")
        .on(date(2024, 3, 15))
        .portfolio("ABC123")
        .symbols("cash", "cash")
        .build();
    assert!(matches!(
        apply_rules(&mut txn).unwrap(),
        Disposition::Drop(_)
    ));
}

#[test]
fn long_in_derives_cost_basis_from_original_cost() {
    let mut txn = TransactionBuilder::new("li")
        .quantity(dec!(10))
        .field(field::ORIGINAL_COST, dec!(250))
        .field(field::ORIGINAL_COST_LOCAL_CURRENCY, dec!(200))
        .build();
    assign_cost_basis(&mut txn);
    assert_eq!(txn.number(field::RPT_COST_BASIS), Some(dec!(250)));
    assert_eq!(txn.number(field::RPT_COST_PER_UNIT), Some(dec!(25)));
    assert_eq!(txn.number(field::LOCAL_COST_BASIS), Some(dec!(200)));
    assert_eq!(txn.number(field::LOCAL_COST_PER_UNIT), Some(dec!(20)));
}

#[test]
fn coupon_settlement_is_delayed_for_mortgage_pools() {
    let day = date(2024, 3, 15);
    let mut txn = TransactionBuilder::new("in")
        .on(day)
        .field(field::SEC_TYPE_BASE_CODE1, "cm")
        .field(field::COUPON_DELAY_DAYS1, 14i64)
        .build();
    delay_coupon_settlement(&mut txn);
    assert_eq!(txn.date(field::SETTLE_DATE), Some(date(2024, 3, 29)));
}

#[test]
fn coupon_delay_skipped_when_type_derived() {
    let day = date(2024, 3, 15);
    let mut txn = TransactionBuilder::new("in")
        .on(day)
        .field(field::SEC_TYPE_BASE_CODE1, "cm")
        .field(field::COUPON_DELAY_DAYS1, 14i64)
        .field(field::USE_SEC_TYPE_FOR_COUPON_DELAY_DAYS1, true)
        .build();
    delay_coupon_settlement(&mut txn);
    assert_eq!(txn.date(field::SETTLE_DATE), Some(day));
}

#[test]
fn negligible_short_term_interest_sale_is_dropped() {
    let mut txn = TransactionBuilder::new("sa")
        .field(field::SEC_TYPE_BASE_CODE1, "st")
        .amount(dec!(0.0000001))
        .build();
    assert!(matches!(
        apply_rules(&mut txn).unwrap(),
        Disposition::Drop(_)
    ));
}

#[test]
fn unsettled_dividend_accrual_is_dropped() {
    let mut txn = TransactionBuilder::new("dv")
        .field(field::SEC_TYPE_BASE_CODE2, "aw")
        .build();
    assert!(matches!(
        apply_rules(&mut txn).unwrap(),
        Disposition::Drop(_)
    ));
}

#[test]
fn interest_attribution_zeroes_unit_facts() {
    let mut txn = TransactionBuilder::new("in")
        .amount(dec!(42.50))
        .quantity(dec!(10))
        .build();
    attribute_distribution(&mut txn);
    assert_eq!(txn.number(field::NET_INTEREST), Some(dec!(42.50)));
    assert_eq!(txn.number(field::TOTAL_INCOME), Some(dec!(42.50)));
    assert_eq!(txn.number(field::QUANTITY), Some(Decimal::ZERO));
    assert_eq!(txn.number(field::UNIT_PRICE), Some(Decimal::ZERO));
}

#[test]
fn cad_dividend_is_eligible_dividend_income() {
    let mut txn = TransactionBuilder::new("dv")
        .amount(dec!(100))
        .field(field::PRINCIPAL_CURRENCY_ISO_CODE1, "CAD")
        .build();
    attribute_distribution(&mut txn);
    assert_eq!(txn.number(field::NET_DIVIDEND), Some(dec!(100)));
    assert_eq!(txn.number(field::NET_ELIG_DIVIDEND), Some(dec!(100)));
    assert!(!txn.is_set(field::NET_FGN_INCOME));
}

#[test]
fn foreign_dividend_is_foreign_income() {
    let mut txn = TransactionBuilder::new("dv")
        .amount(dec!(100))
        .field(field::PRINCIPAL_CURRENCY_ISO_CODE1, "USD")
        .build();
    attribute_distribution(&mut txn);
    assert_eq!(txn.number(field::NET_FGN_INCOME), Some(dec!(100)));
    assert!(!txn.is_set(field::NET_DIVIDEND));
}

#[test]
fn rrsp_client_deposit_counts_as_contribution() {
    let mut txn = TransactionBuilder::new("dp")
        .symbols("cash", "client")
        .amount(dec!(5000))
        .field(field::PORTFOLIO_TYPE_CODE, "RRSP Individual")
        .field(field::COMMENT01, "CONTRIBUTION")
        .build();
    assign_contribution_amount(&mut txn);
    assert_eq!(txn.number(field::RSP_CONTRIB_AMT), Some(dec!(5000)));
}

#[test]
fn tfsa_contribution_requires_the_comment() {
    let mut txn = TransactionBuilder::new("dp")
        .symbols("cash", "client")
        .amount(dec!(5000))
        .field(field::PORTFOLIO_TYPE_CODE, "TFSA Individual")
        .build();
    assign_contribution_amount(&mut txn);
    assert!(!txn.is_set(field::TFSA_CONTRIB_AMT));
}

#[test]
fn add_fields_builds_the_local_tran_key() {
    let mut txn = TransactionBuilder::new("by")
        .trade_date(date(2024, 3, 15))
        .settle_date(date(2024, 3, 18))
        .portfolio("ABC123")
        .symbols("XYZ", "cash")
        .identity(111, 222, 1)
        .build();
    add_fields(&mut txn).unwrap();
    assert_eq!(
        txn.text(field::LOCAL_TRAN_KEY),
        Some("ABC123_20240315_20240318_XYZ_111_222_1_A")
    );
    assert_eq!(txn.text(field::LOCAL_TRAN_KEY_SUFFIX), Some("_A"));
}

#[test]
fn add_fields_projects_output_columns() {
    let mut txn = TransactionBuilder::new("by")
        .on(date(2024, 3, 15))
        .portfolio("ABC123")
        .symbols("XYZ", "cash")
        .security_ids(100, 200)
        .field(field::REPORT_HEADING1, "Jane Account")
        .field(field::SEC_TYPE_BASE_CODE1, "cs")
        .field(field::PRINCIPAL_CURRENCY_CODE1, "cad")
        .field(field::RPT_COST_BASIS, dec!(500))
        .field(field::BROKER_FIRM_NAME, "Broker Co")
        .build();
    add_fields(&mut txn).unwrap();

    assert_eq!(txn.text(field::PORTFOLIO_NAME), Some("Jane Account"));
    assert_eq!(txn.text(field::SYMBOL), Some("XYZ"));
    assert_eq!(txn.number(field::SECURITY_ID), Some(dec!(100)));
    assert_eq!(txn.number(field::COST_BASIS), Some(dec!(500)));
    assert_eq!(txn.text(field::SEC_TYPE_CODE1), Some("cscad"));
    assert_eq!(txn.text(field::BROKER_NAME), Some("Broker Co"));
    assert_eq!(txn.date(field::AS_OF_DATE), Some(date(2024, 3, 15)));
}

#[test]
fn missing_trade_date_is_an_error_not_a_panic() {
    let mut txn = TransactionBuilder::new("by").portfolio("ABC123").build();
    assert!(add_fields(&mut txn).is_err());
}

#[test]
fn cash_transfer_names_fill_blank_statement_names() {
    let mut txn = TransactionBuilder::new("lo").symbols("cash", "x").build();
    massage_names_for_cash(&mut txn);
    assert_eq!(txn.text(field::NAME4STMT), Some("Cash Transfer Withdrawal"));
    assert_eq!(txn.text(field::NAME4TRADING), Some("Cash Transfer Withdrawal"));

    let mut existing = TransactionBuilder::new("li")
        .symbols("cash", "x")
        .field(field::NAME4STMT, "Already Named")
        .build();
    massage_names_for_cash(&mut existing);
    assert_eq!(txn.text(field::NAME4STMT), Some("Cash Transfer Withdrawal"));
    assert_eq!(existing.text(field::NAME4STMT), Some("Already Named"));
    assert_eq!(existing.text(field::NAME4TRADING), Some("Cash Transfer Deposit"));
}

#[test]
fn interest_on_cash_names_the_first_leg() {
    let mut txn = TransactionBuilder::new("in").symbols("cash", "x").build();
    massage_names_for_cash(&mut txn);
    assert_eq!(txn.text(field::NAME4STMT1), Some("Interest Received"));
    assert_eq!(txn.text(field::NAME4TRADING1), Some("Interest Received"));
}

#[test]
fn interest_keeps_a_security_master_name() {
    let mut txn = TransactionBuilder::new("in")
        .symbols("cash", "x")
        .field(field::NAME4STMT1, "Premium Savings Interest")
        .build();
    massage_names_for_cash(&mut txn);
    assert_eq!(txn.text(field::NAME4STMT1), Some("Premium Savings Interest"));
    // The blank companion column is still filled.
    assert_eq!(txn.text(field::NAME4TRADING1), Some("Interest Received"));
}

#[test]
fn rule_pass_only_appends_lineage() {
    let mut txn = TransactionBuilder::new("by")
        .on(date(2024, 3, 15))
        .portfolio("ABC123")
        .symbols("XYZ", "cash")
        .amount(dec!(100))
        .amount_local(dec!(80))
        .build();
    txn.add_lineage("merge_dividends", "earlier entry");

    let disposition = apply_rules(&mut txn).unwrap();
    assert!(matches!(disposition, Disposition::Keep));
    assert_eq!(txn.lineage()[0].note, "earlier entry");
    assert!(txn.lineage().len() > 1);
}
