//! Typed field values and the canonical field-name vocabulary
//!
//! Transactions are open, dynamically-keyed records: each pipeline stage reads
//! fields populated by earlier stages and writes new derived fields, and the
//! populated set differs per transaction code. A fixed struct would need
//! dozens of optionals, most unused for any given record, so values are kept
//! in a tagged map instead and the known field names live here as constants.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single dynamically-typed transaction attribute value.
///
/// `Null` is distinct from an absent key: the cleanup pass explicitly nulls
/// fields (e.g. gains that are exactly zero) so downstream consumers can tell
/// "zero" apart from "not applicable".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Number(Decimal),
    Date(NaiveDate),
    Flag(bool),
    Null,
}

impl FieldValue {
    /// Returns the text content, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the numeric content, if this is a number
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the date content, if this is a date
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns true for an explicit null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Truthiness in the source system's sense: null, zero, empty text and
    /// a false flag are all "absent" for the purposes of rule guards.
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Text(s) => !s.is_empty(),
            FieldValue::Number(n) => !n.is_zero(),
            FieldValue::Date(_) => true,
            FieldValue::Flag(b) => *b,
            FieldValue::Null => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Date(d) => write!(f, "{}", d),
            FieldValue::Flag(b) => write!(f, "{}", b),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(Decimal::from(value))
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => FieldValue::Null,
        }
    }
}

/// Canonical field names.
///
/// Column names follow the upstream accounting export; the `1`/`2` suffixes
/// are the two security legs of a raw record.
pub mod field {
    // Identity
    pub const PORTFOLIO_TRANSACTION_ID: &str = "PortfolioTransactionID";
    pub const TRAN_ID: &str = "TranID";
    pub const LOT_NUMBER: &str = "LotNumber";
    pub const PORTFOLIO_ID: &str = "PortfolioID";
    pub const PORTFOLIO_BASE_ID: &str = "PortfolioBaseID";
    pub const TRADE_DATE: &str = "TradeDate";
    pub const SETTLE_DATE: &str = "SettleDate";
    pub const TRANSACTION_CODE: &str = "TransactionCode";

    // Security legs
    pub const SYMBOL1: &str = "Symbol1";
    pub const SYMBOL2: &str = "Symbol2";
    pub const SECURITY_ID1: &str = "SecurityID1";
    pub const SECURITY_ID2: &str = "SecurityID2";
    pub const SEC_TYPE_BASE_CODE1: &str = "SecTypeBaseCode1";
    pub const SEC_TYPE_BASE_CODE2: &str = "SecTypeBaseCode2";
    pub const SEC_TYPE_CODE1: &str = "SecTypeCode1";
    pub const SEC_TYPE_CODE2: &str = "SecTypeCode2";
    pub const PRINCIPAL_CURRENCY_CODE1: &str = "PrincipalCurrencyCode1";
    pub const PRINCIPAL_CURRENCY_CODE2: &str = "PrincipalCurrencyCode2";
    pub const PRINCIPAL_CURRENCY_ISO_CODE1: &str = "PrincipalCurrencyISOCode1";
    pub const PROPRIETARY_SYMBOL1: &str = "ProprietarySymbol1";
    pub const PROPRIETARY_SYMBOL2: &str = "ProprietarySymbol2";
    pub const FULL_NAME1: &str = "FullName1";
    pub const FULL_NAME2: &str = "FullName2";
    pub const NAME4STMT1: &str = "Name4Stmt1";
    pub const NAME4STMT2: &str = "Name4Stmt2";
    pub const NAME4TRADING1: &str = "Name4Trading1";
    pub const NAME4TRADING2: &str = "Name4Trading2";
    pub const MATURITY_DATE1: &str = "MaturityDate1";
    pub const COUPON_DELAY_DAYS1: &str = "CouponDelayDays1";
    pub const COUPON_DELAY_DAYS2: &str = "CouponDelayDays2";
    pub const USE_SEC_TYPE_FOR_COUPON_DELAY_DAYS1: &str = "UseSecTypeForCouponDelayDays1";
    pub const USE_SEC_TYPE_FOR_COUPON_DELAY_DAYS2: &str = "UseSecTypeForCouponDelayDays2";

    // Monetary facts
    pub const QUANTITY: &str = "Quantity";
    pub const TRADE_AMOUNT: &str = "TradeAmount";
    pub const TRADE_AMOUNT_LOCAL: &str = "TradeAmountLocal";
    pub const COMMISSION: &str = "Commission";
    pub const TAXES: &str = "Taxes";
    pub const CHARGES: &str = "Charges";
    pub const PROCEEDS: &str = "Proceeds";
    pub const UNIT_PRICE: &str = "UnitPrice";
    pub const UNIT_PRICE_LOCAL: &str = "UnitPriceLocal";
    pub const ORIGINAL_COST: &str = "OriginalCost";
    pub const ORIGINAL_COST_LOCAL_CURRENCY: &str = "OriginalCostLocalCurrency";
    pub const FED_TAX_WITHHELD: &str = "FedTaxWithheld";
    pub const FGN_TAX_PAID: &str = "FgnTaxPaid";

    // FX
    pub const TRADE_DATE_FX: &str = "TradeDateFX";
    pub const SETTLE_DATE_FX: &str = "SettleDateFX";
    pub const SPOT_RATE: &str = "SpotRate";
    pub const FX_RATE: &str = "FxRate";
    pub const FX_NUMERATOR_CURRENCY_CODE: &str = "FXNumeratorCurrencyCode";
    pub const FX_DENOMINATOR_CURRENCY_CODE: &str = "FXDenominatorCurrencyCode";
    pub const ISO_CODE: &str = "ISOCode";

    // Cost basis and gains
    pub const REALIZED_GAIN_LOSS: &str = "RealizedGainLoss";
    pub const REALIZED_GAIN: &str = "RealizedGain";
    pub const COST_BASIS: &str = "CostBasis";
    pub const COST_BASIS_LOCAL: &str = "CostBasisLocal";
    pub const COST_PER_UNIT: &str = "CostPerUnit";
    pub const COST_PER_UNIT_LOCAL: &str = "CostPerUnitLocal";
    pub const RPT_COST_BASIS: &str = "RptCostBasis";
    pub const RPT_COST_PER_UNIT: &str = "RptCostPerUnit";
    pub const LOCAL_COST_BASIS: &str = "LocalCostBasis";
    pub const LOCAL_COST_PER_UNIT: &str = "LocalCostPerUnit";

    // Income attribution
    pub const NET_INTEREST: &str = "NetInterest";
    pub const NET_DIVIDEND: &str = "NetDividend";
    pub const NET_ELIG_DIVIDEND: &str = "NetEligDividend";
    pub const NET_NON_ELIG_DIVIDEND: &str = "NetNonEligDividend";
    pub const NET_FGN_INCOME: &str = "NetFgnIncome";
    pub const CAP_GAINS_DISTRIB: &str = "CapGainsDistrib";
    pub const RET_OF_CAPITAL: &str = "RetOfCapital";
    pub const TOTAL_INCOME: &str = "TotalIncome";
    pub const TFSA_CONTRIB_AMT: &str = "TfsaContribAmt";
    pub const RSP_CONTRIB_AMT: &str = "RspContribAmt";
    pub const WH_FED_TAX_AMT: &str = "WhFedTaxAmt";
    pub const WH_NR_TAX_AMT: &str = "WhNrTaxAmt";

    // Portfolio enrichment
    pub const PORTFOLIO_CODE: &str = "PortfolioCode";
    pub const PORTFOLIO_TYPE_CODE: &str = "PortfolioTypeCode";
    pub const REPORT_HEADING1: &str = "ReportHeading1";
    pub const REPORTING_CURRENCY_CODE: &str = "ReportingCurrencyCode";
    pub const REPORTING_CURRENCY_ISO_CODE: &str = "ReportingCurrencyISOCode";
    pub const CUSTODIAN_ID: &str = "CustodianID";
    pub const CUSTODIAN_NAME: &str = "CustodianName";

    // Broker
    pub const BROKER_FIRM_NAME: &str = "BrokerFirmName";
    pub const BROKER_FIRM_SYMBOL: &str = "BrokerFirmSymbol";
    pub const BROKER_NAME: &str = "BrokerName";
    pub const BROKER_ID: &str = "BrokerID";

    // Projected output columns
    pub const PORTFOLIO_NAME: &str = "PortfolioName";
    pub const AS_OF_DATE: &str = "AsOfDate";
    pub const SECURITY_ID: &str = "SecurityID";
    pub const PROPRIETARY_ID: &str = "ProprietaryID";
    pub const SYMBOL: &str = "Symbol";
    pub const PRICE_PER_UNIT: &str = "PricePerUnit";
    pub const PRICE_PER_UNIT_LOCAL: &str = "PricePerUnitLocal";
    pub const TRADE_CCY: &str = "TradeCcy";
    pub const SEC_CCY: &str = "SecCcy";
    pub const RPT_CCY: &str = "RptCcy";
    pub const LOCAL_TRAN_KEY: &str = "LocalTranKey";
    pub const LOCAL_TRAN_KEY_SUFFIX: &str = "LocalTranKeySuffix";
    pub const ALL_LOCAL_TRAN_KEYS: &str = "AllLocalTranKeys";
    pub const TRANSACTION_NAME: &str = "TransactionName";
    pub const SECTION_DESC: &str = "SectionDesc";
    pub const STMT_TRAN_DESC: &str = "StmtTranDesc";
    pub const CASH_FLOW: &str = "CashFlow";
    pub const COMMENT01: &str = "Comment01";
    pub const FULL_NAME: &str = "FullName";
    pub const NAME4STMT: &str = "Name4Stmt";
    pub const NAME4TRADING: &str = "Name4Trading";
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_truthiness_matches_rule_guards() {
        assert!(!FieldValue::Null.is_truthy());
        assert!(!FieldValue::Text(String::new()).is_truthy());
        assert!(!FieldValue::Number(Decimal::ZERO).is_truthy());
        assert!(!FieldValue::Flag(false).is_truthy());

        assert!(FieldValue::Text("cash".into()).is_truthy());
        assert!(FieldValue::Number(dec!(-0.01)).is_truthy());
        assert!(FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()).is_truthy());
    }

    #[test]
    fn test_from_option_maps_none_to_null() {
        let missing: Option<Decimal> = None;
        assert_eq!(FieldValue::from(missing), FieldValue::Null);
        assert_eq!(FieldValue::from(Some(dec!(1.5))), FieldValue::Number(dec!(1.5)));
    }

    #[test]
    fn test_values_order_totally_for_group_keys() {
        // Composite aggregation keys are `Vec<FieldValue>` in ordered maps.
        let mut keys = vec![
            vec![FieldValue::Text("wd".into()), FieldValue::Number(dec!(2))],
            vec![FieldValue::Text("dp".into()), FieldValue::Number(dec!(1))],
            vec![FieldValue::Null],
        ];
        keys.sort();
        assert_eq!(keys.len(), 3);
        assert_eq!(keys[0][0].as_text(), Some("dp"));
        assert_eq!(keys[1][0].as_text(), Some("wd"));
    }

    #[test]
    fn test_accessors_reject_other_variants() {
        let v = FieldValue::Number(dec!(10));
        assert_eq!(v.as_number(), Some(dec!(10)));
        assert!(v.as_text().is_none());
        assert!(v.as_date().is_none());
    }
}
