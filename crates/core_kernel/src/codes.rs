//! The closed transaction-code vocabulary
//!
//! Almost every branch in the normalization pipeline dispatches on the
//! transaction code. The set of codes is fixed by the upstream accounting
//! system; anything else round-trips through `Unknown` rather than being
//! silently passed through, so missing cases show up in tests.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A ledger transaction type code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionCode {
    Buy,
    BuyCancel,
    Sell,
    SellShort,
    CoverShort,
    ShortSecurityDeposit,
    Deposit,
    Withdrawal,
    Dividend,
    DividendReclaim,
    Interest,
    AccruedInterestBought,
    AccruedInterestSold,
    Expense,
    ExpensePaid,
    WithholdingTax,
    LongIn,
    LongOut,
    Maturity,
    Paydown,
    ReturnOfCapital,
    TransferIn,
    TransferOut,
    CostAdjustment,
    /// A code outside the known vocabulary, preserved verbatim
    Unknown(String),
}

impl TransactionCode {
    /// Parses the upstream two-letter code.
    pub fn parse(code: &str) -> Self {
        match code {
            "by" => TransactionCode::Buy,
            "bc" => TransactionCode::BuyCancel,
            "sl" => TransactionCode::Sell,
            "ss" => TransactionCode::SellShort,
            "cs" => TransactionCode::CoverShort,
            "si" => TransactionCode::ShortSecurityDeposit,
            "dp" => TransactionCode::Deposit,
            "wd" => TransactionCode::Withdrawal,
            "dv" => TransactionCode::Dividend,
            "dr" => TransactionCode::DividendReclaim,
            "in" => TransactionCode::Interest,
            "pa" => TransactionCode::AccruedInterestBought,
            "sa" => TransactionCode::AccruedInterestSold,
            "ex" => TransactionCode::Expense,
            "ep" => TransactionCode::ExpensePaid,
            "wt" => TransactionCode::WithholdingTax,
            "li" => TransactionCode::LongIn,
            "lo" => TransactionCode::LongOut,
            "mt" => TransactionCode::Maturity,
            "pd" => TransactionCode::Paydown,
            "rc" => TransactionCode::ReturnOfCapital,
            "ti" => TransactionCode::TransferIn,
            "to" => TransactionCode::TransferOut,
            "ac" => TransactionCode::CostAdjustment,
            other => TransactionCode::Unknown(other.to_string()),
        }
    }

    /// Returns the upstream wire code.
    pub fn as_code(&self) -> &str {
        match self {
            TransactionCode::Buy => "by",
            TransactionCode::BuyCancel => "bc",
            TransactionCode::Sell => "sl",
            TransactionCode::SellShort => "ss",
            TransactionCode::CoverShort => "cs",
            TransactionCode::ShortSecurityDeposit => "si",
            TransactionCode::Deposit => "dp",
            TransactionCode::Withdrawal => "wd",
            TransactionCode::Dividend => "dv",
            TransactionCode::DividendReclaim => "dr",
            TransactionCode::Interest => "in",
            TransactionCode::AccruedInterestBought => "pa",
            TransactionCode::AccruedInterestSold => "sa",
            TransactionCode::Expense => "ex",
            TransactionCode::ExpensePaid => "ep",
            TransactionCode::WithholdingTax => "wt",
            TransactionCode::LongIn => "li",
            TransactionCode::LongOut => "lo",
            TransactionCode::Maturity => "mt",
            TransactionCode::Paydown => "pd",
            TransactionCode::ReturnOfCapital => "rc",
            TransactionCode::TransferIn => "ti",
            TransactionCode::TransferOut => "to",
            TransactionCode::CostAdjustment => "ac",
            TransactionCode::Unknown(code) => code.as_str(),
        }
    }

    /// True for deposit/withdrawal cash-movement legs.
    pub fn is_cash_movement(&self) -> bool {
        matches!(self, TransactionCode::Deposit | TransactionCode::Withdrawal)
    }
}

impl fmt::Display for TransactionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

impl From<&str> for TransactionCode {
    fn from(code: &str) -> Self {
        TransactionCode::parse(code)
    }
}
