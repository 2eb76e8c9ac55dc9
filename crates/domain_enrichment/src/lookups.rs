//! Concrete supplementary lookups.
//!
//! Each lookup knows which transaction fields key into its reference table
//! and which columns it writes back. A successful supplement leaves a
//! lineage note recording the lookup name and the key values it matched on.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use core_kernel::{field, previous_business_day, FieldValue, Transaction};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::cache::{LookupCache, LookupSource};
use crate::error::LookupError;

// Lookup-side column names without a transaction-field counterpart.
const COL_SECURITY_ID: &str = "SecurityID";
const COL_COUPON_DELAY_DAYS: &str = "CouponDelayDays";
const COL_CURRENCY_CODE: &str = "CurrencyCode";
const COL_PRICE_DATE: &str = "PriceDate";
const COL_NUMERATOR: &str = "NumeratorCurrencyCode";
const COL_DENOMINATOR: &str = "DenominatorCurrencyCode";
const COL_FX_RATE: &str = "FxRate";
const COL_DATA_DATE: &str = "DataDate";

/// A coupon delay of exactly 253 days is not a real delay; it is the
/// upstream sentinel for "derive the delay from the security type".
const USE_SEC_TYPE_SENTINEL: Decimal = dec!(253);

/// Enriches a transaction in place from reference data. Returns whether a
/// matching row was found and applied.
#[async_trait]
pub trait SupplementaryLookup: Send + Sync {
    fn name(&self) -> &str;

    async fn supplement(&self, txn: &mut Transaction) -> Result<bool, LookupError>;
}

fn note_supplement(txn: &mut Transaction, name: &str, keys: &[(String, FieldValue)]) {
    let based_on = keys
        .iter()
        .map(|(col, value)| format!("{col}={value}"))
        .collect::<Vec<_>>()
        .join(", ");
    txn.add_lineage(
        "supplement",
        format!("Supplemented by {name}, based on ({based_on})"),
    );
}

/// Security master, applied once per security leg. Lookup columns gain the
/// leg suffix on the transaction: `Symbol` becomes `Symbol1`/`Symbol2`.
pub struct SecurityMasterLookup {
    cache: Arc<LookupCache>,
}

impl SecurityMasterLookup {
    pub const RELEVANT_COLUMNS: [&'static str; 9] = [
        "ProprietarySymbol",
        "PrincipalCurrencyCode",
        "FullName",
        "Symbol",
        "SecTypeBaseCode",
        "CouponDelayDays",
        "MaturityDate",
        "Name4Stmt",
        "Name4Trading",
    ];

    pub fn new(source: Arc<dyn LookupSource>) -> Self {
        let cache = LookupCache::new(
            "security_master",
            vec![COL_SECURITY_ID.to_string()],
            Self::RELEVANT_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            source,
        );
        Self {
            cache: Arc::new(cache),
        }
    }

    pub fn cache(&self) -> Arc<LookupCache> {
        Arc::clone(&self.cache)
    }
}

#[async_trait]
impl SupplementaryLookup for SecurityMasterLookup {
    fn name(&self) -> &str {
        self.cache.name()
    }

    async fn supplement(&self, txn: &mut Transaction) -> Result<bool, LookupError> {
        let mut applied = false;
        for suffix in ["1", "2"] {
            let tx_col = format!("{}{}", COL_SECURITY_ID, suffix);
            let Some(id) = txn.get(&tx_col).filter(|v| v.is_truthy()).cloned() else {
                continue;
            };
            let Some(row) = self.cache.get(std::slice::from_ref(&id)) else {
                debug!(lookup = self.name(), key = %id, "no security master row");
                continue;
            };
            for (col, value) in &row {
                txn.set(&format!("{col}{suffix}"), value.clone());
            }
            let delay = row.get(COL_COUPON_DELAY_DAYS).and_then(FieldValue::as_number);
            if delay == Some(USE_SEC_TYPE_SENTINEL) {
                txn.set(&format!("UseSecTypeForCouponDelayDays{suffix}"), true);
            }
            note_supplement(txn, self.name(), &[(tx_col, id)]);
            applied = true;
        }
        Ok(applied)
    }
}

/// Portfolio master keyed by the accounting system's portfolio id.
pub struct PortfolioMasterLookup {
    cache: Arc<LookupCache>,
}

impl PortfolioMasterLookup {
    pub const RELEVANT_COLUMNS: [&'static str; 5] = [
        field::PORTFOLIO_CODE,
        field::PORTFOLIO_TYPE_CODE,
        field::REPORT_HEADING1,
        field::REPORTING_CURRENCY_CODE,
        field::CUSTODIAN_ID,
    ];

    pub fn new(source: Arc<dyn LookupSource>) -> Self {
        let cache = LookupCache::new(
            "portfolio_master",
            vec![field::PORTFOLIO_ID.to_string()],
            Self::RELEVANT_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            source,
        );
        Self {
            cache: Arc::new(cache),
        }
    }

    pub fn cache(&self) -> Arc<LookupCache> {
        Arc::clone(&self.cache)
    }
}

#[async_trait]
impl SupplementaryLookup for PortfolioMasterLookup {
    fn name(&self) -> &str {
        self.cache.name()
    }

    async fn supplement(&self, txn: &mut Transaction) -> Result<bool, LookupError> {
        let Some(id) = txn.get(field::PORTFOLIO_ID).filter(|v| v.is_truthy()).cloned() else {
            return Ok(false);
        };
        let Some(row) = self.cache.get(std::slice::from_ref(&id)) else {
            debug!(lookup = self.name(), key = %id, "no portfolio master row");
            return Ok(false);
        };
        for (col, value) in &row {
            txn.set(col, value.clone());
        }
        note_supplement(txn, self.name(), &[(field::PORTFOLIO_ID.to_string(), id)]);
        Ok(true)
    }
}

/// Maps internal currency codes to ISO codes on three fields: the FX
/// numerator currency, the reporting currency and the first-leg principal
/// currency.
pub struct CurrencyLookup {
    cache: Arc<LookupCache>,
}

impl CurrencyLookup {
    pub fn new(source: Arc<dyn LookupSource>) -> Self {
        let cache = LookupCache::new(
            "currency",
            vec![COL_CURRENCY_CODE.to_string()],
            vec![field::ISO_CODE.to_string()],
            source,
        );
        Self {
            cache: Arc::new(cache),
        }
    }

    pub fn cache(&self) -> Arc<LookupCache> {
        Arc::clone(&self.cache)
    }

    fn map_one(&self, txn: &mut Transaction, source_field: &str, target_field: &str) -> bool {
        let Some(code) = txn.get(source_field).filter(|v| v.is_truthy()).cloned() else {
            return false;
        };
        let Some(row) = self.cache.get(std::slice::from_ref(&code)) else {
            debug!(lookup = self.cache.name(), key = %code, "no currency row");
            return false;
        };
        let Some(iso) = row.get(field::ISO_CODE).cloned() else {
            return false;
        };
        txn.set(target_field, iso);
        note_supplement(
            txn,
            self.cache.name(),
            &[(source_field.to_string(), code)],
        );
        true
    }
}

#[async_trait]
impl SupplementaryLookup for CurrencyLookup {
    fn name(&self) -> &str {
        self.cache.name()
    }

    async fn supplement(&self, txn: &mut Transaction) -> Result<bool, LookupError> {
        let mut applied = false;
        applied |= self.map_one(txn, field::FX_NUMERATOR_CURRENCY_CODE, field::ISO_CODE);
        applied |= self.map_one(
            txn,
            field::REPORTING_CURRENCY_CODE,
            field::REPORTING_CURRENCY_ISO_CODE,
        );
        applied |= self.map_one(
            txn,
            field::PRINCIPAL_CURRENCY_CODE1,
            field::PRINCIPAL_CURRENCY_ISO_CODE1,
        );
        Ok(applied)
    }
}

/// FX rates keyed by price date and currency pair. The backing table is far
/// too large for a bulk load, so the cache fills lazily on each miss.
pub struct FxRateLookup {
    cache: Arc<LookupCache>,
}

impl FxRateLookup {
    pub fn new(source: Arc<dyn LookupSource>) -> Self {
        let cache = LookupCache::new_lazy(
            "fx_rate",
            vec![
                COL_PRICE_DATE.to_string(),
                COL_NUMERATOR.to_string(),
                COL_DENOMINATOR.to_string(),
            ],
            vec![COL_FX_RATE.to_string()],
            source,
        );
        Self {
            cache: Arc::new(cache),
        }
    }

    pub fn cache(&self) -> Arc<LookupCache> {
        Arc::clone(&self.cache)
    }

    /// The rate for a (date, numerator, denominator) triple, pulling the row
    /// from the source on a cache miss. `None` means the source has no rate.
    pub async fn rate(
        &self,
        price_date: NaiveDate,
        numerator: &str,
        denominator: &str,
    ) -> Result<Option<Decimal>, LookupError> {
        let key = [
            FieldValue::from(price_date),
            FieldValue::from(numerator),
            FieldValue::from(denominator),
        ];
        if let Some(row) = self.cache.get(&key) {
            return Ok(row.get(COL_FX_RATE).and_then(FieldValue::as_number));
        }
        self.cache
            .refresh_where(&[
                (COL_PRICE_DATE.to_string(), key[0].clone()),
                (COL_NUMERATOR.to_string(), key[1].clone()),
                (COL_DENOMINATOR.to_string(), key[2].clone()),
            ])
            .await?;
        Ok(self
            .cache
            .get(&key)
            .and_then(|row| row.get(COL_FX_RATE).and_then(FieldValue::as_number)))
    }
}

/// Resolves the custodian id to a display name of the form `Name (id)`.
pub struct CustodianLookup {
    cache: Arc<LookupCache>,
}

impl CustodianLookup {
    pub fn new(source: Arc<dyn LookupSource>) -> Self {
        let cache = LookupCache::new(
            "custodian",
            vec![field::CUSTODIAN_ID.to_string()],
            vec![field::CUSTODIAN_NAME.to_string()],
            source,
        );
        Self {
            cache: Arc::new(cache),
        }
    }

    pub fn cache(&self) -> Arc<LookupCache> {
        Arc::clone(&self.cache)
    }
}

#[async_trait]
impl SupplementaryLookup for CustodianLookup {
    fn name(&self) -> &str {
        self.cache.name()
    }

    async fn supplement(&self, txn: &mut Transaction) -> Result<bool, LookupError> {
        let Some(id) = txn.get(field::CUSTODIAN_ID).filter(|v| v.is_truthy()).cloned() else {
            return Ok(false);
        };
        let Some(row) = self.cache.get(std::slice::from_ref(&id)) else {
            debug!(lookup = self.name(), key = %id, "no custodian row");
            return Ok(false);
        };
        let Some(name) = row.get(field::CUSTODIAN_NAME).and_then(FieldValue::as_text) else {
            return Ok(false);
        };
        let display = format!("{name} ({id})");
        txn.set(field::CUSTODIAN_NAME, display);
        note_supplement(txn, self.name(), &[(field::CUSTODIAN_ID.to_string(), id)]);
        Ok(true)
    }
}

/// Prior-day cost basis for short-term sales and long-out transfers.
///
/// Queries the appraisal as of the previous business day directly rather
/// than caching: the position table is keyed per (date, portfolio, security)
/// and each transaction needs exactly one row.
pub struct PriorCostLookup {
    source: Arc<dyn LookupSource>,
}

impl PriorCostLookup {
    pub fn new(source: Arc<dyn LookupSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl SupplementaryLookup for PriorCostLookup {
    fn name(&self) -> &str {
        "prior_cost"
    }

    async fn supplement(&self, txn: &mut Transaction) -> Result<bool, LookupError> {
        let Some(trade_date) = txn.date(field::TRADE_DATE) else {
            return Ok(false);
        };
        let Some(security_id) = txn
            .get(field::SECURITY_ID1)
            .filter(|v| v.is_truthy())
            .cloned()
        else {
            return Ok(false);
        };
        let portfolio = match txn
            .text(field::PORTFOLIO_CODE)
            .map(str::to_string)
            .or_else(|| txn.portfolio_code.clone())
        {
            Some(p) => p,
            None => return Ok(false),
        };

        let as_of = previous_business_day(trade_date);
        let params = vec![
            (COL_DATA_DATE.to_string(), FieldValue::from(as_of)),
            (field::PORTFOLIO_CODE.to_string(), FieldValue::from(portfolio)),
            (COL_SECURITY_ID.to_string(), security_id),
        ];
        let rows = self.source.fetch(&params).await?;
        let Some(row) = rows.first() else {
            debug!(lookup = self.name(), "no prior-day appraisal row");
            return Ok(false);
        };

        let held_qty = row
            .get(field::QUANTITY)
            .and_then(FieldValue::as_number)
            .unwrap_or_default();
        if held_qty.is_zero() {
            debug!(lookup = self.name(), "prior-day position has zero quantity");
            return Ok(false);
        }
        let local_basis = row
            .get(field::LOCAL_COST_BASIS)
            .and_then(FieldValue::as_number)
            .unwrap_or_default();
        let rpt_basis = row
            .get(field::RPT_COST_BASIS)
            .and_then(FieldValue::as_number)
            .unwrap_or_default();
        let local_per_unit = local_basis / held_qty;
        let rpt_per_unit = rpt_basis / held_qty;

        let txn_qty = txn.number_or_zero(field::QUANTITY);
        txn.set(field::LOCAL_COST_PER_UNIT, local_per_unit);
        txn.set(field::RPT_COST_PER_UNIT, rpt_per_unit);
        txn.set(field::LOCAL_COST_BASIS, local_per_unit * txn_qty);
        txn.set(field::RPT_COST_BASIS, rpt_per_unit * txn_qty);
        note_supplement(txn, self.name(), &params);
        Ok(true)
    }
}

/// Supplementary realized gain and original cost, keyed by the upstream
/// transaction identity. The transaction's own quantity is preserved; the
/// per-unit costs come from the supplementary row's quantity.
pub struct RealizedGainLookup {
    source: Arc<dyn LookupSource>,
}

impl RealizedGainLookup {
    pub fn new(source: Arc<dyn LookupSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl SupplementaryLookup for RealizedGainLookup {
    fn name(&self) -> &str {
        "realized_gain"
    }

    async fn supplement(&self, txn: &mut Transaction) -> Result<bool, LookupError> {
        let mut params = Vec::with_capacity(3);
        for key_field in [
            field::PORTFOLIO_TRANSACTION_ID,
            field::TRAN_ID,
            field::LOT_NUMBER,
        ] {
            match txn.get(key_field).filter(|v| v.is_truthy()).cloned() {
                Some(value) => params.push((key_field.to_string(), value)),
                None => return Ok(false),
            }
        }
        let rows = self.source.fetch(&params).await?;
        let Some(row) = rows.first() else {
            return Ok(false);
        };

        if let Some(gain) = row.get(field::REALIZED_GAIN_LOSS).cloned() {
            txn.set(field::REALIZED_GAIN_LOSS, gain);
        }
        let supp_qty = row
            .get(field::QUANTITY)
            .and_then(FieldValue::as_number)
            .unwrap_or_default();
        if let Some(basis) = row.get(field::COST_BASIS).and_then(FieldValue::as_number) {
            txn.set(field::RPT_COST_BASIS, basis);
            if !supp_qty.is_zero() {
                txn.set(field::RPT_COST_PER_UNIT, basis / supp_qty);
            }
        }
        if let Some(basis) = row
            .get(field::COST_BASIS_LOCAL)
            .and_then(FieldValue::as_number)
        {
            txn.set(field::LOCAL_COST_BASIS, basis);
            if !supp_qty.is_zero() {
                txn.set(field::LOCAL_COST_PER_UNIT, basis / supp_qty);
            }
        }
        note_supplement(txn, self.name(), &params);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LookupRow;
    use std::sync::Mutex;

    struct FakeSource {
        rows: Mutex<Vec<LookupRow>>,
    }

    impl FakeSource {
        fn new(rows: Vec<LookupRow>) -> Arc<Self> {
            Arc::new(Self {
                rows: Mutex::new(rows),
            })
        }
    }

    #[async_trait]
    impl LookupSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        async fn fetch(
            &self,
            params: &[(String, FieldValue)],
        ) -> Result<Vec<LookupRow>, LookupError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .filter(|row| {
                    params
                        .iter()
                        .all(|(col, value)| row.get(col) == Some(value))
                })
                .cloned()
                .collect())
        }
    }

    fn row(pairs: &[(&str, FieldValue)]) -> LookupRow {
        pairs
            .iter()
            .map(|(col, value)| (col.to_string(), value.clone()))
            .collect()
    }

    #[tokio::test]
    async fn security_master_supplements_both_legs_with_suffix() {
        let source = FakeSource::new(vec![
            row(&[
                (COL_SECURITY_ID, FieldValue::from(100)),
                ("Symbol", FieldValue::from("XYZ")),
                ("SecTypeBaseCode", FieldValue::from("cs")),
                (COL_COUPON_DELAY_DAYS, FieldValue::from(0)),
            ]),
            row(&[
                (COL_SECURITY_ID, FieldValue::from(200)),
                ("Symbol", FieldValue::from("cash")),
                ("SecTypeBaseCode", FieldValue::from("ca")),
            ]),
        ]);
        let lookup = SecurityMasterLookup::new(source);
        lookup.cache().refresh().await.unwrap();

        let mut txn = Transaction::from_fields([
            (field::SECURITY_ID1, FieldValue::from(100)),
            (field::SECURITY_ID2, FieldValue::from(200)),
        ]);
        assert!(lookup.supplement(&mut txn).await.unwrap());

        assert_eq!(txn.text(field::SYMBOL1), Some("XYZ"));
        assert_eq!(txn.text(field::SYMBOL2), Some("cash"));
        assert_eq!(txn.text(field::SEC_TYPE_BASE_CODE1), Some("cs"));
        assert_eq!(txn.text(field::SEC_TYPE_BASE_CODE2), Some("ca"));
        assert!(!txn.flag(field::USE_SEC_TYPE_FOR_COUPON_DELAY_DAYS1));
        assert_eq!(txn.lineage().len(), 2);
        assert!(txn.lineage()[0]
            .note
            .contains("Supplemented by security_master, based on (SecurityID1=100)"));
    }

    #[tokio::test]
    async fn coupon_delay_sentinel_becomes_flag() {
        let source = FakeSource::new(vec![row(&[
            (COL_SECURITY_ID, FieldValue::from(300)),
            ("Symbol", FieldValue::from("BOND")),
            (COL_COUPON_DELAY_DAYS, FieldValue::from(253)),
        ])]);
        let lookup = SecurityMasterLookup::new(source);
        lookup.cache().refresh().await.unwrap();

        let mut txn =
            Transaction::from_fields([(field::SECURITY_ID1, FieldValue::from(300))]);
        lookup.supplement(&mut txn).await.unwrap();

        assert!(txn.flag(field::USE_SEC_TYPE_FOR_COUPON_DELAY_DAYS1));
        assert_eq!(txn.number(field::COUPON_DELAY_DAYS1), Some(dec!(253)));
    }

    #[tokio::test]
    async fn portfolio_master_sets_enrichment_columns() {
        let source = FakeSource::new(vec![row(&[
            (field::PORTFOLIO_ID, FieldValue::from(42)),
            (field::PORTFOLIO_CODE, FieldValue::from("ABC123")),
            (field::PORTFOLIO_TYPE_CODE, FieldValue::from("RRSP Individual")),
            (field::REPORT_HEADING1, FieldValue::from("Jane Account")),
            (field::REPORTING_CURRENCY_CODE, FieldValue::from("cad")),
        ])]);
        let lookup = PortfolioMasterLookup::new(source);
        lookup.cache().refresh().await.unwrap();

        let mut txn = Transaction::from_fields([(field::PORTFOLIO_ID, FieldValue::from(42))]);
        assert!(lookup.supplement(&mut txn).await.unwrap());
        assert_eq!(txn.text(field::PORTFOLIO_CODE), Some("ABC123"));
        assert_eq!(txn.text(field::REPORT_HEADING1), Some("Jane Account"));
    }

    #[tokio::test]
    async fn currency_lookup_maps_three_iso_fields() {
        let source = FakeSource::new(vec![
            row(&[
                (COL_CURRENCY_CODE, FieldValue::from("cad")),
                (field::ISO_CODE, FieldValue::from("CAD")),
            ]),
            row(&[
                (COL_CURRENCY_CODE, FieldValue::from("us")),
                (field::ISO_CODE, FieldValue::from("USD")),
            ]),
        ]);
        let lookup = CurrencyLookup::new(source);
        lookup.cache().refresh().await.unwrap();

        let mut txn = Transaction::from_fields([
            (field::REPORTING_CURRENCY_CODE, FieldValue::from("cad")),
            (field::PRINCIPAL_CURRENCY_CODE1, FieldValue::from("us")),
        ]);
        assert!(lookup.supplement(&mut txn).await.unwrap());
        assert_eq!(txn.text(field::REPORTING_CURRENCY_ISO_CODE), Some("CAD"));
        assert_eq!(txn.text(field::PRINCIPAL_CURRENCY_ISO_CODE1), Some("USD"));
        // No FX numerator currency on this record.
        assert!(txn.get(field::ISO_CODE).is_none());
    }

    #[tokio::test]
    async fn fx_rate_pulls_row_on_miss() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let source = FakeSource::new(vec![row(&[
            (COL_PRICE_DATE, FieldValue::from(date)),
            (COL_NUMERATOR, FieldValue::from("USD")),
            (COL_DENOMINATOR, FieldValue::from("CAD")),
            (COL_FX_RATE, FieldValue::Number(dec!(1.3655))),
        ])]);
        let lookup = FxRateLookup::new(source);

        assert!(lookup.cache().is_empty());
        let rate = lookup.rate(date, "USD", "CAD").await.unwrap();
        assert_eq!(rate, Some(dec!(1.3655)));
        assert_eq!(lookup.cache().len(), 1);

        let missing = lookup.rate(date, "USD", "JPY").await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn custodian_name_includes_id() {
        let source = FakeSource::new(vec![row(&[
            (field::CUSTODIAN_ID, FieldValue::from(9)),
            (field::CUSTODIAN_NAME, FieldValue::from("Northern Trust")),
        ])]);
        let lookup = CustodianLookup::new(source);
        lookup.cache().refresh().await.unwrap();

        let mut txn = Transaction::from_fields([(field::CUSTODIAN_ID, FieldValue::from(9))]);
        lookup.supplement(&mut txn).await.unwrap();
        assert_eq!(txn.text(field::CUSTODIAN_NAME), Some("Northern Trust (9)"));
    }

    #[tokio::test]
    async fn prior_cost_scales_per_unit_basis_to_transaction_quantity() {
        // Monday trade; appraisal is as of the preceding Friday.
        let trade = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let friday = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        let source = FakeSource::new(vec![row(&[
            (COL_DATA_DATE, FieldValue::from(friday)),
            (field::PORTFOLIO_CODE, FieldValue::from("ABC123")),
            (COL_SECURITY_ID, FieldValue::from(100)),
            (field::QUANTITY, FieldValue::Number(dec!(1000))),
            (field::LOCAL_COST_BASIS, FieldValue::Number(dec!(990))),
            (field::RPT_COST_BASIS, FieldValue::Number(dec!(1350))),
        ])]);
        let lookup = PriorCostLookup::new(source);

        let mut txn = Transaction::from_fields([
            (field::TRADE_DATE, FieldValue::from(trade)),
            (field::SECURITY_ID1, FieldValue::from(100)),
            (field::PORTFOLIO_CODE, FieldValue::from("ABC123")),
            (field::QUANTITY, FieldValue::Number(dec!(500))),
        ]);
        assert!(lookup.supplement(&mut txn).await.unwrap());

        assert_eq!(txn.number(field::LOCAL_COST_PER_UNIT), Some(dec!(0.99)));
        assert_eq!(txn.number(field::RPT_COST_PER_UNIT), Some(dec!(1.35)));
        assert_eq!(txn.number(field::LOCAL_COST_BASIS), Some(dec!(495.00)));
        assert_eq!(txn.number(field::RPT_COST_BASIS), Some(dec!(675.00)));
    }

    #[tokio::test]
    async fn realized_gain_preserves_transaction_quantity() {
        let source = FakeSource::new(vec![row(&[
            (field::PORTFOLIO_TRANSACTION_ID, FieldValue::from(11)),
            (field::TRAN_ID, FieldValue::from(22)),
            (field::LOT_NUMBER, FieldValue::from(1)),
            (field::REALIZED_GAIN_LOSS, FieldValue::Number(dec!(-12.50))),
            (field::COST_BASIS, FieldValue::Number(dec!(200))),
            (field::COST_BASIS_LOCAL, FieldValue::Number(dec!(180))),
            (field::QUANTITY, FieldValue::Number(dec!(20))),
        ])]);
        let lookup = RealizedGainLookup::new(source);

        let mut txn = Transaction::from_fields([
            (field::PORTFOLIO_TRANSACTION_ID, FieldValue::from(11)),
            (field::TRAN_ID, FieldValue::from(22)),
            (field::LOT_NUMBER, FieldValue::from(1)),
            (field::QUANTITY, FieldValue::Number(dec!(7))),
        ]);
        assert!(lookup.supplement(&mut txn).await.unwrap());

        assert_eq!(txn.number(field::QUANTITY), Some(dec!(7)));
        assert_eq!(txn.number(field::REALIZED_GAIN_LOSS), Some(dec!(-12.50)));
        assert_eq!(txn.number(field::RPT_COST_BASIS), Some(dec!(200)));
        assert_eq!(txn.number(field::RPT_COST_PER_UNIT), Some(dec!(10)));
        assert_eq!(txn.number(field::LOCAL_COST_PER_UNIT), Some(dec!(9)));
    }

    #[tokio::test]
    async fn missing_keys_leave_transaction_untouched() {
        let lookup = RealizedGainLookup::new(FakeSource::new(vec![]));
        let mut txn = Transaction::new();
        assert!(!lookup.supplement(&mut txn).await.unwrap());
        assert!(txn.lineage().is_empty());
    }
}
