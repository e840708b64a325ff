use crate::config::MarketConfig;
use crate::models::{ListingKind, Mrp};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

/// Why a quote fell back to a fixed fee
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DegradedInput {
    MissingMrp,
    InvalidMrp(String),
    NonPositiveMrp,
    UnknownKind(String),
}

/// Advertising fee for a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeQuote {
    pub amount: i64,
    /// Set when the input could not be priced normally; the fee is still valid
    pub degraded: Option<DegradedInput>,
}

impl FeeQuote {
    fn exact(amount: i64) -> Self {
        Self { amount, degraded: None }
    }

    fn degraded(amount: i64, reason: DegradedInput) -> Self {
        Self { amount, degraded: Some(reason) }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Listing fee schedule
///
/// Books and stationery pay a share of their MRP with the fixed fee as floor;
/// flats, restaurants and events pay the monthly fee. Pure and deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostCalculator {
    fixed_fee: i64,
    monthly_fee: i64,
    rate_percent: u32,
}

impl CostCalculator {
    pub fn new(fixed_fee: i64, monthly_fee: i64, rate_percent: u32) -> Self {
        Self {
            fixed_fee,
            monthly_fee,
            rate_percent,
        }
    }

    pub fn from_config(config: &MarketConfig) -> Self {
        Self::new(config.fixed_fee, config.monthly_fee, config.fee_rate_percent)
    }

    /// Price a listing whose kind is still an unchecked string
    pub fn cost(&self, kind: &str, mrp: &Mrp) -> FeeQuote {
        match ListingKind::from_str(kind) {
            Ok(kind) => self.quote(kind, mrp),
            Err(_) => FeeQuote::degraded(self.monthly_fee, DegradedInput::UnknownKind(kind.to_string())),
        }
    }

    pub fn quote(&self, kind: ListingKind, mrp: &Mrp) -> FeeQuote {
        if !kind.is_mrp_priced() {
            return FeeQuote::exact(self.monthly_fee);
        }

        let value = match mrp {
            Mrp::Amount(value) if *value > Decimal::ZERO => *value,
            Mrp::Amount(_) => return FeeQuote::degraded(self.fixed_fee, DegradedInput::NonPositiveMrp),
            Mrp::Missing => return FeeQuote::degraded(self.fixed_fee, DegradedInput::MissingMrp),
            Mrp::Invalid(raw) => {
                return FeeQuote::degraded(self.fixed_fee, DegradedInput::InvalidMrp(raw.clone()))
            }
        };

        // Fractions round up to the next whole token
        let share = value
            .checked_mul(Decimal::from(self.rate_percent))
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            .map(|v| v.ceil())
            .and_then(|v| v.to_i64());

        match share {
            Some(share) => FeeQuote::exact(share.max(self.fixed_fee)),
            None => FeeQuote::degraded(self.fixed_fee, DegradedInput::InvalidMrp(value.to_string())),
        }
    }
}

impl Default for CostCalculator {
    fn default() -> Self {
        Self::from_config(&MarketConfig::default())
    }
}
