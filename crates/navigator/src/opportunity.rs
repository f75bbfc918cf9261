use crate::path::Path;
use common::types::{Asset, Quantity};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::Serialize;

/// Confidence lost per hop.
pub const HOP_CONFIDENCE_DECAY: f64 = 0.9;

/// A projected conversion of a held amount into another asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub have_asset: Asset,
    pub have_amount: Quantity,
    pub want_asset: Asset,
    pub best_path: Path,
    /// `have_amount * total_rate`, in units of `want_asset`.
    pub expected_amount: Quantity,
    pub expected_value_usd: Decimal,
    /// `0.9 ^ num_hops`.
    pub confidence: f64,
}

impl Opportunity {
    /// Projects `have_amount` of the path's source asset along `path`. `None`
    /// when the numbers cannot be represented as decimals.
    pub fn project(have_amount: Quantity, path: Path, want_price_usd: f64) -> Option<Self> {
        let rate = Decimal::from_f64(path.total_rate())?;
        let price = Decimal::from_f64(want_price_usd)?;
        let expected_amount = have_amount.0.checked_mul(rate)?;
        let expected_value_usd = expected_amount.checked_mul(price)?;
        let hops = i32::try_from(path.num_hops()).ok()?;

        Some(Self {
            have_asset: path.source().clone(),
            have_amount,
            want_asset: path.destination().clone(),
            expected_amount: Quantity(expected_amount),
            expected_value_usd,
            confidence: HOP_CONFIDENCE_DECAY.powi(hops),
            best_path: path,
        })
    }

    pub fn expected_value_usd_f64(&self) -> f64 {
        self.expected_value_usd.to_f64().unwrap_or(0.0)
    }
}

/// The candidate worth the most in USD. Ties keep the earlier candidate.
pub fn select_best(candidates: impl IntoIterator<Item = Opportunity>) -> Option<Opportunity> {
    candidates.into_iter().fold(None, |best, candidate| match best {
        Some(current) if current.expected_value_usd >= candidate.expected_value_usd => Some(current),
        _ => Some(candidate),
    })
}
