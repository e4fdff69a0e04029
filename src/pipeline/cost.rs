//! Cost calculator — pure pricing from hours and complexity.
//!
//! The one stage with no model call and no fallback branch. A missing plan
//! upstream is a contract violation handled by the router, not here.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;

use crate::pipeline::state::CostEstimate;

/// Base hourly rate in USD.
const HOURLY_RATE: Decimal = dec!(50);

/// Compute the price range for an estimated effort.
///
/// `base = hours × rate × multiplier`, quoted as a ±10% band. Unrecognized
/// complexity tiers price at the medium multiplier.
pub fn estimate(hours: u32, complexity: &str) -> CostEstimate {
    let base = Decimal::from(hours) * HOURLY_RATE * complexity_multiplier(complexity);
    CostEstimate {
        min: to_whole_dollars(base * dec!(0.9)),
        max: to_whole_dollars(base * dec!(1.1)),
        hours,
        complexity: complexity.to_string(),
    }
}

fn complexity_multiplier(tier: &str) -> Decimal {
    match tier {
        "simple" => dec!(1.0),
        "medium" => dec!(1.5),
        "complex" => dec!(2.0),
        _ => dec!(1.5),
    }
}

fn to_whole_dollars(amount: Decimal) -> i64 {
    // Inputs are bounded by u32 hours, so this never saturates.
    amount.round().to_i64().unwrap_or(i64::MAX)
}

/// Format a whole-dollar amount with thousands separators: 14400 → "14,400".
pub fn format_usd(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if amount < 0 { format!("-{out}") } else { out }
}
