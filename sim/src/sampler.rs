//! Event sampling: exponential inter-arrival gaps and categorical draws

use common::{EventType, Intensities, Rng};

/// Smallest uniform draw fed into the log inversion.
const MIN_U: f64 = 1e-10;
/// Sentinel gap returned for degenerate totals; large enough to step past
/// any session end while staying finite.
const SAFE_DELTA_T: f64 = 1e9;

/// Inverse-CDF exponential draw: `-ln(u) / lambda_total`.
///
/// A non-finite or non-positive total yields the finite sentinel so the
/// producer loop still terminates.
pub fn sample_delta_t(rng: &mut dyn Rng, lambda_total: f64) -> f64 {
    if lambda_total <= 0.0 || !lambda_total.is_finite() {
        return SAFE_DELTA_T;
    }
    let mut u = rng.uniform();
    if u <= 0.0 || u >= 1.0 || u < MIN_U {
        u = MIN_U;
    }
    -u.ln() / lambda_total
}

/// Categorical draw over the six rates by their share of the total, with
/// the fixed traversal order of [`EventType::ALL`] breaking ties. The
/// boundary test is strict (`u < cum / total`).
pub fn sample_type(rng: &mut dyn Rng, intens: &Intensities) -> EventType {
    let total = intens.total();
    if total <= 0.0 || !total.is_finite() {
        return EventType::AddBid;
    }
    let u = rng.uniform();
    let mut cum = 0.0;
    for t in EventType::ALL {
        cum += intens.at(t);
        if u < cum / total {
            return t;
        }
    }
    EventType::ExecuteSell
}

/// Categorical draw over arbitrary nonnegative weights; entries that are
/// negative or non-finite are skipped. Returns 0 when nothing is drawable.
pub fn sample_index_from_weights(rng: &mut dyn Rng, weights: &[f64]) -> usize {
    if weights.is_empty() {
        return 0;
    }
    let total: f64 = weights.iter().filter(|w| w.is_finite() && **w > 0.0).sum();
    if total <= 0.0 {
        return 0;
    }
    let u = rng.uniform();
    if u <= 0.0 || u >= 1.0 {
        return 0;
    }
    let mut cum = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        if w.is_finite() && w > 0.0 {
            cum += w;
            if u < cum / total {
                return i;
            }
        }
    }
    weights.len() - 1
}
