//! Negotiated price for short-duration (special mode) holdings.
//!
//! The price compounds on every refresh tick: the latest relative price
//! move is amplified by a magnification that grows exponentially with the
//! time spent in special mode.

/// Magnification at `elapsed_hours = 0` is `BASE + GROWTH`.
const MAGNIFICATION_BASE: f64 = 1.0;
const MAGNIFICATION_GROWTH: f64 = 0.25;

/// Amplification applied to the relative price move after `elapsed_hours`
/// in special mode: `1.0 + 0.25 * e^elapsed_hours`.
pub fn magnification(elapsed_hours: f64) -> f64 {
    MAGNIFICATION_BASE + MAGNIFICATION_GROWTH * elapsed_hours.max(0.0).exp()
}

/// Relative move from `last_price` to `now_price`; zero without a prior price.
pub fn rate(now_price: f64, last_price: f64) -> f64 {
    if last_price == 0.0 {
        0.0
    } else {
        (now_price - last_price) / last_price
    }
}

/// Compute the next negotiation price.
///
/// `base_price` is the current negotiation price. When it is zero the bonus
/// is applied to `last_price`, or to `now_price` when there is no prior
/// price either. The result is floored and never negative.
pub fn price(now_price: f64, last_price: f64, elapsed_hours: f64, base_price: f64) -> f64 {
    let bonus = 1.0 + rate(now_price, last_price) * magnification(elapsed_hours);

    let base = if base_price != 0.0 {
        base_price
    } else if last_price != 0.0 {
        last_price
    } else {
        now_price
    };

    (base * bonus).floor().max(0.0)
}
