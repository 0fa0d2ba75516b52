//! Fixed-point share math
//!
//! Ratios carry 8 fractional digits (`SCALE = 10^8`). Every conversion
//! floors, so a sequence of conversions can only lose value to the pool,
//! never mint it. Products are formed in `u128`; a result that does not fit
//! back into `u64` yields `None`.

use crate::pool::Pool;

/// Fixed-point scale factor (1.0 == `SCALE`)
pub const SCALE: u64 = 100_000_000;

/// Shares issued per coin, scaled by [`SCALE`]
///
/// An empty pool bootstraps at 1:1.
pub fn shares_per_coin(pool: &Pool) -> Option<u64> {
    if pool.balance == 0 {
        return Some(SCALE);
    }
    ratio(pool.shares, pool.balance)
}

/// Coins redeemed per share, scaled by [`SCALE`]
///
/// An empty pool redeems at 1:1. A pool with coins but no shares is
/// treated the same way rather than dividing by zero.
pub fn coins_per_share(pool: &Pool) -> Option<u64> {
    if pool.balance == 0 || pool.shares == 0 {
        return Some(SCALE);
    }
    ratio(pool.balance, pool.shares)
}

/// Convert a coin amount into pool shares at the pool's current ratio
pub fn to_shares(amount: u64, pool: &Pool) -> Option<u64> {
    apply(amount, shares_per_coin(pool)?)
}

/// Convert pool shares into coins at the pool's current ratio
pub fn to_coins(shares: u64, pool: &Pool) -> Option<u64> {
    apply(shares, coins_per_share(pool)?)
}

fn ratio(numerator: u64, denominator: u64) -> Option<u64> {
    let scaled = u128::from(SCALE) * u128::from(numerator) / u128::from(denominator);
    u64::try_from(scaled).ok()
}

fn apply(value: u64, ratio: u64) -> Option<u64> {
    let product = u128::from(value) * u128::from(ratio) / u128::from(SCALE);
    u64::try_from(product).ok()
}
