//! Estimates and formatting helpers for operator tooling

use crate::chain::{ChainParams, COIN};
use crate::pow::{u256_to_f64, Target};
use serde::Serialize;
use std::time::Duration;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Worker count matching the available CPU cores
pub fn optimal_thread_count() -> usize {
    num_cpus::get().max(1)
}

/// Expected time until a block is found at `hash_rate` hashes per second.
///
/// Returns `None` when nothing is being hashed.
pub fn estimated_time_to_block(hash_rate: f64, target: &Target) -> Option<Duration> {
    if !hash_rate.is_finite() || hash_rate <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(u256_to_f64(target.work()) / hash_rate).ok()
}

/// Expected number of blocks found per day at `hash_rate`
pub fn expected_blocks_per_day(hash_rate: f64, target: &Target) -> f64 {
    if !hash_rate.is_finite() || hash_rate <= 0.0 {
        return 0.0;
    }
    hash_rate * SECONDS_PER_DAY / u256_to_f64(target.work())
}

/// Total subsidy paid by the `blocks` blocks starting at `height`
pub fn estimated_reward(params: &ChainParams, height: u64, blocks: u64) -> u64 {
    let interval = params.halving_interval.max(1);
    let end = height.saturating_add(blocks);
    let mut total = 0u64;
    let mut current = height;

    while current < end {
        let subsidy = params.block_subsidy(current);
        if subsidy == 0 {
            break;
        }
        let era_end = (current / interval + 1).saturating_mul(interval).min(end);
        total = total.saturating_add(subsidy.saturating_mul(era_end - current));
        current = era_end;
    }
    total
}

/// Daily revenue and cost estimate for a mining setup
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Profitability {
    pub blocks_per_day: f64,
    pub revenue_per_day: f64,
    pub energy_cost_per_day: f64,
    pub profit_per_day: f64,
}

/// Estimates daily profit from hash rate, power draw and prices.
///
/// `cost_per_kwh` and `coin_price` share a currency; the result is in it.
pub fn profitability(
    hash_rate: f64,
    target: &Target,
    params: &ChainParams,
    height: u64,
    power_watts: f64,
    cost_per_kwh: f64,
    coin_price: f64,
) -> Profitability {
    let blocks_per_day = expected_blocks_per_day(hash_rate, target);
    let reward_coins = params.block_subsidy(height) as f64 / COIN as f64;
    let revenue_per_day = blocks_per_day * reward_coins * coin_price;
    let energy_cost_per_day = power_watts.max(0.0) * 24.0 / 1_000.0 * cost_per_kwh;

    Profitability {
        blocks_per_day,
        revenue_per_day,
        energy_cost_per_day,
        profit_per_day: revenue_per_day - energy_cost_per_day,
    }
}

/// Renders a hash rate with a unit suffix, e.g. `12.50 MH/s`
pub fn format_hash_rate(hash_rate: f64) -> String {
    const UNITS: [&str; 4] = ["kH/s", "MH/s", "GH/s", "TH/s"];

    if hash_rate < 1_000.0 {
        return format!("{:.2} H/s", hash_rate.max(0.0));
    }
    let mut value = hash_rate;
    let mut unit = UNITS[0];
    for candidate in UNITS {
        value /= 1_000.0;
        unit = candidate;
        if value < 1_000.0 {
            break;
        }
    }
    format!("{:.2} {}", value, unit)
}
