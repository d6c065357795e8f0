// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recency boost for positive moments.

use chrono::{DateTime, Duration, Utc};

use crate::budget::ContextItem;

/// Score bonus for an item `age` old: `max_boost` when brand new, decaying
/// linearly to zero at `window_days`.
pub fn recency_boost(age: Duration, max_boost: f32, window_days: u32) -> f32 {
    let window = Duration::days(i64::from(window_days));
    if window <= Duration::zero() || age >= window {
        return 0.0;
    }
    let age = age.max(Duration::zero());
    let remaining = 1.0 - age.num_seconds() as f64 / window.num_seconds() as f64;
    max_boost * remaining as f32
}

/// Boost each dated item and re-sort by boosted score, highest first.
pub fn apply_recency(items: &mut [ContextItem], now: DateTime<Utc>, max_boost: f32, window_days: u32) {
    for item in items.iter_mut() {
        if let Some(created_at) = item.created_at {
            item.score += recency_boost(now - created_at, max_boost, window_days);
        }
    }
    items.sort_by(|a, b| b.score.total_cmp(&a.score));
}
