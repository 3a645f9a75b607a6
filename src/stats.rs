// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::selector;
use crate::types::day::Day;

/// The length of the rolling retention window, in days, today included.
const RETENTION_WINDOW_DAYS: i64 = 7;

/// Aggregate study statistics for one user. Recomputed from activity
/// history; the counters only ever grow.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub current_streak: u32,
    /// Monotonic: a refresh never shrinks it.
    pub longest_streak: u32,
    /// Distinct active days within the trailing week.
    pub weekly_active_days: u32,
    /// `weekly_active_days` over the window length, as a whole percentage.
    pub retention_pct: u32,
    pub total_reviewed: u64,
    pub study_time_seconds: u64,
}

/// Counters to add on top of the recomputed aggregates.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct StatIncrements {
    pub reviewed: u64,
    pub study_time_seconds: u64,
}

/// Recompute a user's aggregate statistics from their merged activity
/// history. `review_days` and `memory_review_days` are the two activity
/// sources (card reviews and memorization drills); both count toward
/// streaks and retention. Absent history yields zeroed output.
pub fn refresh(
    previous: &UserStats,
    review_days: &[Day],
    memory_review_days: &[Day],
    increments: &StatIncrements,
    today: Day,
) -> UserStats {
    let mut merged: Vec<Day> = Vec::with_capacity(review_days.len() + memory_review_days.len());
    merged.extend_from_slice(review_days);
    merged.extend_from_slice(memory_review_days);

    let streaks = selector::streak(&merged, today);

    let window_start = today.minus_days(RETENTION_WINDOW_DAYS - 1);
    let weekly_active_days = merged
        .iter()
        .filter(|day| **day >= window_start && **day <= today)
        .collect::<BTreeSet<_>>()
        .len() as u32;
    let retention_pct = ((weekly_active_days as f64 / RETENTION_WINDOW_DAYS as f64) * 100.0)
        .round() as u32;

    UserStats {
        current_streak: streaks.current,
        longest_streak: streaks.longest.max(previous.longest_streak),
        weekly_active_days,
        retention_pct,
        total_reviewed: previous.total_reviewed + increments.reviewed,
        study_time_seconds: previous.study_time_seconds + increments.study_time_seconds,
    }
}
