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

use std::collections::HashMap;

use crate::types::timestamp::Timestamp;

/// The sliding short-term window, in seconds.
const MINUTE_WINDOW_SECONDS: i64 = 60;

/// Where usage events are recorded and counted. Injected so a multi-
/// instance deployment can substitute a shared counter store; the limiter
/// itself has no hidden global state.
pub trait UsageStore {
    fn record(&mut self, user: &str, at: Timestamp);
    /// Events for `user` at or after `since`.
    fn count_since(&self, user: &str, since: Timestamp) -> usize;
    /// Events for `user` on the same UTC calendar day as `at`.
    fn count_on_day(&self, user: &str, at: Timestamp) -> usize;
}

/// Process-local usage store. Only safe for a single-instance deployment:
/// two processes each see only their own counters.
#[derive(Default)]
pub struct InMemoryUsageStore {
    events: HashMap<String, Vec<Timestamp>>,
}

impl InMemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UsageStore for InMemoryUsageStore {
    fn record(&mut self, user: &str, at: Timestamp) {
        self.events.entry(user.to_string()).or_default().push(at);
    }

    fn count_since(&self, user: &str, since: Timestamp) -> usize {
        match self.events.get(user) {
            Some(events) => events.iter().filter(|at| **at >= since).count(),
            None => 0,
        }
    }

    fn count_on_day(&self, user: &str, at: Timestamp) -> usize {
        match self.events.get(user) {
            Some(events) => events
                .iter()
                .filter(|event| event.utc_day() == at.utc_day())
                .count(),
            None => 0,
        }
    }
}

/// Why a request was allowed or refused.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Decision {
    Allowed,
    /// The sliding-minute cap was hit.
    MinuteLimit,
    /// The calendar-day cap was hit.
    DayLimit,
}

/// Sliding-minute plus calendar-day rate limiter for expensive operations
/// (content generation). The store is injected; this type owns no state of
/// its own beyond the caps.
pub struct RateLimiter<S> {
    store: S,
    per_minute: usize,
    per_day: usize,
}

impl<S: UsageStore> RateLimiter<S> {
    pub fn new(store: S, per_minute: usize, per_day: usize) -> Self {
        Self {
            store,
            per_minute,
            per_day,
        }
    }

    /// Check both caps and, if allowed, record the event.
    pub fn check_and_record(&mut self, user: &str, now: Timestamp) -> Decision {
        let window_start = now.minus_seconds(MINUTE_WINDOW_SECONDS);
        if self.store.count_since(user, window_start) >= self.per_minute {
            return Decision::MinuteLimit;
        }
        if self.store.count_on_day(user, now) >= self.per_day {
            return Decision::DayLimit;
        }
        self.store.record(user, now);
        Decision::Allowed
    }
}
