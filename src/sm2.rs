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

use crate::types::card::Scheduling;
use crate::types::card_state::CardState;
use crate::types::rating::Rating;
use crate::types::timestamp::Timestamp;

/// The ease factor assigned to a card that has never been reviewed.
pub const INITIAL_EASE: f64 = 2.5;

/// The floor below which the ease factor never drops.
pub const MIN_EASE: f64 = 1.3;

/// Extra interval growth applied to Easy answers past the fixed steps.
const EASY_BONUS: f64 = 1.3;

/// Interval after the first successful repetition, in days.
const FIRST_INTERVAL_DAYS: u32 = 1;

/// Interval after the second successful repetition, in days.
const SECOND_INTERVAL_DAYS: u32 = 6;

/// Scheduling for a card that has never been reviewed. It is due
/// immediately.
pub fn initialize(now: Timestamp) -> Scheduling {
    Scheduling {
        ease: INITIAL_EASE,
        interval_days: 0,
        repetitions: 0,
        state: CardState::New,
        next_review: now,
        last_reviewed: None,
    }
}

/// Advance a card's scheduling by one answer.
///
/// A total function: every input is clamped, never rejected. Again resets
/// the repetition ladder and demotes the card; Hard, Good and Easy climb it
/// (1 day, then 6, then `round(interval * ease)`, with an extra 1.3x on
/// Easy).
pub fn step(scheduling: &Scheduling, rating: Rating, now: Timestamp) -> Scheduling {
    match rating {
        Rating::Again => {
            let state = if scheduling.repetitions > 0 {
                CardState::Relearning
            } else {
                CardState::New
            };
            Scheduling {
                ease: (scheduling.ease - 0.2).max(MIN_EASE),
                interval_days: 0,
                repetitions: 0,
                state,
                next_review: now,
                last_reviewed: Some(now),
            }
        }
        Rating::Hard | Rating::Good | Rating::Easy => {
            let q = rating.value() as f64;
            let ease = (scheduling.ease + (0.1 - (4.0 - q) * (0.08 + (4.0 - q) * 0.02)))
                .max(MIN_EASE);
            let repetitions = scheduling.repetitions + 1;
            let interval_days = match repetitions {
                1 => FIRST_INTERVAL_DAYS,
                2 => SECOND_INTERVAL_DAYS,
                _ => {
                    let mut grown = scheduling.interval_days as f64 * ease;
                    if rating == Rating::Easy {
                        grown *= EASY_BONUS;
                    }
                    grown.round() as u32
                }
            };
            let state = if repetitions >= 2 {
                CardState::Review
            } else {
                CardState::Learning
            };
            Scheduling {
                ease,
                interval_days,
                repetitions,
                state,
                next_review: now.plus_days(interval_days as i64),
                last_reviewed: Some(now),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;

    use super::*;

    fn now() -> Timestamp {
        Timestamp::new(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap())
    }

    #[test]
    fn test_first_good_answer() {
        let next = step(&initialize(now()), Rating::Good, now());
        assert_eq!(next.interval_days, 1);
        assert_eq!(next.repetitions, 1);
        assert_eq!(next.state, CardState::Learning);
        // Good leaves the ease factor unchanged on the 4-point scale.
        assert_eq!(next.ease, INITIAL_EASE);
        assert_eq!(next.next_review, now().plus_days(1));
        assert_eq!(next.last_reviewed, Some(now()));
    }

    #[test]
    fn test_second_good_answer_graduates() {
        let first = step(&initialize(now()), Rating::Good, now());
        let second = step(&first, Rating::Good, now());
        assert_eq!(second.interval_days, 6);
        assert_eq!(second.repetitions, 2);
        assert_eq!(second.state, CardState::Review);
    }

    #[test]
    fn test_third_good_answer_multiplies_by_ease() {
        let mut scheduling = initialize(now());
        for _ in 0..3 {
            scheduling = step(&scheduling, Rating::Good, now());
        }
        // round(6 * 2.5) = 15.
        assert_eq!(scheduling.interval_days, 15);
        assert_eq!(scheduling.repetitions, 3);
        assert_eq!(scheduling.state, CardState::Review);
    }

    #[test]
    fn test_easy_applies_bonus_growth() {
        let first = step(&initialize(now()), Rating::Good, now());
        let second = step(&first, Rating::Good, now());
        let third = step(&second, Rating::Easy, now());
        // Easy raises the ease to 2.6, then round(6 * 2.6 * 1.3) = 20.
        assert_eq!(third.ease, 2.6);
        assert_eq!(third.interval_days, 20);
        // Strictly larger than the pre-review interval.
        assert!(third.interval_days > second.interval_days);
    }

    #[test]
    fn test_again_on_new_card_stays_new() {
        let next = step(&initialize(now()), Rating::Again, now());
        assert_eq!(next.interval_days, 0);
        assert_eq!(next.repetitions, 0);
        assert_eq!(next.state, CardState::New);
        assert!(next.ease >= MIN_EASE);
    }

    #[test]
    fn test_again_on_seen_card_relearns() {
        let mut scheduling = initialize(now());
        for _ in 0..3 {
            scheduling = step(&scheduling, Rating::Good, now());
        }
        let lapsed = step(&scheduling, Rating::Again, now());
        assert_eq!(lapsed.state, CardState::Relearning);
        assert_eq!(lapsed.interval_days, 0);
        assert_eq!(lapsed.repetitions, 0);
        assert_eq!(lapsed.ease, 2.3);
        assert_eq!(lapsed.next_review, now());
    }

    #[test]
    fn test_ease_never_drops_below_floor() {
        let mut scheduling = initialize(now());
        for _ in 0..20 {
            scheduling = step(&scheduling, Rating::Again, now());
            assert!(scheduling.ease >= MIN_EASE);
        }
        assert_eq!(scheduling.ease, MIN_EASE);
        // Hard also pulls the ease down, and also bottoms out at the floor.
        for _ in 0..20 {
            scheduling = step(&scheduling, Rating::Hard, now());
            assert!(scheduling.ease >= MIN_EASE);
        }
    }

    #[test]
    fn test_hard_lowers_ease() {
        let next = step(&initialize(now()), Rating::Hard, now());
        // 2.5 + (0.1 - 2 * (0.08 + 2 * 0.02)) = 2.36.
        assert!((next.ease - 2.36).abs() < 1e-9);
        assert_eq!(next.interval_days, 1);
        assert_eq!(next.state, CardState::Learning);
    }
}
