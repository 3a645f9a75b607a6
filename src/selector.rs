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

use crate::types::card::Card;
use crate::types::card_state::CardState;
use crate::types::day::Day;
use crate::types::timestamp::Timestamp;

/// Cards that are eligible for review right now: every non-new card whose
/// next review time has passed, earliest due first. Ties break on card id
/// so the ordering is reproducible.
pub fn due_cards(cards: &[Card], now: Timestamp) -> Vec<&Card> {
    let mut due: Vec<&Card> = cards
        .iter()
        .filter(|card| {
            card.scheduling.state != CardState::New && card.scheduling.next_review <= now
        })
        .collect();
    due.sort_by(|a, b| {
        a.scheduling
            .next_review
            .cmp(&b.scheduling.next_review)
            .then_with(|| a.id.cmp(&b.id))
    });
    due
}

/// Unseen cards, oldest first, truncated to `limit`.
pub fn new_cards(cards: &[Card], limit: usize) -> Vec<&Card> {
    let mut unseen: Vec<&Card> = cards
        .iter()
        .filter(|card| card.scheduling.state == CardState::New)
        .collect();
    unseen.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    unseen.truncate(limit);
    unseen
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct StreakSummary {
    /// Length of the run of consecutive active days ending today or
    /// yesterday. Zero if the most recent activity is older than that.
    pub current: u32,
    /// Length of the longest run of consecutive active days anywhere in
    /// the history.
    pub longest: u32,
}

/// Streaks over a set of activity days. Duplicate days collapse; an empty
/// history yields zero for both.
pub fn streak(days: &[Day], today: Day) -> StreakSummary {
    let distinct: BTreeSet<Day> = days.iter().copied().collect();
    let descending: Vec<Day> = distinct.into_iter().rev().collect();

    let mut longest: u32 = 0;
    let mut run: u32 = 0;
    for (i, day) in descending.iter().enumerate() {
        if i > 0 && descending[i - 1].pred() == *day {
            run += 1;
        } else {
            run = 1;
        }
        longest = longest.max(run);
    }

    let mut current: u32 = 0;
    if let Some(&latest) = descending.first() {
        if latest == today || latest == today.pred() {
            current = 1;
            for i in 1..descending.len() {
                if descending[i - 1].pred() == descending[i] {
                    current += 1;
                } else {
                    break;
                }
            }
        }
    }

    StreakSummary { current, longest }
}

/// A summary of the card collection by lifecycle state.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub total_cards: u32,
    pub new_cards: u32,
    pub learning_cards: u32,
    pub review_cards: u32,
    pub relearning_cards: u32,
    /// Whole-collection accuracy: correct answers over total answers,
    /// rounded to a whole percentage.
    pub accuracy_pct: u32,
}

pub fn review_stats(cards: &[Card]) -> ReviewStats {
    let mut stats = ReviewStats {
        total_cards: cards.len() as u32,
        new_cards: 0,
        learning_cards: 0,
        review_cards: 0,
        relearning_cards: 0,
        accuracy_pct: 0,
    };
    let mut reviews: u64 = 0;
    let mut correct: u64 = 0;
    for card in cards {
        match card.scheduling.state {
            CardState::New => stats.new_cards += 1,
            CardState::Learning => stats.learning_cards += 1,
            CardState::Review => stats.review_cards += 1,
            CardState::Relearning => stats.relearning_cards += 1,
        }
        reviews += card.performance.total_reviews as u64;
        correct += card.performance.correct_count as u64;
    }
    if reviews > 0 {
        stats.accuracy_pct = ((correct as f64 / reviews as f64) * 100.0).round() as u32;
    }
    stats
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use chrono::NaiveDate;
    use chrono::TimeZone;
    use chrono::Utc;

    use super::*;
    use crate::sm2;
    use crate::types::card::Performance;
    use crate::types::card_id::CardId;
    use crate::types::rating::Rating;

    /// Seconds relative to a fixed base instant.
    fn ts(secs: i64) -> Timestamp {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        Timestamp::new(base + Duration::seconds(secs))
    }

    fn day(y: i32, m: u32, d: u32) -> Day {
        Day::new(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn card(id: &str, created_at: Timestamp) -> Card {
        Card::new(CardId::new(id), "front", "back", vec![], created_at)
    }

    fn reviewed_card(id: &str, next_review: Timestamp) -> Card {
        let mut card = card(id, ts(-1000));
        card.scheduling = sm2::step(&card.scheduling, Rating::Good, ts(-1000));
        card.scheduling.next_review = next_review;
        card
    }

    #[test]
    fn test_due_cards_excludes_future_and_orders_ascending() {
        let now = ts(0);
        let cards = vec![
            reviewed_card("a", ts(-1)),
            reviewed_card("b", ts(-10)),
            reviewed_card("c", ts(30)),
        ];
        let due = due_cards(&cards, now);
        let ids: Vec<&str> = due.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_due_cards_excludes_new_cards() {
        let now = ts(0);
        let cards = vec![card("a", ts(-100))];
        assert!(due_cards(&cards, now).is_empty());
    }

    #[test]
    fn test_due_cards_breaks_ties_on_id() {
        let now = ts(0);
        let when = now.minus_seconds(5);
        let cards = vec![reviewed_card("b", when), reviewed_card("a", when)];
        let ids: Vec<&str> = due_cards(&cards, now).iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_new_cards_limit_and_ordering() {
        let cards = vec![
            card("newer", ts(-10)),
            card("older", ts(-20)),
            reviewed_card("seen", ts(0)),
        ];
        let unseen = new_cards(&cards, 1);
        assert_eq!(unseen.len(), 1);
        assert_eq!(unseen[0].id.as_str(), "older");
    }

    #[test]
    fn test_streak_today_and_yesterday() {
        let today = day(2025, 6, 10);
        let days = vec![today, today.pred()];
        let summary = streak(&days, today);
        assert_eq!(summary.current, 2);
        assert_eq!(summary.longest, 2);
    }

    #[test]
    fn test_streak_gap_resets_current_but_not_longest() {
        let today = day(2025, 6, 10);
        let days = vec![
            day(2025, 6, 5),
            day(2025, 6, 6),
            day(2025, 6, 7),
        ];
        let summary = streak(&days, today);
        assert_eq!(summary.current, 0);
        assert_eq!(summary.longest, 3);
    }

    #[test]
    fn test_streak_anchored_on_yesterday() {
        let today = day(2025, 6, 10);
        let days = vec![day(2025, 6, 9), day(2025, 6, 8), day(2025, 6, 6)];
        let summary = streak(&days, today);
        assert_eq!(summary.current, 2);
        assert_eq!(summary.longest, 2);
    }

    #[test]
    fn test_streak_collapses_duplicate_days() {
        let today = day(2025, 6, 10);
        let days = vec![today, today, today];
        let summary = streak(&days, today);
        assert_eq!(summary.current, 1);
        assert_eq!(summary.longest, 1);
    }

    #[test]
    fn test_streak_empty_history() {
        let summary = streak(&[], day(2025, 6, 10));
        assert_eq!(summary.current, 0);
        assert_eq!(summary.longest, 0);
    }

    #[test]
    fn test_review_stats_accuracy() {
        let mut fresh = card("a", ts(-100));
        fresh.performance = Performance {
            total_reviews: 4,
            correct_count: 3,
            incorrect_count: 1,
            average_response_time_ms: 1000.0,
        };
        let mut seen = reviewed_card("b", ts(0));
        seen.scheduling.state = CardState::Review;
        seen.performance = Performance {
            total_reviews: 6,
            correct_count: 4,
            incorrect_count: 2,
            average_response_time_ms: 1500.0,
        };
        let stats = review_stats(&[fresh, seen]);
        assert_eq!(stats.total_cards, 2);
        assert_eq!(stats.new_cards, 1);
        assert_eq!(stats.review_cards, 1);
        // (3 + 4) / (4 + 6) = 70%.
        assert_eq!(stats.accuracy_pct, 70);
    }

    #[test]
    fn test_review_stats_empty() {
        let stats = review_stats(&[]);
        assert_eq!(stats.total_cards, 0);
        assert_eq!(stats.accuracy_pct, 0);
    }
}
