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
use std::collections::HashSet;

use crate::selector;
use crate::types::card::Card;
use crate::types::card_id::CardId;
use crate::types::card_state::CardState;
use crate::types::timestamp::Timestamp;

// Ranking coefficients. Policy constants inherited from the product, not
// derived from anything.
const WEAK_MISTAKE_FACTOR: f64 = 10.0;
const WEAK_MISS_FACTOR: f64 = 100.0;
const EXAM_WEIGHT_FACTOR: f64 = 10.0;
const EXAM_MISTAKE_FACTOR: f64 = 5.0;
const EXAM_MISS_FACTOR: f64 = 100.0;

/// A card qualifies as weak with at least this many reviews on record.
const WEAK_MIN_REVIEWS: u32 = 3;

/// Mistakes alone admit a card into the weak pool, regardless of sample
/// size.
const WEAK_MIN_MISTAKES: u32 = 2;

/// Accuracy below this marks a card as poorly retained.
const WEAK_ACCURACY_CUTOFF: f64 = 0.75;

pub struct ReviewQueueOptions {
    /// Hard cap on the assembled queue.
    pub max_cards: usize,
    /// How many unseen cards may be introduced.
    pub max_new: usize,
    /// How many weak cards to mix in after the due ones.
    pub weakness_boost: usize,
}

/// The assembled review queue plus the counts the caller reports to the
/// user.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ReviewQueue {
    pub card_ids: Vec<CardId>,
    /// How many cards were due, before any truncation.
    pub due_count: usize,
    /// How many weak cards were selected for boosting.
    pub weak_count: usize,
    /// How many never-reviewed cards made it into the final queue.
    pub new_included: usize,
}

fn is_weak(card: &Card) -> bool {
    let sampled = card.performance.total_reviews >= WEAK_MIN_REVIEWS
        || card.mistake_count >= WEAK_MIN_MISTAKES;
    let struggling =
        card.accuracy() < WEAK_ACCURACY_CUTOFF || card.mistake_count >= WEAK_MIN_MISTAKES;
    sampled && struggling
}

fn weakness_score(card: &Card) -> f64 {
    card.mistake_count as f64 * WEAK_MISTAKE_FACTOR + (1.0 - card.accuracy()) * WEAK_MISS_FACTOR
}

fn exam_score(card: &Card) -> f64 {
    card.exam_weight * EXAM_WEIGHT_FACTOR
        + card.mistake_count as f64 * EXAM_MISTAKE_FACTOR
        + (1.0 - card.accuracy()) * EXAM_MISS_FACTOR
}

/// Assemble a study queue: due cards first, then weak cards worth extra
/// drilling, then unseen cards. The first occurrence of a card wins, and
/// the merged queue never exceeds `max_cards`.
pub fn build_review_queue(
    cards: &[Card],
    options: &ReviewQueueOptions,
    now: Timestamp,
) -> ReviewQueue {
    let due = selector::due_cards(cards, now);

    let mut weak: Vec<&Card> = cards.iter().filter(|card| is_weak(card)).collect();
    weak.sort_by(|a, b| {
        weakness_score(b)
            .total_cmp(&weakness_score(a))
            .then_with(|| a.id.cmp(&b.id))
    });
    weak.truncate(options.weakness_boost);

    let unseen = selector::new_cards(cards, options.max_new);

    let mut seen: HashSet<&CardId> = HashSet::new();
    let mut card_ids: Vec<CardId> = Vec::new();
    for card in due.iter().chain(weak.iter()).chain(unseen.iter()) {
        if seen.insert(&card.id) {
            card_ids.push(card.id.clone());
        }
    }
    card_ids.truncate(options.max_cards);

    let by_id: HashMap<&CardId, &Card> = cards.iter().map(|card| (&card.id, card)).collect();
    let new_included = card_ids
        .iter()
        .filter(|id| {
            by_id
                .get(id)
                .is_some_and(|card| card.scheduling.state == CardState::New)
        })
        .count();

    log::debug!(
        "Review queue: {} cards ({} due, {} weak, {} new included)",
        card_ids.len(),
        due.len(),
        weak.len(),
        new_included
    );

    ReviewQueue {
        card_ids,
        due_count: due.len(),
        weak_count: weak.len(),
        new_included,
    }
}

pub struct ExamQueueOptions {
    /// How many cards the exam should hold.
    pub count: usize,
    /// Restrict the exam to one concept.
    pub concept_id: Option<String>,
    /// Restrict the exam to cards carrying this tag.
    pub tag: Option<String>,
}

/// Assemble an exam queue over already-seen material. Due dates are
/// ignored: exams drill what the user has met before, whenever it is next
/// scheduled.
pub fn build_exam_queue(cards: &[Card], options: &ExamQueueOptions) -> Vec<CardId> {
    let mut pool: Vec<&Card> = cards
        .iter()
        .filter(|card| card.scheduling.state != CardState::New)
        .filter(|card| match &options.concept_id {
            Some(concept_id) => card.concept_id.as_deref() == Some(concept_id.as_str()),
            None => true,
        })
        .filter(|card| match &options.tag {
            Some(tag) => card.tags.iter().any(|t| t == tag),
            None => true,
        })
        .collect();
    pool.sort_by(|a, b| {
        exam_score(b)
            .total_cmp(&exam_score(a))
            .then_with(|| a.id.cmp(&b.id))
    });
    pool.truncate(options.count);
    log::debug!("Exam queue: {} cards", pool.len());
    pool.into_iter().map(|card| card.id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use chrono::TimeZone;
    use chrono::Utc;

    use super::*;
    use crate::sm2;
    use crate::types::card::Performance;
    use crate::types::rating::Rating;

    fn ts(secs: i64) -> Timestamp {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        Timestamp::new(base + Duration::seconds(secs))
    }

    fn new_card(id: &str, created_at: Timestamp) -> Card {
        Card::new(CardId::new(id), "front", "back", vec![], created_at)
    }

    fn due_card(id: &str, next_review: Timestamp) -> Card {
        let mut card = new_card(id, ts(-10_000));
        card.scheduling = sm2::step(&card.scheduling, Rating::Good, ts(-10_000));
        card.scheduling.next_review = next_review;
        card
    }

    fn weak_card(id: &str, mistakes: u32, correct: u32, total: u32) -> Card {
        // Weak cards are scheduled in the future so they only enter the
        // queue through the weakness pool.
        let mut card = due_card(id, ts(10_000));
        card.mistake_count = mistakes;
        card.performance = Performance {
            total_reviews: total,
            correct_count: correct,
            incorrect_count: total - correct,
            average_response_time_ms: 1000.0,
        };
        card
    }

    fn options(max_cards: usize, max_new: usize, weakness_boost: usize) -> ReviewQueueOptions {
        ReviewQueueOptions {
            max_cards,
            max_new,
            weakness_boost,
        }
    }

    #[test]
    fn test_merge_order_is_due_then_weak_then_new() {
        let cards = vec![
            new_card("n", ts(-100)),
            weak_card("w", 3, 1, 4),
            due_card("d", ts(-5)),
        ];
        let queue = build_review_queue(&cards, &options(10, 5, 5), ts(0));
        let ids: Vec<&str> = queue.card_ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["d", "w", "n"]);
        assert_eq!(queue.due_count, 1);
        assert_eq!(queue.weak_count, 1);
        assert_eq!(queue.new_included, 1);
    }

    #[test]
    fn test_due_card_is_not_repeated_by_weak_pool() {
        // Due, and also qualifying as weak: it must appear once, in the
        // due position.
        let mut both = due_card("b", ts(-5));
        both.mistake_count = 4;
        both.performance = Performance {
            total_reviews: 5,
            correct_count: 1,
            incorrect_count: 4,
            average_response_time_ms: 900.0,
        };
        let cards = vec![both, due_card("a", ts(-10))];
        let queue = build_review_queue(&cards, &options(10, 5, 5), ts(0));
        let ids: Vec<&str> = queue.card_ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_max_cards_truncates_merged_queue() {
        let cards = vec![
            due_card("a", ts(-30)),
            due_card("b", ts(-20)),
            due_card("c", ts(-10)),
        ];
        let queue = build_review_queue(&cards, &options(2, 0, 0), ts(0));
        assert_eq!(queue.card_ids.len(), 2);
        assert_eq!(queue.due_count, 3);
    }

    #[test]
    fn test_weak_ranking_is_by_score_descending() {
        let cards = vec![
            weak_card("low", 2, 3, 4),
            weak_card("high", 5, 0, 4),
        ];
        let queue = build_review_queue(&cards, &options(10, 0, 2), ts(0));
        let ids: Vec<&str> = queue.card_ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["high", "low"]);
    }

    #[test]
    fn test_mistakes_admit_a_barely_sampled_card() {
        // Only one review on record, but two mistakes: still weak.
        let card = weak_card("m", 2, 0, 1);
        assert!(is_weak(&card));
        // One mistake and one review: not weak.
        let card = weak_card("n", 1, 0, 1);
        assert!(!is_weak(&card));
    }

    #[test]
    fn test_accurate_well_sampled_card_is_not_weak() {
        let card = weak_card("a", 0, 9, 10);
        assert!(!is_weak(&card));
    }

    #[test]
    fn test_max_new_limits_unseen_cards() {
        let cards = vec![
            new_card("n1", ts(-300)),
            new_card("n2", ts(-200)),
            new_card("n3", ts(-100)),
        ];
        let queue = build_review_queue(&cards, &options(10, 2, 0), ts(0));
        let ids: Vec<&str> = queue.card_ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["n1", "n2"]);
        assert_eq!(queue.new_included, 2);
    }

    #[test]
    fn test_exam_queue_excludes_new_and_ranks_by_weight() {
        let mut heavy = weak_card("heavy", 0, 4, 4);
        heavy.exam_weight = 3.0;
        let mut light = weak_card("light", 0, 4, 4);
        light.exam_weight = 1.0;
        let cards = vec![light, new_card("n", ts(-100)), heavy];
        let queue = build_exam_queue(
            &cards,
            &ExamQueueOptions {
                count: 10,
                concept_id: None,
                tag: None,
            },
        );
        let ids: Vec<&str> = queue.iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["heavy", "light"]);
    }

    #[test]
    fn test_exam_queue_filters_by_concept_and_tag() {
        let mut a = weak_card("a", 0, 4, 4);
        a.concept_id = Some("anatomy".to_string());
        a.tags = vec!["bones".to_string()];
        let mut b = weak_card("b", 0, 4, 4);
        b.concept_id = Some("anatomy".to_string());
        let mut c = weak_card("c", 0, 4, 4);
        c.concept_id = Some("chemistry".to_string());
        let cards = vec![a, b, c];

        let by_concept = build_exam_queue(
            &cards,
            &ExamQueueOptions {
                count: 10,
                concept_id: Some("anatomy".to_string()),
                tag: None,
            },
        );
        assert_eq!(by_concept.len(), 2);

        let by_tag = build_exam_queue(
            &cards,
            &ExamQueueOptions {
                count: 10,
                concept_id: Some("anatomy".to_string()),
                tag: Some("bones".to_string()),
            },
        );
        let ids: Vec<&str> = by_tag.iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_exam_queue_ignores_due_dates() {
        // Scheduled far in the future, still examinable.
        let card = due_card("future", ts(1_000_000));
        let queue = build_exam_queue(
            &[card],
            &ExamQueueOptions {
                count: 10,
                concept_id: None,
                tag: None,
            },
        );
        assert_eq!(queue.len(), 1);
    }
}
