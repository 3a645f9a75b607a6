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

use crate::sm2;
use crate::types::card_id::CardId;
use crate::types::card_state::CardState;
use crate::types::timestamp::Timestamp;

/// The lowest exam weight a card can decay to.
pub const EXAM_WEIGHT_MIN: f64 = 0.2;

/// The highest exam weight repeated mistakes can push a card to.
pub const EXAM_WEIGHT_MAX: f64 = 5.0;

/// The exam weight assigned to a newly created card.
pub const EXAM_WEIGHT_DEFAULT: f64 = 1.0;

/// The memory-strength model's view of a card.
///
/// Invariants: `ease >= 1.3` always, and a `New` card has
/// `interval_days == 0` and `repetitions == 0`.
#[derive(Clone, PartialEq, Debug)]
pub struct Scheduling {
    /// Multiplier controlling interval growth.
    pub ease: f64,
    /// Days until the next scheduled review.
    pub interval_days: u32,
    /// Consecutive successful repetitions.
    pub repetitions: u32,
    pub state: CardState,
    pub next_review: Timestamp,
    pub last_reviewed: Option<Timestamp>,
}

/// Lifetime answer counters for a card.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Performance {
    pub total_reviews: u32,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub average_response_time_ms: f64,
}

impl Performance {
    /// Correct answers over total answers, zero for an unreviewed card.
    pub fn accuracy(&self) -> f64 {
        if self.total_reviews == 0 {
            0.0
        } else {
            self.correct_count as f64 / self.total_reviews as f64
        }
    }
}

/// A flashcard. The engine schedules it; the content fields are opaque and
/// carried only so the presentation layer has something to show.
#[derive(Clone, Debug)]
pub struct Card {
    pub id: CardId,
    /// The concept this card belongs to, if any.
    pub concept_id: Option<String>,
    pub front: String,
    pub back: String,
    /// Insertion-ordered, duplicate-free.
    pub tags: Vec<String>,
    pub created_at: Timestamp,
    pub scheduling: Scheduling,
    pub performance: Performance,
    /// Count of recent misses, decremented on correct answers.
    pub mistake_count: u32,
    /// Exam-mode priority multiplier, bounded to [0.2, 5.0].
    pub exam_weight: f64,
}

impl Card {
    pub fn new(
        id: CardId,
        front: impl Into<String>,
        back: impl Into<String>,
        tags: Vec<String>,
        created_at: Timestamp,
    ) -> Self {
        let mut deduped: Vec<String> = Vec::new();
        for tag in tags {
            if !deduped.contains(&tag) {
                deduped.push(tag);
            }
        }
        Self {
            id,
            concept_id: None,
            front: front.into(),
            back: back.into(),
            tags: deduped,
            created_at,
            scheduling: sm2::initialize(created_at),
            performance: Performance::default(),
            mistake_count: 0,
            exam_weight: EXAM_WEIGHT_DEFAULT,
        }
    }

    pub fn accuracy(&self) -> f64 {
        self.performance.accuracy()
    }
}
