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

use crate::error::EngineError;
use crate::sm2;
use crate::types::card::Card;
use crate::types::card::EXAM_WEIGHT_MAX;
use crate::types::card::EXAM_WEIGHT_MIN;
use crate::types::card_id::CardId;
use crate::types::rating::Rating;
use crate::types::review_log::ReviewLogEntry;
use crate::types::session::CompletionReason;
use crate::types::session::SessionStatus;
use crate::types::session::StudySession;
use crate::types::timestamp::Timestamp;

/// At most this many weakness tags accumulate on a session.
const WEAKNESS_TAG_CAP: usize = 20;

/// How many of a missed card's tags are folded into the session.
const WEAKNESS_TAGS_PER_CARD: usize = 3;

/// Stands in for the tags of a missed card that has none.
const UNCATEGORIZED_TAG: &str = "uncategorized";

/// One answer, as it arrives from the boundary. The rating has already
/// been validated there.
#[derive(Clone, Debug)]
pub struct Answer {
    pub rating: Rating,
    pub response_time_ms: u32,
    /// What kind of mistake this was, when the user tagged it.
    pub error_tag: Option<String>,
}

/// What one accepted answer produced. The mutated card and session are the
/// caller's copies; the log entry is theirs to append.
#[derive(Clone, Debug)]
pub struct AnswerOutcome {
    pub log_entry: ReviewLogEntry,
    /// The next queued card awaiting an answer, if any.
    pub next_card_id: Option<CardId>,
    /// True if this answer finished the session.
    pub session_completed: bool,
}

/// Apply one answer to a session and its card.
///
/// The queue was frozen at session creation: the card must be in it, and
/// not answered before. On success the card's scheduling and performance,
/// the session's metrics, and the weakness tags are all updated in place,
/// and the session auto-completes once every queued card is answered.
pub fn submit_answer(
    session: &mut StudySession,
    card: &mut Card,
    answer: &Answer,
    now: Timestamp,
) -> Result<AnswerOutcome, EngineError> {
    if session.status != SessionStatus::Active {
        return Err(EngineError::InvalidState);
    }
    if !session.card_queue.contains(&card.id) {
        return Err(EngineError::NotInQueue);
    }
    if session.reviewed_card_ids.contains(&card.id) {
        return Err(EngineError::AlreadyAnswered);
    }

    let previous_interval_days = card.scheduling.interval_days;
    card.scheduling = sm2::step(&card.scheduling, answer.rating, now);

    let performance = &mut card.performance;
    performance.total_reviews += 1;
    if answer.rating.is_correct() {
        performance.correct_count += 1;
    } else {
        performance.incorrect_count += 1;
    }
    performance.average_response_time_ms = running_average(
        performance.average_response_time_ms,
        performance.total_reviews,
        answer.response_time_ms,
    );

    if answer.rating.is_correct() {
        card.mistake_count = card.mistake_count.saturating_sub(1);
        card.exam_weight = (card.exam_weight - 0.05).max(EXAM_WEIGHT_MIN);
    } else {
        card.mistake_count += 1;
        card.exam_weight = (card.exam_weight + 0.1).min(EXAM_WEIGHT_MAX);
    }

    let log_entry = ReviewLogEntry {
        card_id: card.id.clone(),
        rating: answer.rating,
        response_time_ms: answer.response_time_ms,
        previous_interval_days,
        new_interval_days: card.scheduling.interval_days,
        session_id: Some(session.id.clone()),
        error_tag: answer.error_tag.clone(),
        reviewed_at: now,
    };

    session.reviewed_card_ids.insert(card.id.clone());
    let metrics = &mut session.metrics;
    metrics.reviewed_cards += 1;
    if answer.rating.is_correct() {
        metrics.correct_count += 1;
    } else {
        metrics.incorrect_count += 1;
    }
    metrics.avg_response_time_ms = running_average(
        metrics.avg_response_time_ms,
        metrics.reviewed_cards,
        answer.response_time_ms,
    );
    metrics.accuracy_pct = ((metrics.correct_count as f64 / metrics.reviewed_cards as f64)
        * 1000.0)
        .round()
        / 10.0;

    if !answer.rating.is_correct() {
        record_weakness_tags(session, card);
    }

    let session_completed = session.metrics.reviewed_cards >= session.metrics.total_cards;
    if session_completed {
        complete(session, CompletionReason::Completed, now);
    }

    let next_card_id = session.next_unanswered().cloned();
    Ok(AnswerOutcome {
        log_entry,
        next_card_id,
        session_completed,
    })
}

/// Finish a session. Idempotent: completing a completed session changes
/// nothing and reports the current status.
pub fn complete(
    session: &mut StudySession,
    reason: CompletionReason,
    now: Timestamp,
) -> SessionStatus {
    if session.status == SessionStatus::Completed {
        return session.status;
    }
    session.status = SessionStatus::Completed;
    session.completion_reason = Some(reason);
    session.completed_at = Some(now);
    session.duration_seconds = Some(now.seconds_since(session.started_at).max(0));
    log::debug!("Session {} completed: {}", session.id, reason.as_str());
    session.status
}

fn running_average(previous_average: f64, count: u32, latest_ms: u32) -> f64 {
    (previous_average * (count as f64 - 1.0) + latest_ms as f64) / count as f64
}

fn record_weakness_tags(session: &mut StudySession, card: &Card) {
    let tags: Vec<&str> = if card.tags.is_empty() {
        vec![UNCATEGORIZED_TAG]
    } else {
        card.tags
            .iter()
            .take(WEAKNESS_TAGS_PER_CARD)
            .map(String::as_str)
            .collect()
    };
    for tag in tags {
        if session.weakness_tags.len() >= WEAKNESS_TAG_CAP {
            break;
        }
        if !session.weakness_tags.iter().any(|t| t == tag) {
            session.weakness_tags.push(tag.to_string());
        }
    }
}
