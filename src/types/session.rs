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
use std::fmt::Display;
use std::fmt::Formatter;

use rusqlite::ToSql;
use rusqlite::types::FromSql;
use rusqlite::types::FromSqlError;
use rusqlite::types::FromSqlResult;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;

use crate::error::ErrorReport;
use crate::error::fail;
use crate::types::card_id::CardId;
use crate::types::timestamp::Timestamp;

/// An opaque session identifier, minted by the caller.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for SessionId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}

impl FromSql for SessionId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let string: String = FromSql::column_result(value)?;
        Ok(SessionId(string))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionMode {
    /// Scheduled reviewing: due cards first, then weak and new cards.
    Review,
    /// Drilling already-seen material, ignoring due dates.
    Exam,
}

impl SessionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::Review => "review",
            SessionMode::Exam => "exam",
        }
    }
}

impl TryFrom<String> for SessionMode {
    type Error = ErrorReport;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "review" => Ok(SessionMode::Review),
            "exam" => Ok(SessionMode::Exam),
            _ => fail(format!("Invalid session mode: {}", value)),
        }
    }
}

impl ToSql for SessionMode {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SessionMode {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let string: String = FromSql::column_result(value)?;
        SessionMode::try_from(string).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Sessions only ever move from `Active` to `Completed`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }
}

impl TryFrom<String> for SessionStatus {
    type Error = ErrorReport;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            _ => fail(format!("Invalid session status: {}", value)),
        }
    }
}

impl ToSql for SessionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SessionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let string: String = FromSql::column_result(value)?;
        SessionStatus::try_from(string).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CompletionReason {
    /// Every card in the queue was answered.
    Completed,
    /// The user ended the session early.
    UserExit,
    /// The session sat idle past its deadline.
    Timeout,
    /// The session was never picked back up.
    Abandoned,
}

impl CompletionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CompletionReason::Completed => "completed",
            CompletionReason::UserExit => "user_exit",
            CompletionReason::Timeout => "timeout",
            CompletionReason::Abandoned => "abandoned",
        }
    }
}

impl TryFrom<String> for CompletionReason {
    type Error = ErrorReport;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "completed" => Ok(CompletionReason::Completed),
            "user_exit" => Ok(CompletionReason::UserExit),
            "timeout" => Ok(CompletionReason::Timeout),
            "abandoned" => Ok(CompletionReason::Abandoned),
            _ => fail(format!("Invalid completion reason: {}", value)),
        }
    }
}

impl ToSql for CompletionReason {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for CompletionReason {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let string: String = FromSql::column_result(value)?;
        CompletionReason::try_from(string).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Running totals over the answers given in one session.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct SessionMetrics {
    pub total_cards: u32,
    pub reviewed_cards: u32,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub avg_response_time_ms: f64,
    /// Percentage with one decimal place.
    pub accuracy_pct: f64,
}

/// One study session. The engine treats this as a value: callers reload and
/// save it around every answer.
///
/// Invariants: the queue is frozen at creation and duplicate-free;
/// `reviewed_card_ids` is always a subset of the queue.
#[derive(Clone, Debug)]
pub struct StudySession {
    pub id: SessionId,
    pub mode: SessionMode,
    pub status: SessionStatus,
    pub completion_reason: Option<CompletionReason>,
    pub card_queue: Vec<CardId>,
    pub reviewed_card_ids: BTreeSet<CardId>,
    pub metrics: SessionMetrics,
    /// Tags of cards the user missed, at most 20, duplicate-free.
    pub weakness_tags: Vec<String>,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub duration_seconds: Option<i64>,
}

impl StudySession {
    pub fn new(
        id: SessionId,
        mode: SessionMode,
        card_queue: Vec<CardId>,
        started_at: Timestamp,
    ) -> Self {
        let mut queue: Vec<CardId> = Vec::with_capacity(card_queue.len());
        for card_id in card_queue {
            if !queue.contains(&card_id) {
                queue.push(card_id);
            }
        }
        let metrics = SessionMetrics {
            total_cards: queue.len() as u32,
            ..SessionMetrics::default()
        };
        Self {
            id,
            mode,
            status: SessionStatus::Active,
            completion_reason: None,
            card_queue: queue,
            reviewed_card_ids: BTreeSet::new(),
            metrics,
            weakness_tags: Vec::new(),
            started_at,
            completed_at: None,
            duration_seconds: None,
        }
    }

    /// The first queued card that has not been answered yet.
    pub fn next_unanswered(&self) -> Option<&CardId> {
        self.card_queue
            .iter()
            .find(|id| !self.reviewed_card_ids.contains(id))
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}
