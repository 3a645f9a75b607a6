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

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use rusqlite::Connection;
use rusqlite::Transaction;
use rusqlite::config::DbConfig;
use rusqlite::params;

use crate::error::Fallible;
use crate::stats::UserStats;
use crate::types::card::Card;
use crate::types::card::Performance;
use crate::types::card::Scheduling;
use crate::types::card_id::CardId;
use crate::types::card_state::CardState;
use crate::types::review_log::ReviewLogEntry;
use crate::types::session::CompletionReason;
use crate::types::session::SessionId;
use crate::types::session::SessionMetrics;
use crate::types::session::SessionMode;
use crate::types::session::SessionStatus;
use crate::types::session::StudySession;
use crate::types::timestamp::Timestamp;

/// The local store backing the engine: card repository, append-only review
/// log, session documents, and the aggregate stats row.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

pub type ReviewId = i64;

impl Database {
    pub fn new(database_path: &str) -> Fallible<Self> {
        let mut conn = Connection::open(database_path)?;
        conn.set_db_config(DbConfig::SQLITE_DBCONFIG_ENABLE_FKEY, true)?;
        {
            let tx = conn.transaction()?;
            if !probe_schema_exists(&tx)? {
                tx.execute_batch(include_str!("schema.sql"))?;
                tx.commit()?;
            }
        }
        let conn = Arc::new(Mutex::new(conn));
        Ok(Self { conn })
    }

    /// Add a new card to the store.
    pub fn insert_card(&self, card: &Card) -> Fallible<()> {
        log::debug!("Adding new card: {}", card.id);
        let tags = serde_json::to_string(&card.tags)?;
        let mut conn = self.acquire();
        let tx = conn.transaction()?;
        let sql = "insert into cards (card_id, concept_id, front, back, tags, created_at, ease, interval_days, repetitions, state, next_review, last_reviewed, total_reviews, correct_count, incorrect_count, average_response_time_ms, mistake_count, exam_weight) values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);";
        tx.execute(
            sql,
            params![
                &card.id,
                &card.concept_id,
                &card.front,
                &card.back,
                &tags,
                &card.created_at,
                card.scheduling.ease,
                card.scheduling.interval_days,
                card.scheduling.repetitions,
                &card.scheduling.state,
                &card.scheduling.next_review,
                &card.scheduling.last_reviewed,
                card.performance.total_reviews,
                card.performance.correct_count,
                card.performance.incorrect_count,
                card.performance.average_response_time_ms,
                card.mistake_count,
                card.exam_weight,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Fetch one card. Returns None if the id is unknown.
    pub fn get_card(&self, card_id: &CardId) -> Fallible<Option<Card>> {
        let conn = self.acquire();
        let sql = "select card_id, concept_id, front, back, tags, created_at, ease, interval_days, repetitions, state, next_review, last_reviewed, total_reviews, correct_count, incorrect_count, average_response_time_ms, mistake_count, exam_weight from cards where card_id = ?;";
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([card_id])?;
        if let Some(row) = rows.next()? {
            let card = read_card_row(row)?;
            Ok(Some(card))
        } else {
            Ok(None)
        }
    }

    /// All of the user's cards.
    pub fn all_cards(&self) -> Fallible<Vec<Card>> {
        let conn = self.acquire();
        let sql = "select card_id, concept_id, front, back, tags, created_at, ease, interval_days, repetitions, state, next_review, last_reviewed, total_reviews, correct_count, incorrect_count, average_response_time_ms, mistake_count, exam_weight from cards order by card_id;";
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let mut cards = Vec::new();
        while let Some(row) = rows.next()? {
            cards.push(read_card_row(row)?);
        }
        Ok(cards)
    }

    /// Write back a card's mutable fields after an answer.
    pub fn update_card(&self, card: &Card) -> Fallible<()> {
        let conn = self.acquire();
        let sql = "update cards set ease = ?, interval_days = ?, repetitions = ?, state = ?, next_review = ?, last_reviewed = ?, total_reviews = ?, correct_count = ?, incorrect_count = ?, average_response_time_ms = ?, mistake_count = ?, exam_weight = ? where card_id = ?;";
        conn.execute(
            sql,
            params![
                card.scheduling.ease,
                card.scheduling.interval_days,
                card.scheduling.repetitions,
                &card.scheduling.state,
                &card.scheduling.next_review,
                &card.scheduling.last_reviewed,
                card.performance.total_reviews,
                card.performance.correct_count,
                card.performance.incorrect_count,
                card.performance.average_response_time_ms,
                card.mistake_count,
                card.exam_weight,
                &card.id,
            ],
        )?;
        Ok(())
    }

    /// Append one review to the log.
    pub fn append_review(&self, entry: &ReviewLogEntry) -> Fallible<ReviewId> {
        let conn = self.acquire();
        let sql = "insert into review_log (card_id, session_id, rating, response_time_ms, previous_interval_days, new_interval_days, error_tag, reviewed_at) values (?, ?, ?, ?, ?, ?, ?, ?) returning review_id;";
        let review_id: ReviewId = conn.query_row(
            sql,
            params![
                &entry.card_id,
                &entry.session_id,
                entry.rating,
                entry.response_time_ms,
                entry.previous_interval_days,
                entry.new_interval_days,
                &entry.error_tag,
                &entry.reviewed_at,
            ],
            |row| row.get(0),
        )?;
        Ok(review_id)
    }

    /// Every review instant on record, for streak and retention refreshes.
    pub fn review_timestamps(&self) -> Fallible<Vec<Timestamp>> {
        let conn = self.acquire();
        let mut stmt = conn.prepare("select reviewed_at from review_log order by reviewed_at;")?;
        let mut rows = stmt.query([])?;
        let mut timestamps = Vec::new();
        while let Some(row) = rows.next()? {
            timestamps.push(row.get(0)?);
        }
        Ok(timestamps)
    }

    /// Save a session document, replacing any previous version. Callers
    /// save around every answer, so this is an upsert.
    pub fn save_session(&self, session: &StudySession) -> Fallible<()> {
        let card_queue = ids_to_json(session.card_queue.iter())?;
        let reviewed = ids_to_json(session.reviewed_card_ids.iter())?;
        let weakness_tags = serde_json::to_string(&session.weakness_tags)?;
        let conn = self.acquire();
        let sql = "insert or replace into sessions (session_id, mode, status, completion_reason, card_queue, reviewed_card_ids, total_cards, reviewed_cards, correct_count, incorrect_count, avg_response_time_ms, accuracy_pct, weakness_tags, started_at, completed_at, duration_seconds) values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);";
        conn.execute(
            sql,
            params![
                &session.id,
                &session.mode,
                &session.status,
                &session.completion_reason,
                &card_queue,
                &reviewed,
                session.metrics.total_cards,
                session.metrics.reviewed_cards,
                session.metrics.correct_count,
                session.metrics.incorrect_count,
                session.metrics.avg_response_time_ms,
                session.metrics.accuracy_pct,
                &weakness_tags,
                &session.started_at,
                &session.completed_at,
                &session.duration_seconds,
            ],
        )?;
        Ok(())
    }

    /// Fetch one session document. Returns None if the id is unknown.
    pub fn get_session(&self, session_id: &SessionId) -> Fallible<Option<StudySession>> {
        let conn = self.acquire();
        let sql = "select session_id, mode, status, completion_reason, card_queue, reviewed_card_ids, total_cards, reviewed_cards, correct_count, incorrect_count, avg_response_time_ms, accuracy_pct, weakness_tags, started_at, completed_at, duration_seconds from sessions where session_id = ?;";
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([session_id])?;
        if let Some(row) = rows.next()? {
            let session = read_session_row(row)?;
            Ok(Some(session))
        } else {
            Ok(None)
        }
    }

    /// The user's aggregate stats row. A fresh store yields the zeroed
    /// default.
    pub fn load_user_stats(&self) -> Fallible<UserStats> {
        let conn = self.acquire();
        let sql = "select current_streak, longest_streak, weekly_active_days, retention_pct, total_reviewed, study_time_seconds from user_stats where stats_id = 1;";
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            Ok(UserStats {
                current_streak: row.get(0)?,
                longest_streak: row.get(1)?,
                weekly_active_days: row.get(2)?,
                retention_pct: row.get(3)?,
                total_reviewed: row.get::<_, i64>(4)? as u64,
                study_time_seconds: row.get::<_, i64>(5)? as u64,
            })
        } else {
            Ok(UserStats::default())
        }
    }

    pub fn save_user_stats(&self, stats: &UserStats) -> Fallible<()> {
        let conn = self.acquire();
        let sql = "insert or replace into user_stats (stats_id, current_streak, longest_streak, weekly_active_days, retention_pct, total_reviewed, study_time_seconds) values (1, ?, ?, ?, ?, ?, ?);";
        conn.execute(
            sql,
            params![
                stats.current_streak,
                stats.longest_streak,
                stats.weekly_active_days,
                stats.retention_pct,
                stats.total_reviewed as i64,
                stats.study_time_seconds as i64,
            ],
        )?;
        Ok(())
    }

    fn acquire(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }
}

fn read_card_row(row: &rusqlite::Row) -> Fallible<Card> {
    let tags_json: String = row.get(4)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json)?;
    let state: CardState = row.get(9)?;
    Ok(Card {
        id: row.get(0)?,
        concept_id: row.get(1)?,
        front: row.get(2)?,
        back: row.get(3)?,
        tags,
        created_at: row.get(5)?,
        scheduling: Scheduling {
            ease: row.get(6)?,
            interval_days: row.get(7)?,
            repetitions: row.get(8)?,
            state,
            next_review: row.get(10)?,
            last_reviewed: row.get(11)?,
        },
        performance: Performance {
            total_reviews: row.get(12)?,
            correct_count: row.get(13)?,
            incorrect_count: row.get(14)?,
            average_response_time_ms: row.get(15)?,
        },
        mistake_count: row.get(16)?,
        exam_weight: row.get(17)?,
    })
}

fn read_session_row(row: &rusqlite::Row) -> Fallible<StudySession> {
    let id: SessionId = row.get(0)?;
    let mode: SessionMode = row.get(1)?;
    let status: SessionStatus = row.get(2)?;
    let completion_reason: Option<CompletionReason> = row.get(3)?;
    let card_queue_json: String = row.get(4)?;
    let reviewed_json: String = row.get(5)?;
    let weakness_json: String = row.get(12)?;
    let metrics = SessionMetrics {
        total_cards: row.get(6)?,
        reviewed_cards: row.get(7)?,
        correct_count: row.get(8)?,
        incorrect_count: row.get(9)?,
        avg_response_time_ms: row.get(10)?,
        accuracy_pct: row.get(11)?,
    };
    Ok(StudySession {
        id,
        mode,
        status,
        completion_reason,
        card_queue: ids_from_json(&card_queue_json)?,
        reviewed_card_ids: ids_from_json(&reviewed_json)?.into_iter().collect(),
        metrics,
        weakness_tags: serde_json::from_str(&weakness_json)?,
        started_at: row.get(13)?,
        completed_at: row.get(14)?,
        duration_seconds: row.get(15)?,
    })
}

fn ids_to_json<'a>(ids: impl Iterator<Item = &'a CardId>) -> Fallible<String> {
    let strings: Vec<&str> = ids.map(|id| id.as_str()).collect();
    Ok(serde_json::to_string(&strings)?)
}

fn ids_from_json(json: &str) -> Fallible<Vec<CardId>> {
    let strings: Vec<String> = serde_json::from_str(json)?;
    Ok(strings.into_iter().map(CardId::new).collect())
}

fn probe_schema_exists(tx: &Transaction) -> Fallible<bool> {
    let sql = "select count(*) from sqlite_master where type='table' AND name=?;";
    let count: i64 = tx.query_row(sql, ["cards"], |row| row.get(0))?;
    Ok(count > 0)
}
