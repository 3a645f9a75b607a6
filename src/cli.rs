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
use std::fmt::Display;
use std::fmt::Formatter;
use std::time::Instant;

use clap::Parser;
use clap::ValueEnum;
use serde::Serialize;

use crate::db::Database;
use crate::engine;
use crate::engine::Answer;
use crate::error::EngineError;
use crate::error::Fallible;
use crate::queue;
use crate::queue::ExamQueueOptions;
use crate::queue::ReviewQueueOptions;
use crate::selector;
use crate::selector::ReviewStats;
use crate::stats;
use crate::stats::StatIncrements;
use crate::stats::UserStats;
use crate::types::card::Card;
use crate::types::card_id::CardId;
use crate::types::rating::Rating;
use crate::types::session::CompletionReason;
use crate::types::session::SessionId;
use crate::types::session::SessionMode;
use crate::types::session::StudySession;
use crate::types::timestamp::Timestamp;

#[derive(Parser)]
#[command(version, about, long_about = None)]
enum Command {
    /// Add a card to the collection.
    Add {
        /// The question side.
        front: String,
        /// The answer side.
        back: String,
        /// A tag. Repeatable.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// The concept this card belongs to.
        #[arg(long)]
        concept: Option<String>,
        /// Path to the database file.
        #[arg(long, default_value = "mnemo.db")]
        db: String,
    },
    /// Review due cards, plus weak and new ones.
    Drill {
        /// Cap on the session queue.
        #[arg(long, default_value_t = 20)]
        max_cards: usize,
        /// How many unseen cards to introduce.
        #[arg(long, default_value_t = 10)]
        max_new: usize,
        /// How many weak cards to mix in.
        #[arg(long, default_value_t = 5)]
        weakness_boost: usize,
        /// Path to the database file.
        #[arg(long, default_value = "mnemo.db")]
        db: String,
    },
    /// Drill already-seen cards, hardest first, ignoring due dates.
    Exam {
        /// How many cards the exam should hold.
        #[arg(long, default_value_t = 10)]
        count: usize,
        /// Restrict the exam to one concept.
        #[arg(long)]
        concept: Option<String>,
        /// Restrict the exam to cards carrying this tag.
        #[arg(long)]
        tag: Option<String>,
        /// Path to the database file.
        #[arg(long, default_value = "mnemo.db")]
        db: String,
    },
    /// Print collection and streak statistics.
    Stats {
        #[arg(long, default_value_t = StatsFormat::Text)]
        format: StatsFormat,
        /// Path to the database file.
        #[arg(long, default_value = "mnemo.db")]
        db: String,
    },
}

#[derive(ValueEnum, Clone, Copy)]
pub enum StatsFormat {
    /// Human-readable output.
    Text,
    /// JSON output.
    Json,
}

impl Display for StatsFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StatsFormat::Text => write!(f, "text"),
            StatsFormat::Json => write!(f, "json"),
        }
    }
}

pub fn entrypoint() -> Fallible<()> {
    let cli: Command = Command::parse();
    match cli {
        Command::Add {
            front,
            back,
            tags,
            concept,
            db,
        } => {
            let db = Database::new(&db)?;
            let now = Timestamp::now();
            let id = CardId::new(format!("card-{}", now.unix_millis()));
            let mut card = Card::new(id, front, back, tags, now);
            card.concept_id = concept;
            db.insert_card(&card)?;
            println!("Added card {}.", card.id);
            Ok(())
        }
        Command::Drill {
            max_cards,
            max_new,
            weakness_boost,
            db,
        } => {
            let db = Database::new(&db)?;
            let cards = db.all_cards()?;
            let options = ReviewQueueOptions {
                max_cards,
                max_new,
                weakness_boost,
            };
            let queue = queue::build_review_queue(&cards, &options, Timestamp::now());
            if queue.card_ids.is_empty() {
                println!("No cards to review.");
                return Ok(());
            }
            println!(
                "{} cards to review ({} due, {} new).",
                queue.card_ids.len(),
                queue.due_count,
                queue.new_included
            );
            run_session(&db, cards, queue.card_ids, SessionMode::Review)
        }
        Command::Exam {
            count,
            concept,
            tag,
            db,
        } => {
            let db = Database::new(&db)?;
            let cards = db.all_cards()?;
            let options = ExamQueueOptions {
                count,
                concept_id: concept,
                tag,
            };
            let card_ids = queue::build_exam_queue(&cards, &options);
            if card_ids.is_empty() {
                println!("No cards available for an exam.");
                return Ok(());
            }
            println!("Exam over {} cards.", card_ids.len());
            run_session(&db, cards, card_ids, SessionMode::Exam)
        }
        Command::Stats { format, db } => print_stats(&db, format),
    }
}

fn run_session(
    db: &Database,
    cards: Vec<Card>,
    card_ids: Vec<CardId>,
    mode: SessionMode,
) -> Fallible<()> {
    let started_at = Timestamp::now();
    let session_id = SessionId::new(format!("session-{}", started_at.unix_millis()));
    let mut session = StudySession::new(session_id, mode, card_ids, started_at);
    db.save_session(&session)?;

    let mut by_id: HashMap<CardId, Card> = cards
        .into_iter()
        .map(|card| (card.id.clone(), card))
        .collect();

    while let Some(card_id) = session.next_unanswered().cloned() {
        let card = match by_id.get_mut(&card_id) {
            Some(card) => card,
            None => return Err(EngineError::NotFound.into()),
        };
        println!();
        println!("Q: {}", card.front);
        let shown = Instant::now();
        println!("[press enter to reveal]");
        wait_for_enter()?;
        println!("A: {}", card.back);
        match read_rating()? {
            RatingInput::Rating(rating) => {
                let answer = Answer {
                    rating,
                    response_time_ms: shown.elapsed().as_millis() as u32,
                    error_tag: None,
                };
                let outcome = engine::submit_answer(&mut session, card, &answer, Timestamp::now())?;
                db.update_card(card)?;
                db.append_review(&outcome.log_entry)?;
                db.save_session(&session)?;
            }
            RatingInput::Quit => {
                engine::complete(&mut session, CompletionReason::UserExit, Timestamp::now());
                db.save_session(&session)?;
                break;
            }
        }
    }

    println!();
    if session.completion_reason == Some(CompletionReason::Completed) {
        println!("Session completed.");
    } else {
        println!("Session ended.");
    }
    let metrics = &session.metrics;
    println!(
        "Answered {} of {} cards, accuracy {:.1}%.",
        metrics.reviewed_cards, metrics.total_cards, metrics.accuracy_pct
    );
    if !session.weakness_tags.is_empty() {
        println!("Weak areas: {}.", session.weakness_tags.join(", "));
    }
    refresh_user_stats(db, &session)?;
    Ok(())
}

fn refresh_user_stats(db: &Database, session: &StudySession) -> Fallible<()> {
    let previous = db.load_user_stats()?;
    let review_days: Vec<_> = db
        .review_timestamps()?
        .iter()
        .map(|ts| ts.local_day())
        .collect();
    let increments = StatIncrements {
        reviewed: session.metrics.reviewed_cards as u64,
        study_time_seconds: session.duration_seconds.unwrap_or(0) as u64,
    };
    let today = Timestamp::now().local_day();
    let stats = stats::refresh(&previous, &review_days, &[], &increments, today);
    db.save_user_stats(&stats)?;
    Ok(())
}

enum RatingInput {
    Rating(Rating),
    Quit,
}

fn wait_for_enter() -> Fallible<()> {
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(())
}

fn read_rating() -> Fallible<RatingInput> {
    loop {
        println!("Grade: (1 = Again, 2 = Hard, 3 = Good, 4 = Easy, q = quit)");
        let mut input = String::new();
        let bytes = std::io::stdin().read_line(&mut input)?;
        if bytes == 0 {
            // End of input counts as quitting.
            return Ok(RatingInput::Quit);
        }
        match input.trim() {
            "1" => return Ok(RatingInput::Rating(Rating::Again)),
            "2" => return Ok(RatingInput::Rating(Rating::Hard)),
            "3" => return Ok(RatingInput::Rating(Rating::Good)),
            "4" => return Ok(RatingInput::Rating(Rating::Easy)),
            "q" => return Ok(RatingInput::Quit),
            _ => println!("Invalid input. Please enter a number between 1 and 4, or q."),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsReport {
    collection: ReviewStats,
    user: UserStats,
}

fn print_stats(db_path: &str, format: StatsFormat) -> Fallible<()> {
    let db = Database::new(db_path)?;
    let cards = db.all_cards()?;
    let collection = selector::review_stats(&cards);

    let previous = db.load_user_stats()?;
    let review_days: Vec<_> = db
        .review_timestamps()?
        .iter()
        .map(|ts| ts.local_day())
        .collect();
    let today = Timestamp::now().local_day();
    let user = stats::refresh(&previous, &review_days, &[], &StatIncrements::default(), today);
    db.save_user_stats(&user)?;

    match format {
        StatsFormat::Json => {
            let report = StatsReport { collection, user };
            let json = serde_json::to_string_pretty(&report)?;
            println!("{}", json);
        }
        StatsFormat::Text => {
            println!(
                "Cards: {} ({} new, {} learning, {} review, {} relearning)",
                collection.total_cards,
                collection.new_cards,
                collection.learning_cards,
                collection.review_cards,
                collection.relearning_cards
            );
            println!("Accuracy: {}%", collection.accuracy_pct);
            println!(
                "Streak: {} days (longest {})",
                user.current_streak, user.longest_streak
            );
            println!(
                "Active {} of the last 7 days ({}% retention)",
                user.weekly_active_days, user.retention_pct
            );
        }
    }
    Ok(())
}
