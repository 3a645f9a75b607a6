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

use std::fmt::Display;
use std::fmt::Formatter;

/// Errors the session engine can return. These are discriminated so a
/// caller can map them to distinct responses without parsing message text.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EngineError {
    /// The session is no longer active.
    InvalidState,
    /// The card is not part of the session's queue.
    NotInQueue,
    /// The card was already answered in this session.
    AlreadyAnswered,
    /// The card or session does not exist. Never raised by the engine
    /// itself; reserved for the storage boundary.
    NotFound,
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidState => write!(f, "session is not active"),
            EngineError::NotInQueue => write!(f, "card is not in the session queue"),
            EngineError::AlreadyAnswered => write!(f, "card was already answered in this session"),
            EngineError::NotFound => write!(f, "record not found"),
        }
    }
}

impl std::error::Error for EngineError {}

/// An application-level error report.
#[derive(Debug)]
pub struct ErrorReport {
    message: String,
}

impl ErrorReport {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for ErrorReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "error: {}", self.message)
    }
}

impl std::error::Error for ErrorReport {}

pub type Fallible<T> = Result<T, ErrorReport>;

pub fn fail<T>(message: impl Into<String>) -> Fallible<T> {
    Err(ErrorReport::new(message))
}

impl From<EngineError> for ErrorReport {
    fn from(value: EngineError) -> Self {
        ErrorReport::new(value.to_string())
    }
}

impl From<std::io::Error> for ErrorReport {
    fn from(value: std::io::Error) -> Self {
        ErrorReport::new(value.to_string())
    }
}

impl From<rusqlite::Error> for ErrorReport {
    fn from(value: rusqlite::Error) -> Self {
        ErrorReport::new(value.to_string())
    }
}

impl From<serde_json::Error> for ErrorReport {
    fn from(value: serde_json::Error) -> Self {
        ErrorReport::new(value.to_string())
    }
}
