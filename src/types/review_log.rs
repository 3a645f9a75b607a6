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

use crate::types::card_id::CardId;
use crate::types::rating::Rating;
use crate::types::session::SessionId;
use crate::types::timestamp::Timestamp;

/// One answered card. Entries are append-only: the engine emits one per
/// answer and nothing ever mutates it afterwards.
#[derive(Clone, Debug)]
pub struct ReviewLogEntry {
    pub card_id: CardId,
    pub rating: Rating,
    pub response_time_ms: u32,
    pub previous_interval_days: u32,
    pub new_interval_days: u32,
    /// The session this answer was given in, if any. Stats refreshes also
    /// consume entries recorded outside a session.
    pub session_id: Option<SessionId>,
    /// What kind of mistake the user tagged this miss with.
    pub error_tag: Option<String>,
    pub reviewed_at: Timestamp,
}
