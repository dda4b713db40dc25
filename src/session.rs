//! Conversation sessions
//!
//! A [`Session`] owns its transcript and its rate-limit clock. Turns are only
//! ever appended; [`Session::reset`] is the one way to discard them, and it
//! issues a new identifier.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::PlaceQuery;
use crate::throttle::TurnThrottle;

/// Opaque session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// What an assistant turn left open for the next one
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum TurnContext {
    #[default]
    None,
    /// The place could not be settled; the next reply may disambiguate it
    AwaitingClarification(PlaceQuery),
    /// A forecast was delivered for this query
    Answered(PlaceQuery),
}

/// One utterance in a transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Position within the session, starting at 0
    pub order: usize,
    pub context: TurnContext,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// A user turn; its order is assigned on append
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), TurnContext::None)
    }

    /// An assistant turn; its order is assigned on append
    pub fn assistant(content: impl Into<String>, context: TurnContext) -> Self {
        Self::new(Role::Assistant, content.into(), context)
    }

    fn new(role: Role, content: String, context: TurnContext) -> Self {
        Self {
            role,
            content,
            order: 0,
            context,
            created_at: Utc::now(),
        }
    }
}

/// One conversation
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    turns: Vec<Turn>,
    last_turn_at: Option<DateTime<Utc>>,
    throttle: TurnThrottle,
}

impl Session {
    /// Create a session with a fresh identifier and an empty transcript
    pub fn create(min_turn_interval: Duration) -> Self {
        Self {
            id: SessionId::generate(),
            turns: Vec::new(),
            last_turn_at: None,
            throttle: TurnThrottle::new(min_turn_interval),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last_turn_at(&self) -> Option<DateTime<Utc>> {
        self.last_turn_at
    }

    pub fn throttle_mut(&mut self) -> &mut TurnThrottle {
        &mut self.throttle
    }

    /// Append a turn, stamping its order. Returns the order assigned.
    pub fn append_turn(&mut self, mut turn: Turn) -> usize {
        turn.order = self.turns.len();
        self.last_turn_at = Some(turn.created_at);
        self.turns.push(turn);
        self.turns.len() - 1
    }

    /// Discard the transcript and rate-limit state under a new identifier
    pub fn reset(&mut self) -> SessionId {
        self.id = SessionId::generate();
        self.turns.clear();
        self.last_turn_at = None;
        self.throttle.reset();
        self.id
    }
}
