use std::collections::VecDeque;
use std::time::Instant;

use serde::Serialize;

use crate::result::{ErrorKind, ImageData};

/// Default bound on conversation length.
pub const DEFAULT_MAX_TURNS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    role: Role,
    text: String,
    image: Option<ImageData>,
    error: Option<ErrorKind>,
    sequence: u64,
    recorded_at: Instant,
}

impl ConversationTurn {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn image(&self) -> Option<&ImageData> {
        self.image.as_ref()
    }

    /// Set on assistant turns that report a failed generation.
    pub fn error(&self) -> Option<ErrorKind> {
        self.error
    }

    /// Monotonic position across the whole session, including cleared turns.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn recorded_at(&self) -> Instant {
        self.recorded_at
    }
}

/// Bounded, append-only record of one session's conversation.
///
/// Turns are never edited after they are pushed. When the bound is exceeded the
/// oldest turns are dropped; `clear` empties the ledger wholesale.
#[derive(Debug, Clone)]
pub struct ConversationLedger {
    max_turns: usize,
    turns: VecDeque<ConversationTurn>,
    next_sequence: u64,
}

impl Default for ConversationLedger {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

impl ConversationLedger {
    pub fn new(max_turns: usize) -> Self {
        let max_turns = max_turns.max(1);
        Self {
            max_turns,
            turns: VecDeque::with_capacity(max_turns),
            next_sequence: 0,
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn push_user(&mut self, text: impl Into<String>, image: Option<ImageData>) -> u64 {
        self.append(Role::User, text.into(), image, None)
    }

    pub fn push_assistant(
        &mut self,
        text: impl Into<String>,
        image: Option<ImageData>,
        error: Option<ErrorKind>,
    ) -> u64 {
        self.append(Role::Assistant, text.into(), image, error)
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.back()
    }

    /// Newest image produced by the assistant, if any is still held.
    pub fn latest_image(&self) -> Option<&ImageData> {
        self.turns
            .iter()
            .rev()
            .filter(|turn| turn.role == Role::Assistant)
            .find_map(ConversationTurn::image)
    }

    fn append(
        &mut self,
        role: Role,
        text: String,
        image: Option<ImageData>,
        error: Option<ErrorKind>,
    ) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.turns.push_back(ConversationTurn {
            role,
            text,
            image,
            error,
            sequence,
            recorded_at: Instant::now(),
        });
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
        sequence
    }
}
