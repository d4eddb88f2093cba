/// Directive sent with every request. Editable in the UI before submitting.
pub const DEFAULT_INSTRUCTION: &str = "Provide direct and objective answers.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            text: text.into(),
        }
    }
}

/// Append-only transcript of the current session. Turns keep their
/// insertion order and are never edited or removed once added.
#[derive(Debug, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Owned copy of every turn so far. A request built from a snapshot
    /// is unaffected by turns appended while it is in flight.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Everything the presentation loop carries between turns: the transcript
/// plus the instruction the user may edit at any point.
#[derive(Debug)]
pub struct Session {
    pub conversation: Conversation,
    pub instruction: String,
}

impl Session {
    pub fn new() -> Self {
        Self {
            conversation: Conversation::new(),
            instruction: DEFAULT_INSTRUCTION.to_string(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
