use serde::{Deserialize, Serialize};

/// Maximum number of entries the orchestrator keeps in an
/// `ExplorationContext` before it starts dropping the oldest non-initial
/// entries (§3, §5: `max_context_messages` = 50).
pub const MAX_CONTEXT_MESSAGES: usize = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScratchMessage {
    pub role: Role,
    pub content: String,
}

/// The orchestrator's hidden message sequence (§3, §6: "scratch context").
/// Bounded at `MAX_CONTEXT_MESSAGES` by always keeping the first entry (the
/// initial user query) and otherwise dropping from the front of the
/// remainder once the bound is exceeded, so the model retains its original
/// objective even in a long exploration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExplorationContext {
    messages: Vec<ScratchMessage>,
}

impl ExplorationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(ScratchMessage {
            role,
            content: content.into(),
        });
        self.enforce_bound();
    }

    pub fn messages(&self) -> &[ScratchMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn reset(&mut self) {
        self.messages.clear();
    }

    fn enforce_bound(&mut self) {
        if self.messages.len() <= MAX_CONTEXT_MESSAGES {
            return;
        }
        // Keep index 0 (the initial user query) plus the most recent
        // MAX_CONTEXT_MESSAGES - 1 entries.
        let overflow = self.messages.len() - MAX_CONTEXT_MESSAGES;
        self.messages.drain(1..1 + overflow);
    }
}
