use serde::{Deserialize, Serialize};

/// One statement made during the day discussion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscussionEntry {
    pub player_id: u32,
    pub player_name: String,
    pub content: String,
}

impl DiscussionEntry {
    pub fn new(player_id: u32, player_name: String, content: String) -> Self {
        DiscussionEntry {
            player_id,
            player_name,
            content,
        }
    }
}

/// Private, append-only event feed of a single player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryFeed {
    entries: Vec<String>,
}

impl HistoryFeed {
    pub fn new() -> Self {
        HistoryFeed::default()
    }

    pub fn push(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
    }

    /// The last `window` entries, oldest first.
    pub fn recent(&self, window: usize) -> &[String] {
        let start = self.entries.len().saturating_sub(window);
        &self.entries[start..]
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
