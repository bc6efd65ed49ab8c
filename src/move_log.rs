use serde::{Deserialize, Serialize};

use crate::logic::{MoveDescriptor, Side};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub side: Side,
    pub notation: String,
}

/// Append-only record of every move in emission order.
#[derive(Clone, Debug, Default)]
pub struct MoveLog {
    entries: Vec<LogEntry>,
}

impl MoveLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, side: Side, descriptor: &MoveDescriptor) -> &LogEntry {
        self.entries.push(LogEntry {
            side,
            notation: descriptor.notation(),
        });
        // Just pushed.
        &self.entries[self.entries.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}
