use std::collections::HashMap;

use crossbeam::sync::ShardedLock;

use crate::models::{FlagKind, FlagRecord, FlagValue};

/// In-memory flag cache, only ever replaced as a whole.
pub struct FlagStore {
    flags: ShardedLock<HashMap<String, FlagValue>>,
}

impl FlagStore {
    pub fn new() -> Self {
        Self {
            flags: ShardedLock::new(HashMap::new()),
        }
    }

    /// Replaces the cache with `records`. Later duplicates of a key win.
    pub fn refresh(&self, records: Vec<FlagRecord>) -> usize {
        let flags: HashMap<String, FlagValue> =
            records.into_iter().map(|f| (f.key, f.value)).collect();
        let count = flags.len();
        let mut current = self.flags.write().unwrap_or_else(|e| e.into_inner());
        *current = flags;
        count
    }

    pub fn get(&self, key: &str) -> Option<FlagValue> {
        self.flags
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub fn get_kind(&self, key: &str, kind: FlagKind) -> Option<FlagValue> {
        self.get(key).filter(|v| v.kind() == kind)
    }

    pub fn snapshot(&self) -> HashMap<String, FlagValue> {
        self.flags.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
