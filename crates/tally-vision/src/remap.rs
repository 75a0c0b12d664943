use std::collections::HashMap;

/// Maps detector track ids onto dense display ids in first-seen order.
#[derive(Debug, Clone)]
pub struct IdRemapper {
    ids: HashMap<i64, u64>,
    next_id: u64,
}

impl Default for IdRemapper {
    fn default() -> Self {
        Self::new()
    }
}

impl IdRemapper {
    pub fn new() -> Self {
        Self { ids: HashMap::new(), next_id: 1 }
    }

    pub fn remap(&mut self, raw_id: i64) -> u64 {
        if let Some(&id) = self.ids.get(&raw_id) {
            return id;
        }
        let id = self.next_id;
        self.ids.insert(raw_id, id);
        self.next_id += 1;
        id
    }

    pub fn lookup(&self, raw_id: i64) -> Option<u64> {
        self.ids.get(&raw_id).copied()
    }

    /// Forgets raw ids bound to the given display ids. Display ids are never handed out again.
    pub fn retire(&mut self, display_ids: &[u64]) {
        if display_ids.is_empty() {
            return;
        }
        self.ids.retain(|_, id| !display_ids.contains(id));
    }

    /// Number of display ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next_id - 1
    }

    /// Raw ids currently bound to a display id.
    pub fn mapped(&self) -> usize {
        self.ids.len()
    }
}
