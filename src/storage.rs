use std::collections::HashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::models::{Generation, GenerationRequest};

/// Process-memory generation store for the mock backend.
#[derive(Default)]
pub struct MemStorage {
    generations: RwLock<HashMap<Uuid, Generation>>,
}

impl MemStorage {
    pub fn create_generation(&self, request: &GenerationRequest) -> Generation {
        let generation = Generation::from_request(request);
        self.generations.write().insert(generation.id, generation.clone());
        generation
    }

    /// Newest first.
    pub fn list(&self, limit: usize) -> Vec<Generation> {
        let mut all: Vec<Generation> = self.generations.read().values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        all
    }

    pub fn get(&self, id: &Uuid) -> Option<Generation> {
        self.generations.read().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Style;
    use chrono::Duration;

    #[test]
    fn lists_newest_first_with_limit() {
        let store = MemStorage::default();
        let request = GenerationRequest::new("data:x", "p", Style::Vintage);
        let mut ids = Vec::new();
        for i in 0..4 {
            let g = store.create_generation(&request);
            // Force distinct, ordered timestamps.
            store.generations.write().get_mut(&g.id).unwrap().created_at = g.created_at + Duration::seconds(i);
            ids.push(g.id);
        }
        let listed: Vec<Uuid> = store.list(3).into_iter().map(|g| g.id).collect();
        assert_eq!(listed, vec![ids[3], ids[2], ids[1]]);
        assert!(store.get(&ids[0]).is_some());
        assert!(store.get(&Uuid::new_v4()).is_none());
    }
}
