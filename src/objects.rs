//! Session-local object-id aliasing: every persisted object has a uuid;
//! the session hands out 64-bit opaque ids bound to uuids for its own
//! lifetime only. A reverse map enforces that no two uuids ever share an
//! id. Ids never leak across sessions — each session owns its own
//! registry.

use hashbrown::HashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct ObjectIdRegistry {
    next_id: u64,
    by_id: HashMap<u64, Uuid>,
    by_uuid: HashMap<Uuid, u64>,
}

impl ObjectIdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing alias for `uuid` if one was already handed
    /// out this session, otherwise mints a fresh one.
    pub fn alias(&mut self, uuid: Uuid) -> u64 {
        if let Some(existing) = self.by_uuid.get(&uuid) {
            return *existing;
        }
        self.next_id += 1;
        let id = self.next_id;
        self.by_id.insert(id, uuid);
        self.by_uuid.insert(uuid, id);
        id
    }

    pub fn uuid_for(&self, id: u64) -> Option<Uuid> {
        self.by_id.get(&id).copied()
    }

    pub fn id_for(&self, uuid: Uuid) -> Option<u64> {
        self.by_uuid.get(&uuid).copied()
    }

    pub fn release(&mut self, id: u64) {
        if let Some(uuid) = self.by_id.remove(&id) {
            self.by_uuid.remove(&uuid);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn aliasing_the_same_uuid_twice_returns_the_same_id() {
        let mut registry = ObjectIdRegistry::new();
        let uuid = Uuid::new_v4();
        let first = registry.alias(uuid);
        let second = registry.alias(uuid);
        assert_eq!(first, second);
    }

    #[test]
    fn distinct_uuids_never_collide_on_id() {
        let mut registry = ObjectIdRegistry::new();
        let a = registry.alias(Uuid::new_v4());
        let b = registry.alias(Uuid::new_v4());
        assert_ne!(a, b);
    }

    #[test]
    fn release_drops_both_directions_of_the_mapping() {
        let mut registry = ObjectIdRegistry::new();
        let uuid = Uuid::new_v4();
        let id = registry.alias(uuid);
        registry.release(id);
        assert!(registry.uuid_for(id).is_none());
        assert!(registry.id_for(uuid).is_none());
    }
}
