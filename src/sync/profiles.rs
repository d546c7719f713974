use crate::models::Profile;
use std::collections::HashMap;

/// Profile lookups memoized for the lifetime of one engine. Entries are
/// dropped explicitly when the owning user of the asset changes.
#[derive(Debug, Default)]
pub struct ProfileCache {
    entries: HashMap<String, Profile>,
}

impl ProfileCache {
    pub fn get(&self, user_id: &str) -> Option<&Profile> {
        self.entries.get(user_id)
    }

    pub fn insert(&mut self, profile: Profile) {
        self.entries.insert(profile.id.clone(), profile);
    }

    pub fn invalidate(&mut self, user_id: &str) -> bool {
        self.entries.remove(user_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
