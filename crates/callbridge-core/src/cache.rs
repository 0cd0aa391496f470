use std::collections::HashMap;

use callbridge_pvp::PvpUserId;

/// Contact-resolution cache. Private to the dispatcher thread: cache lookups
/// and writes happen exclusively inside the `DialTg` action, so no locking is
/// required (§3, §4.2).
#[derive(Debug, Default)]
pub struct Cache {
    username_cache: HashMap<String, PvpUserId>,
    phone_cache: HashMap<String, PvpUserId>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn username_get(&self, username: &str) -> Option<PvpUserId> {
        self.username_cache.get(username).copied()
    }

    pub fn username_insert(&mut self, username: String, id: PvpUserId) {
        self.username_cache.insert(username, id);
    }

    pub fn phone_get(&self, phone: &str) -> Option<PvpUserId> {
        self.phone_cache.get(phone).copied()
    }

    pub fn phone_insert(&mut self, phone: String, id: PvpUserId) {
        self.phone_cache.insert(phone, id);
    }

    /// Populates both mappings from a fan-out of `getUser` results over the
    /// startup `searchContacts` response. A user lacking `have_access` is
    /// skipped and the fan-out continues with the rest — the original source
    /// aborted the whole load here, which the spec calls out as a bug to fix
    /// with `continue`, not `break`/`return`.
    pub fn load_from_users(&mut self, users: impl IntoIterator<Item = callbridge_pvp::PvpUser>) {
        for user in users {
            if !user.have_access {
                continue;
            }
            if !user.username.is_empty() {
                self.username_cache.insert(user.username.clone(), user.id);
            }
            if !user.phone.is_empty() {
                self.phone_cache.insert(user.phone.clone(), user.id);
            }
        }
    }
}
