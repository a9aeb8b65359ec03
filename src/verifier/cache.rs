// dkim-domain-proof – domain ownership proofs from DKIM-signed email
// Copyright © 2022–2023 David Bürgin <dbuergin@gluet.ch>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.

use crate::crypto::{KeyType, VerifyingKey};
use parking_lot::Mutex;
use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
    time::{Duration, Instant},
};

type CacheKey = (Box<str>, KeyType);

#[derive(Clone)]
struct CachedKey {
    key: Arc<VerifyingKey>,
    // none if the TTL reaches beyond what `Instant` can represent
    valid_until: Option<Instant>,
}

/// A bounded cache of public keys obtained from DNS, keyed by query name and
/// key type.
///
/// Entries expire after a fixed time to live; the least recently used entry is
/// evicted when capacity is exceeded. A cache can be shared among verifiers and
/// concurrent verifications through an `Arc`.
pub struct KeyCache {
    entries: Mutex<lru_cache::LruCache<CacheKey, CachedKey, ahash::RandomState>>,
    ttl: Duration,
}

impl KeyCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(lru_cache::LruCache::with_hasher(
                capacity,
                ahash::RandomState::new(),
            )),
            ttl,
        }
    }

    pub fn get(&self, name: &str, key_type: KeyType) -> Option<Arc<VerifyingKey>> {
        let cache_key: CacheKey = (name.into(), key_type);

        let mut entries = self.entries.lock();
        let entry = entries.get_mut(&cache_key)?;
        if entry.valid_until.map_or(true, |t| t > Instant::now()) {
            Some(entry.key.clone())
        } else {
            entries.remove(&cache_key);
            None
        }
    }

    pub fn insert(&self, name: &str, key_type: KeyType, key: Arc<VerifyingKey>) {
        let valid_until = Instant::now().checked_add(self.ttl);

        self.entries
            .lock()
            .insert((name.into(), key_type), CachedKey { key, valid_until });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Debug for KeyCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCache")
            .field("len", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}
