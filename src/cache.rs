use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

use crate::store::BlobItemInfo;

struct Timed<T> {
    value: T,
    inserted: Instant,
}

impl<T> Timed<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            inserted: Instant::now(),
        }
    }

    fn is_dead(&self, ttl: Duration, now: Instant) -> bool {
        now.duration_since(self.inserted) > ttl
    }
}

pub struct MetadataCache {
    ttl: Duration,
    items: RwLock<HashMap<String, Timed<BlobItemInfo>>>,
    listings: RwLock<HashMap<String, Timed<Arc<Vec<BlobItemInfo>>>>>,
}

impl MetadataCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            items: RwLock::new(HashMap::new()),
            listings: RwLock::new(HashMap::new()),
        }
    }

    pub fn get_item(&self, key: &str) -> Option<BlobItemInfo> {
        let now = Instant::now();
        {
            let guard = self.items.read();
            match guard.get(key) {
                Some(entry) if !entry.is_dead(self.ttl, now) => {
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Dead on the read probe; recheck under the write lock and drop it.
        let mut guard = self.items.write();
        if let Some(entry) = guard.get(key)
            && !entry.is_dead(self.ttl, now)
        {
            return Some(entry.value.clone());
        }
        guard.remove(key);
        None
    }

    pub fn set_item(&self, key: impl Into<String>, info: BlobItemInfo) {
        self.items.write().insert(key.into(), Timed::new(info));
    }

    pub fn invalidate_item(&self, key: &str) {
        self.items.write().remove(key);
    }

    pub fn get_listing(&self, prefix: &str) -> Option<Arc<Vec<BlobItemInfo>>> {
        let now = Instant::now();
        {
            let guard = self.listings.read();
            match guard.get(prefix) {
                Some(entry) if !entry.is_dead(self.ttl, now) => {
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        let mut guard = self.listings.write();
        if let Some(entry) = guard.get(prefix)
            && !entry.is_dead(self.ttl, now)
        {
            return Some(entry.value.clone());
        }
        guard.remove(prefix);
        None
    }

    pub fn set_listing(
        &self,
        prefix: impl Into<String>,
        items: Vec<BlobItemInfo>,
    ) -> Arc<Vec<BlobItemInfo>> {
        let items = Arc::new(items);
        self.listings
            .write()
            .insert(prefix.into(), Timed::new(items.clone()));
        items
    }

    // Listings are dropped in both directions: listings inside the prefix
    // went away with it, and ancestor listings contained the entries that
    // just changed.
    pub fn invalidate_prefix(&self, prefix: &str) {
        debug!("invalidating cached metadata under {:?}", prefix);
        self.listings
            .write()
            .retain(|key, _| !key.starts_with(prefix) && !prefix.starts_with(key.as_str()));
        self.items.write().retain(|key, _| !key.starts_with(prefix));
    }

    pub fn clear(&self) {
        let items = {
            let mut guard = self.items.write();
            let count = guard.len();
            guard.clear();
            count
        };
        let listings = {
            let mut guard = self.listings.write();
            let count = guard.len();
            guard.clear();
            count
        };
        debug!("metadata cache cleared: {} items, {} listings", items, listings);
    }
}
