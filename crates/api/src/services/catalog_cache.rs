//! In-memory cache for unsearched product listings.
//!
//! Pages are cached for 15 minutes keyed by page number and size. Any
//! product or category write invalidates the whole cache.
//!
//! Writes also bump a generation counter. Readers take a [`CacheTicket`]
//! before querying the database, and a page computed under an older
//! generation is never served, so a slow read cannot re-cache data that a
//! concurrent write has already replaced.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use crate::models::catalog::ProductSummary;

const TTL: Duration = Duration::from_secs(15 * 60);
const MAX_ENTRIES: u64 = 1000;

/// A cached page of product summaries with the total product count.
#[derive(Debug, Clone)]
pub struct CachedProductPage {
    pub items: Arc<Vec<ProductSummary>>,
    pub count: i64,
}

/// Generation observed by a reader before it queried the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTicket(u64);

#[derive(Debug, Clone)]
struct Entry {
    generation: u64,
    page: CachedProductPage,
}

/// Cache of product listing pages.
#[derive(Clone)]
pub struct ProductListCache {
    cache: Cache<(u32, u32), Entry>,
    generation: Arc<AtomicU64>,
}

impl ProductListCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(TTL)
                .build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record the current generation. Take this before reading the database.
    #[must_use]
    pub fn ticket(&self) -> CacheTicket {
        CacheTicket(self.generation.load(Ordering::Acquire))
    }

    /// Look up a page, ignoring entries from before the last write.
    pub async fn get(&self, page: u32, page_size: u32) -> Option<CachedProductPage> {
        let entry = self.cache.get(&(page, page_size)).await?;
        if entry.generation != self.generation.load(Ordering::Acquire) {
            return None;
        }
        debug!(page, page_size, "Cache hit for products");
        Some(entry.page)
    }

    /// Store a page read under `ticket`. Dropped if a write happened since.
    pub async fn insert(
        &self,
        ticket: CacheTicket,
        page: u32,
        page_size: u32,
        value: CachedProductPage,
    ) {
        if ticket != self.ticket() {
            debug!(page, page_size, "Skipping cache insert after concurrent write");
            return;
        }
        let entry = Entry {
            generation: ticket.0,
            page: value,
        };
        self.cache.insert((page, page_size), entry).await;
    }

    /// Drop every cached page.
    pub async fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

impl Default for ProductListCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartwheel_core::ProductId;
    use rust_decimal::Decimal;

    fn page(count: i64) -> CachedProductPage {
        CachedProductPage {
            items: Arc::new(vec![ProductSummary {
                id: ProductId::new(1),
                name: "Mug".to_string(),
                slug: "mug".to_string(),
                category: "Kitchen".to_string(),
                price: Decimal::new(900, 2),
                image: None,
            }]),
            count,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = ProductListCache::new();
        assert!(cache.get(1, 10).await.is_none());

        cache.insert(cache.ticket(), 1, 10, page(1)).await;

        let hit = cache.get(1, 10).await;
        assert_eq!(hit.map(|p| p.count), Some(1));
        assert!(cache.get(1, 20).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let cache = ProductListCache::new();
        let ticket = cache.ticket();
        cache.insert(ticket, 1, 10, page(1)).await;
        cache.insert(ticket, 2, 10, page(1)).await;

        cache.invalidate_all().await;

        assert!(cache.get(1, 10).await.is_none());
        assert!(cache.get(2, 10).await.is_none());
    }

    #[tokio::test]
    async fn test_read_started_before_write_is_not_cached() {
        let cache = ProductListCache::new();
        let ticket = cache.ticket();

        // A write lands while the read is still querying
        cache.invalidate_all().await;
        cache.insert(ticket, 1, 10, page(5)).await;

        assert!(cache.get(1, 10).await.is_none());

        cache.insert(cache.ticket(), 1, 10, page(6)).await;
        assert_eq!(cache.get(1, 10).await.map(|p| p.count), Some(6));
    }
}
