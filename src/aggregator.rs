//! The news aggregator: concurrent fan-out over every feed source, merge,
//! rank by publish date and a single cached snapshot of the result.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Duration;
use futures::future::join_all;
use tracing::{info, warn};

use crate::cache::{CacheEntry, NewsCache};
use crate::clock::Clock;
use crate::db::Storage;
use crate::fetcher::FeedClient;
use crate::news::{FeedSource, NewsItem};
use crate::presenter::NewsPresenter;

pub const DEFAULT_TTL_MINUTES: i64 = 60;
pub const DEFAULT_MAX_ITEMS: usize = 10;

pub struct NewsAggregator {
    sources: Vec<FeedSource>,
    client: Arc<dyn FeedClient>,
    cache: NewsCache,
    clock: Arc<dyn Clock>,
    presenter: Arc<dyn NewsPresenter>,
    max_items: usize,
    refreshing: Arc<AtomicUsize>,
}

/// Keeps the in-flight refresh count accurate even if a refresh is dropped.
struct RefreshGuard(Arc<AtomicUsize>);

impl RefreshGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl NewsAggregator {
    pub fn new(
        sources: Vec<FeedSource>,
        client: Arc<dyn FeedClient>,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
        presenter: Arc<dyn NewsPresenter>,
    ) -> Self {
        Self {
            sources,
            client,
            cache: NewsCache::new(storage, Duration::minutes(DEFAULT_TTL_MINUTES)),
            clock,
            presenter,
            max_items: DEFAULT_MAX_ITEMS,
            refreshing: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache = self.cache.with_ttl(ttl);
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst) > 0
    }

    /// Shows the cached news when fresh, otherwise fetches it.
    ///
    /// Returns the items handed to the presenter; empty when the presenter
    /// was told there is nothing to show.
    pub async fn load_news(&self) -> Vec<NewsItem> {
        self.presenter.show_loading();

        if let Some(entry) = self.cache.load(self.clock.now()).await {
            if entry.items.is_empty() {
                self.presenter.show_empty();
            } else {
                self.presenter.show_items(&entry.items);
            }
            return entry.items;
        }

        self.fetch_and_merge().await
    }

    /// Drops the cached snapshot and fetches every source again.
    pub async fn refresh_news(&self) -> Vec<NewsItem> {
        let _guard = RefreshGuard::enter(&self.refreshing);

        self.presenter.show_loading();
        self.cache.clear().await;
        self.fetch_and_merge().await
    }

    async fn fetch_and_merge(&self) -> Vec<NewsItem> {
        let requests = self
            .sources
            .iter()
            .map(|source| self.fetch_from_source(source));
        let results = join_all(requests).await;

        let mut all_news: Vec<NewsItem> = results.into_iter().flatten().collect();

        if all_news.is_empty() {
            warn!("No news sources available");
            self.presenter.show_empty();
            return Vec::new();
        }

        rank(&mut all_news, self.max_items);

        let entry = CacheEntry {
            items: all_news,
            cached_at: self.clock.now(),
        };
        self.cache.store(&entry).await;

        info!("Showing {} news items", entry.items.len());
        self.presenter.show_items(&entry.items);
        entry.items
    }

    async fn fetch_from_source(&self, source: &FeedSource) -> Vec<NewsItem> {
        match self.client.fetch_items(source).await {
            Ok(raw_items) => {
                let total = raw_items.len();
                let items: Vec<NewsItem> = raw_items
                    .into_iter()
                    .filter_map(|raw| NewsItem::from_raw(raw, source))
                    .collect();
                if items.len() < total {
                    warn!(
                        "Skipped {} items without a link from '{}'",
                        total - items.len(),
                        source.name
                    );
                }
                items
            }
            Err(e) => {
                warn!("Failed to fetch from '{}': {}", source.name, e);
                Vec::new()
            }
        }
    }
}

/// Sorts newest first, undated items last, keeping input order on ties,
/// then keeps the first `limit` items.
pub fn rank(items: &mut Vec<NewsItem>, limit: usize) {
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    items.truncate(limit);
}
