//! crates/skill_tutor_core/src/cache.rs
//!
//! Memoizes one generated learning module per topic in session storage.
//! Caching is best-effort: storage failures are logged and treated as misses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{info, warn};

use crate::domain::{LearningModule, EXPECTED_SUB_PAGES};
use crate::error::StudioError;
use crate::ports::{ModuleGenerationService, SessionStore};

const CACHE_KEY_PREFIX: &str = "skill-content-";

/// The session storage key for a topic.
pub fn cache_key(topic: &str) -> String {
    format!("{}{}", CACHE_KEY_PREFIX, topic)
}

type InFlight = Shared<BoxFuture<'static, Result<LearningModule, StudioError>>>;

pub struct ContentCache {
    store: Arc<dyn SessionStore>,
    generator: Arc<dyn ModuleGenerationService>,
    in_flight: Mutex<HashMap<String, InFlight>>,
}

impl ContentCache {
    pub fn new(store: Arc<dyn SessionStore>, generator: Arc<dyn ModuleGenerationService>) -> Self {
        Self {
            store,
            generator,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Looks up a cached module. Never fails; an unreadable entry is a miss.
    pub async fn get(&self, topic: &str) -> Option<LearningModule> {
        read_cached(self.store.as_ref(), topic).await
    }

    /// Returns the cached module for `topic`, generating and caching it on a miss.
    ///
    /// Concurrent callers for the same topic wait on a single generation call.
    /// Failures and empty modules are returned as errors and never cached.
    pub async fn fetch_or_generate(&self, topic: &str) -> Result<LearningModule, StudioError> {
        if let Some(module) = self.get(topic).await {
            info!(topic, "Loading content from cache.");
            return Ok(module);
        }

        let pending = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match in_flight.get(topic) {
                Some(existing) => {
                    info!(topic, "Joining in-flight generation.");
                    existing.clone()
                }
                None => {
                    let pending = generate_and_store(
                        self.store.clone(),
                        self.generator.clone(),
                        topic.to_string(),
                    )
                    .boxed()
                    .shared();
                    in_flight.insert(topic.to_string(), pending.clone());
                    pending
                }
            }
        };

        let result = pending.await;

        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.get(topic).is_some_and(|entry| entry.peek().is_some()) {
            in_flight.remove(topic);
        }
        result
    }
}

async fn read_cached(store: &dyn SessionStore, topic: &str) -> Option<LearningModule> {
    let key = cache_key(topic);
    match store.get_item(&key).await {
        Ok(Some(json)) => match serde_json::from_str(&json) {
            Ok(module) => Some(module),
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring undecodable cache entry.");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(key = %key, error = %e, "Could not access session storage for caching.");
            None
        }
    }
}

async fn generate_and_store(
    store: Arc<dyn SessionStore>,
    generator: Arc<dyn ModuleGenerationService>,
    topic: String,
) -> Result<LearningModule, StudioError> {
    // A generation that settled between our miss and joining may already be stored.
    if let Some(module) = read_cached(store.as_ref(), &topic).await {
        return Ok(module);
    }

    info!(topic = %topic, "Generating new content from API.");
    let module = generator
        .generate_module(&topic)
        .await
        .map_err(|e| match StudioError::from_port(e.clone()) {
            StudioError::InvalidCredential(msg) => StudioError::InvalidCredential(msg),
            _ => StudioError::ContentGeneration(e.to_string()),
        })?;

    if module.is_empty() {
        warn!(topic = %topic, "Generated module has no sub-pages.");
        return Err(StudioError::ContentGeneration(
            "generated module contains no sub-pages".to_string(),
        ));
    }
    if module.sub_pages.len() != EXPECTED_SUB_PAGES {
        warn!(
            topic = %topic,
            pages = module.sub_pages.len(),
            expected = EXPECTED_SUB_PAGES,
            "Generated module has an unexpected page count."
        );
    }

    let key = cache_key(&topic);
    match serde_json::to_string(&module) {
        Ok(json) => {
            if let Err(e) = store.set_item(&key, &json).await {
                warn!(key = %key, error = %e, "Could not save content to session storage.");
            }
        }
        Err(e) => warn!(key = %key, error = %e, "Could not serialize module for caching."),
    }

    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContentBlock, SubPage};
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct MapStore {
        items: Mutex<HashMap<String, String>>,
        fail_reads: bool,
        fail_writes: bool,
    }

    #[async_trait]
    impl SessionStore for MapStore {
        async fn get_item(&self, key: &str) -> PortResult<Option<String>> {
            if self.fail_reads {
                return Err(PortError::Storage("storage disabled".into()));
            }
            Ok(self.items.lock().unwrap().get(key).cloned())
        }

        async fn set_item(&self, key: &str, value: &str) -> PortResult<()> {
            if self.fail_writes {
                return Err(PortError::Storage("QuotaExceededError".into()));
            }
            self.items.lock().unwrap().insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    struct CountingGenerator {
        calls: AtomicUsize,
        pages: usize,
        delay: Duration,
        failure: Option<PortError>,
    }

    impl CountingGenerator {
        fn with_pages(pages: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                pages,
                delay: Duration::ZERO,
                failure: None,
            })
        }
    }

    #[async_trait]
    impl ModuleGenerationService for CountingGenerator {
        async fn generate_module(&self, skill_name: &str) -> PortResult<LearningModule> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if let Some(err) = &self.failure {
                return Err(err.clone());
            }
            Ok(module(skill_name, self.pages))
        }
    }

    fn module(skill: &str, pages: usize) -> LearningModule {
        LearningModule {
            skill_name: skill.to_string(),
            sub_pages: (0..pages)
                .map(|i| SubPage {
                    title: format!("Page {}", i + 1),
                    image_suggestion: "sketch".into(),
                    motion_storyboard: "fade in".into(),
                    content: vec![
                        ContentBlock::Heading { text: format!("H{}", i) },
                        ContentBlock::Paragraph { text: "body".into() },
                    ],
                })
                .collect(),
        }
    }

    #[test]
    fn keys_are_prefixed_topic_names() {
        assert_eq!(cache_key("Graphic Design"), "skill-content-Graphic Design");
    }

    #[tokio::test]
    async fn second_fetch_is_served_from_cache() {
        let store = Arc::new(MapStore::default());
        let generator = CountingGenerator::with_pages(10);
        let cache = ContentCache::new(store.clone(), generator.clone());

        let first = cache.fetch_or_generate("Programming").await.unwrap();
        let second = cache.fetch_or_generate("Programming").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert!(store.items.lock().unwrap().contains_key("skill-content-Programming"));
    }

    #[tokio::test]
    async fn failed_generation_is_not_cached() {
        let store = Arc::new(MapStore::default());
        let generator = Arc::new(CountingGenerator {
            calls: AtomicUsize::new(0),
            pages: 10,
            delay: Duration::ZERO,
            failure: Some(PortError::Upstream("API returned no text.".into())),
        });
        let cache = ContentCache::new(store.clone(), generator);

        let err = cache.fetch_or_generate("Video Editing").await.unwrap_err();

        assert!(matches!(err, StudioError::ContentGeneration(_)));
        assert!(store.items.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn credential_errors_keep_their_classification() {
        let generator = Arc::new(CountingGenerator {
            calls: AtomicUsize::new(0),
            pages: 10,
            delay: Duration::ZERO,
            failure: Some(PortError::Upstream("Requested entity was not found.".into())),
        });
        let cache = ContentCache::new(Arc::new(MapStore::default()), generator);

        let err = cache.fetch_or_generate("Programming").await.unwrap_err();
        assert!(matches!(err, StudioError::InvalidCredential(_)));
    }

    #[tokio::test]
    async fn storage_failures_degrade_to_generation() {
        let store = Arc::new(MapStore {
            fail_reads: true,
            fail_writes: true,
            ..Default::default()
        });
        let generator = CountingGenerator::with_pages(10);
        let cache = ContentCache::new(store, generator.clone());

        assert!(cache.get("Content Writing").await.is_none());
        let module = cache.fetch_or_generate("Content Writing").await.unwrap();

        assert_eq!(module.sub_pages.len(), 10);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn corrupt_entries_are_treated_as_misses() {
        let store = Arc::new(MapStore::default());
        store
            .items
            .lock()
            .unwrap()
            .insert(cache_key("Programming"), "{not json".into());
        let generator = CountingGenerator::with_pages(10);
        let cache = ContentCache::new(store, generator.clone());

        cache.fetch_or_generate("Programming").await.unwrap();
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_generation() {
        let generator = Arc::new(CountingGenerator {
            calls: AtomicUsize::new(0),
            pages: 10,
            delay: Duration::from_secs(5),
            failure: None,
        });
        let cache = ContentCache::new(Arc::new(MapStore::default()), generator.clone());

        let (a, b, c) = tokio::join!(
            cache.fetch_or_generate("Digital Marketing"),
            cache.fetch_or_generate("Digital Marketing"),
            cache.fetch_or_generate("Digital Marketing"),
        );

        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(c.unwrap().skill_name, "Digital Marketing");
        assert!(cache.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn short_modules_are_accepted() {
        let generator = CountingGenerator::with_pages(7);
        let cache = ContentCache::new(Arc::new(MapStore::default()), generator);

        let module = cache.fetch_or_generate("Programming").await.unwrap();
        assert_eq!(module.sub_pages.len(), 7);
    }
}
