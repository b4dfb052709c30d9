//! `CacheBucket` — `pingora::cache::HttpCache::enable`'s arguments bundled
//! as one value, identical in shape to the teacher's `bucket::CacheBucket`,
//! retargeted at `cache::DiskCache` instead of `SccMemoryCache`. Storage,
//! eviction manager, and cache lock all need `'static` lifetime per
//! `pingora::cache::Storage`'s contract, which the teacher satisfies with
//! `Box::leak` — process-wide singletons torn down only at process exit.

use pingora::cache::eviction::EvictionManager;
use pingora::cache::lock::CacheLock;
use pingora::cache::predictor::CacheablePredictor;
use pingora::cache::HttpCache;
use pingora::cache::Storage;
use pingora::proxy::Session;

#[derive(Clone, Copy)]
pub struct CacheBucket {
    pub storage: &'static (dyn Storage + Sync),
    pub eviction: Option<&'static (dyn EvictionManager + Sync)>,
    pub predictor: Option<&'static (dyn CacheablePredictor + Sync)>,
    pub cache_lock: Option<&'static CacheLock>,
}

impl CacheBucket {
    pub fn new<T>(storage: T) -> Self
    where
        T: Storage + Sync + 'static,
    {
        CacheBucket {
            storage: Box::leak(Box::new(storage)),
            eviction: None,
            predictor: None,
            cache_lock: None,
        }
    }

    pub fn with_eviction<T: EvictionManager + Sync + 'static>(mut self, eviction: T) -> Self {
        self.eviction = Some(Box::leak(Box::new(eviction)));
        self
    }

    pub fn with_cache_lock(mut self, cache_lock: CacheLock) -> Self {
        self.cache_lock = Some(Box::leak(Box::new(cache_lock)));
        self
    }

    pub fn enable(&self, session: &mut Session) {
        session
            .cache
            .enable(self.storage, self.eviction, self.predictor, self.cache_lock)
    }
}
