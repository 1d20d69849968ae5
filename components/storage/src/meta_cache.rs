// Copyright 2024 stratus
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{future::Future, sync::Arc};

use stratus_types::{BlocksExt, ChunkMeta};
use tokio::sync::{Mutex, RwLock};

use crate::err::Result;

/// A decoded chunk meta together with its block extent table.
#[derive(Debug, Clone)]
pub struct CachedChunkMeta {
    pub meta: Arc<ChunkMeta>,
    pub blocks_ext: Arc<BlocksExt>,
}

/// ChunkMetaCache holds the meta of one chunk, fetched lazily on first use.
///
/// The chunk is immutable, so the cached value is never invalidated.
#[derive(Debug, Default)]
pub struct ChunkMetaCache {
    cached: RwLock<Option<CachedChunkMeta>>,
    // serializes fetches, so that concurrent misses fetch only once.
    fetch_guard: Mutex<()>,
}

impl ChunkMetaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<CachedChunkMeta> {
        self.cached.read().await.clone()
    }

    /// Return the cached meta, or run `fetch` to populate the cache.
    ///
    /// A failed fetch is not cached; the next caller fetches again.
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<CachedChunkMeta>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedChunkMeta>>,
    {
        if let Some(cached) = self.get().await {
            return Ok(cached);
        }

        let _guard = self.fetch_guard.lock().await;
        // somebody may have populated it while we were waiting.
        if let Some(cached) = self.get().await {
            return Ok(cached);
        }

        let fetched = fetch().await?;
        let mut cached = self.cached.write().await;
        // first writer wins, later results are dropped.
        Ok(cached.get_or_insert(fetched).clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn meta(chunk_type: i32) -> CachedChunkMeta {
        CachedChunkMeta {
            meta: Arc::new(ChunkMeta {
                chunk_type,
                ..Default::default()
            }),
            blocks_ext: Arc::new(BlocksExt::default()),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn fetch_once() {
        let cache = Arc::new(ChunkMetaCache::new());
        let fetches = Arc::new(AtomicUsize::new(0));
        assert!(cache.get().await.is_none());

        let handles = (0..16)
            .map(|_| {
                let cache = cache.clone();
                let fetches = fetches.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_fetch(|| async move {
                            fetches.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                            Ok(meta(7))
                        })
                        .await
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            let cached = handle.await.unwrap().unwrap();
            assert_eq!(cached.meta.chunk_type, 7);
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert!(cache.get().await.is_some());
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let cache = ChunkMetaCache::new();
        let err = cache
            .get_or_fetch(|| async {
                crate::err::MissingBlocksExtSnafu { file: "test" }.fail()
            })
            .await;
        assert!(err.is_err());
        assert!(cache.get().await.is_none());

        let cached = cache.get_or_fetch(|| async { Ok(meta(1)) }).await.unwrap();
        assert_eq!(cached.meta.chunk_type, 1);

        // cached values win over new fetches.
        let cached = cache.get_or_fetch(|| async { Ok(meta(2)) }).await.unwrap();
        assert_eq!(cached.meta.chunk_type, 1);
    }
}
