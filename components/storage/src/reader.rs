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

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use snafu::{ensure, OptionExt, ResultExt};
use stratus_common::{BlockCount, BlockIndex};
use stratus_types::{Block, BlocksExt, ChunkId, ChunkMeta};
use tracing::{debug, instrument, warn};

use crate::{
    client::{ByteRange, GetObjectRequest, ObjectClientRef},
    config::S3ReaderConfig,
    err::{
        BlockRangeOutOfBoundsSnafu, CorruptedBlockSnafu, DataSizeMismatchSnafu,
        InvalidBlockRangeSnafu, InvalidBlockSpanSnafu, MissingBlocksExtSnafu, ParseMetaSnafu, Result,
    },
    format::decode_chunk_meta_blob,
    medium::{ObjectPlacement, S3Medium, S3MediumRef},
    meta_cache::{CachedChunkMeta, ChunkMetaCache},
};

pub type ChunkReaderRef = Arc<dyn ChunkReader>;

/// ChunkReader reads the blocks and the meta of one chunk.
#[async_trait]
pub trait ChunkReader: Send + Sync {
    /// Read the blocks at `block_indexes`, returned in the requested order.
    async fn read_blocks(&self, block_indexes: &[BlockIndex]) -> Result<Vec<Block>>;

    /// Read `block_count` consecutive blocks starting at `first_block_index`.
    async fn read_block_range(
        &self,
        first_block_index: BlockIndex,
        block_count: BlockCount,
    ) -> Result<Vec<Block>>;

    async fn get_meta(&self) -> Result<Arc<ChunkMeta>>;

    fn chunk_id(&self) -> ChunkId;

    /// The last time an operation of this reader failed, [UNIX_EPOCH] if
    /// none ever did.
    fn last_failure_time(&self) -> SystemTime;
}

/// A half open range of block indexes, `[start, end)`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct BlockRange {
    start: i64,
    end: i64,
}

/// S3Reader reads a chunk stored in an [S3Medium].
///
/// The chunk meta is fetched once, on first use, and kept for the lifetime
/// of the reader. Every block range is served by a single ranged GET of the
/// data object.
#[derive(Debug)]
pub struct S3Reader {
    client: ObjectClientRef,
    config: S3ReaderConfig,
    chunk_id: ChunkId,
    chunk_placement: ObjectPlacement,
    meta_placement: ObjectPlacement,
    meta_cache: ChunkMetaCache,
    // micros since the unix epoch, 0 until the first failure.
    last_failure_time: AtomicU64,
}

pub fn new_s3_reader(
    medium: S3MediumRef,
    config: S3ReaderConfig,
    chunk_id: ChunkId,
) -> ChunkReaderRef {
    Arc::new(S3Reader::new(medium, config, chunk_id))
}

impl S3Reader {
    pub fn new(medium: S3MediumRef, config: S3ReaderConfig, chunk_id: ChunkId) -> Self {
        let chunk_placement = medium.chunk_placement(chunk_id);
        let meta_placement = S3Medium::chunk_meta_placement(&chunk_placement);
        Self {
            client: medium.client(),
            config,
            chunk_id,
            chunk_placement,
            meta_placement,
            meta_cache: ChunkMetaCache::new(),
            last_failure_time: AtomicU64::new(0),
        }
    }

    pub fn chunk_placement(&self) -> &ObjectPlacement {
        &self.chunk_placement
    }

    /// The block extent table of the chunk, fetching the meta if needed.
    pub async fn blocks_ext(&self) -> Result<Arc<BlocksExt>> {
        let result = self.fetch_meta().await.map(|cached| cached.blocks_ext);
        self.track(result)
    }

    #[instrument(level = "debug", skip_all, fields(chunk_id = %self.chunk_id))]
    async fn fetch_meta(&self) -> Result<CachedChunkMeta> {
        self.meta_cache
            .get_or_fetch(|| async move {
                let file = self.meta_placement.to_string();
                debug!(%file, "fetch chunk meta");
                let response = self
                    .client
                    .get_object(GetObjectRequest {
                        bucket: self.meta_placement.bucket.clone(),
                        key: self.meta_placement.key.clone(),
                        range: None,
                    })
                    .await?;

                let meta = decode_chunk_meta_blob(&response.data, self.chunk_id, &file)?;
                let blocks_ext = meta
                    .get_extension::<BlocksExt>()
                    .context(ParseMetaSnafu { file: &file })?
                    .context(MissingBlocksExtSnafu { file: &file })?;
                blocks_ext
                    .validate()
                    .context(ParseMetaSnafu { file: &file })?;
                debug!(%file, blocks = blocks_ext.len(), "chunk meta fetched");

                Ok(CachedChunkMeta {
                    meta: Arc::new(meta),
                    blocks_ext: Arc::new(blocks_ext),
                })
            })
            .await
    }

    #[instrument(level = "debug", skip_all, fields(chunk_id = %self.chunk_id, ranges = ranges.len()))]
    async fn read_block_ranges(&self, ranges: Vec<BlockRange>) -> Result<Vec<Block>> {
        let cached = self.fetch_meta().await?;

        let results = join_all(
            ranges
                .iter()
                .map(|range| self.fetch_block_range(*range, &cached.blocks_ext)),
        )
        .await;

        // keep the order the ranges were asked in.
        let mut blocks = Vec::new();
        for result in results {
            blocks.extend(result?);
        }
        Ok(blocks)
    }

    async fn fetch_block_range(&self, range: BlockRange, blocks_ext: &BlocksExt) -> Result<Vec<Block>> {
        let BlockRange { start, end } = range;
        ensure!(start >= 0 && end >= start, InvalidBlockRangeSnafu { start, end });

        let block_count = blocks_ext.len() as i64;
        ensure!(
            end <= block_count,
            BlockRangeOutOfBoundsSnafu {
                chunk_id: self.chunk_id,
                start,
                end,
                block_count,
            }
        );

        let infos = &blocks_ext.blocks[start as usize..end as usize];
        let (Some(first), Some(last)) = (infos.first(), infos.last()) else {
            return Ok(Vec::new());
        };

        let total_size = last
            .offset
            .checked_add(last.size)
            .and_then(|span_end| span_end.checked_sub(first.offset))
            .filter(|size| *size >= 0)
            .context(InvalidBlockSpanSnafu {
                chunk_id: self.chunk_id,
                start,
                end,
            })?;
        let data = if total_size == 0 {
            Bytes::new()
        } else {
            let byte_range = ByteRange::with_len(first.offset as u64, total_size as u64);
            debug!(start, end, range = %byte_range, "fetch block range");
            self.client
                .get_object(GetObjectRequest {
                    bucket: self.chunk_placement.bucket.clone(),
                    key: self.chunk_placement.key.clone(),
                    range: Some(byte_range),
                })
                .await?
                .data
        };
        ensure!(
            data.len() as i64 == total_size,
            DataSizeMismatchSnafu {
                key: &self.chunk_placement.key,
                expected: total_size,
                actual: data.len() as i64,
            }
        );

        let mut blocks = Vec::with_capacity(infos.len());
        for (block_index, info) in (start..end).zip(infos) {
            let begin = (info.offset - first.offset) as usize;
            let block = Block::with_checksum(
                data.slice(begin..begin + info.size as usize),
                info.checksum,
            );
            if self.config.validate_block_checksums {
                block.validate_checksum().context(CorruptedBlockSnafu {
                    chunk_id: self.chunk_id,
                    block_index,
                })?;
            }
            blocks.push(block);
        }
        Ok(blocks)
    }

    fn track<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            warn!(chunk_id = %self.chunk_id, kind = ?e.kind(), "chunk read failed: {}", e);
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_micros() as u64;
            self.last_failure_time.fetch_max(now, Ordering::AcqRel);
        }
        result
    }
}

#[async_trait]
impl ChunkReader for S3Reader {
    async fn read_blocks(&self, block_indexes: &[BlockIndex]) -> Result<Vec<Block>> {
        let ranges = block_indexes
            .iter()
            .map(|index| BlockRange {
                start: *index as i64,
                end: *index as i64 + 1,
            })
            .collect();
        let result = self.read_block_ranges(ranges).await;
        self.track(result)
    }

    async fn read_block_range(
        &self,
        first_block_index: BlockIndex,
        block_count: BlockCount,
    ) -> Result<Vec<Block>> {
        let range = BlockRange {
            start: first_block_index as i64,
            end: first_block_index as i64 + block_count as i64,
        };
        let result = self.read_block_ranges(vec![range]).await;
        self.track(result)
    }

    async fn get_meta(&self) -> Result<Arc<ChunkMeta>> {
        let result = self.fetch_meta().await.map(|cached| cached.meta);
        self.track(result)
    }

    fn chunk_id(&self) -> ChunkId {
        self.chunk_id
    }

    fn last_failure_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_micros(self.last_failure_time.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use stratus_types::{checksum::checksum, BlockInfo, DeferredChunkMeta};

    use super::*;
    use crate::{
        client::{mock::MockClient, ObjectClient, PutObjectRequest},
        config::S3MediumConfig,
        err::ErrorKind,
        format::{build_chunk_meta_blob, build_chunk_meta_blob_v1},
        layout::ChunkLayoutEncoder,
    };

    const BUCKET: &str = "chunks";

    struct Fixture {
        client: Arc<MockClient>,
        medium: S3MediumRef,
        chunk_id: ChunkId,
        blocks: Vec<Block>,
    }

    impl Fixture {
        fn reader(&self) -> S3Reader {
            S3Reader::new(self.medium.clone(), S3ReaderConfig::default(), self.chunk_id)
        }
    }

    async fn write_chunk(client: Arc<MockClient>, blocks: Vec<Block>) -> Fixture {
        let medium = Arc::new(S3Medium::new(
            client.clone(),
            S3MediumConfig {
                bucket: BUCKET.to_string(),
                key_prefix: None,
            },
        ));
        let chunk_id = ChunkId::random();
        let mut encoder = ChunkLayoutEncoder::new(chunk_id);
        let request = encoder.add_blocks(&blocks).unwrap();
        let meta_blob = encoder.close(DeferredChunkMeta::default()).unwrap();

        let placement = medium.chunk_placement(chunk_id);
        client
            .put_object(PutObjectRequest {
                bucket: placement.bucket.clone(),
                key: placement.key.clone(),
                data: request.buffers.concat().into(),
            })
            .await
            .unwrap();
        let meta_placement = S3Medium::chunk_meta_placement(&placement);
        client
            .put_object(PutObjectRequest {
                bucket: meta_placement.bucket,
                key: meta_placement.key,
                data: meta_blob,
            })
            .await
            .unwrap();

        Fixture {
            client,
            medium,
            chunk_id,
            blocks,
        }
    }

    fn sample_blocks() -> Vec<Block> {
        vec![
            Block::checksummed(b"b0b0".to_vec()),
            Block::checksummed(b"b1b1b1b".to_vec()),
            Block::checksummed(b"b2".to_vec()),
        ]
    }

    async fn sample_fixture() -> Fixture {
        write_chunk(Arc::new(MockClient::default()), sample_blocks()).await
    }

    #[tokio::test]
    async fn read_single_block() {
        let fixture = sample_fixture().await;
        let reader = fixture.reader();

        let blocks = reader.read_blocks(&[1]).await.unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].data.as_ref(), b"b1b1b1b");
        assert_eq!(blocks[0].checksum(), Some(checksum(b"b1b1b1b")));
        // one meta fetch and one ranged fetch.
        assert_eq!(fixture.client.get_count(), 2);
    }

    #[tokio::test]
    async fn read_range_and_out_of_order() {
        let fixture = sample_fixture().await;
        let reader = fixture.reader();

        let blocks = reader.read_block_range(0, 3).await.unwrap();
        assert_eq!(blocks, fixture.blocks);

        let blocks = reader.read_blocks(&[2, 0]).await.unwrap();
        assert_eq!(blocks, vec![fixture.blocks[2].clone(), fixture.blocks[0].clone()]);

        let blocks = reader.read_block_range(1, 0).await.unwrap();
        assert!(blocks.is_empty());
        let blocks = reader.read_blocks(&[]).await.unwrap();
        assert!(blocks.is_empty());

        assert_eq!(reader.last_failure_time(), UNIX_EPOCH);
    }

    #[tokio::test]
    async fn bounds_checking() {
        let fixture = sample_fixture().await;
        let reader = fixture.reader();
        assert_eq!(reader.last_failure_time(), UNIX_EPOCH);

        let err = reader.read_blocks(&[3]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RangeOutOfBounds);
        assert!(reader.last_failure_time() > UNIX_EPOCH);

        let err = reader.read_block_range(2, -1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRange);

        let err = reader.read_blocks(&[-1]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRange);

        let err = reader.read_block_range(1, 3).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RangeOutOfBounds);

        // a single bad range fails the whole request.
        let err = reader.read_blocks(&[0, 5, 1]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RangeOutOfBounds);
    }

    #[tokio::test]
    async fn size_mismatch() {
        let fixture = sample_fixture().await;
        let reader = fixture.reader();
        reader.get_meta().await.unwrap();

        fixture.client.truncate_ranged_reads(1);
        let err = reader.read_blocks(&[1]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SizeMismatch);

        let err = reader.read_block_range(0, 3).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SizeMismatch);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn meta_is_fetched_once() {
        let client = Arc::new(MockClient::default().with_get_delay(Duration::from_millis(20)));
        let fixture = write_chunk(client, sample_blocks()).await;
        let reader = Arc::new(fixture.reader());

        let handles = (0..8)
            .map(|_| {
                let reader = reader.clone();
                tokio::spawn(async move { reader.get_meta().await })
            })
            .collect::<Vec<_>>();
        let mut metas = Vec::new();
        for handle in handles {
            metas.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(fixture.client.get_count(), 1);
        assert!(metas.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(metas[0].block_index_mapping, Some(vec![0, 1, 2]));

        // served from the cache.
        reader.get_meta().await.unwrap();
        assert_eq!(fixture.client.get_count(), 1);
    }

    #[tokio::test]
    async fn chunk_id_mismatch() {
        let fixture = sample_fixture().await;
        let other = ChunkId::random();
        // move the meta of the chunk under the key of another chunk.
        let placement = S3Medium::chunk_meta_placement(&fixture.medium.chunk_placement(fixture.chunk_id));
        let blob = fixture.client.object(BUCKET, &placement.key).unwrap();
        let other_placement = S3Medium::chunk_meta_placement(&fixture.medium.chunk_placement(other));
        fixture.client.insert(BUCKET, &other_placement.key, blob);

        let reader = S3Reader::new(fixture.medium.clone(), S3ReaderConfig::default(), other);
        let err = reader.get_meta().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChunkIdMismatch);
        assert!(reader.last_failure_time() > UNIX_EPOCH);
    }

    #[tokio::test]
    async fn v1_meta() {
        let fixture = sample_fixture().await;
        let reader = fixture.reader();
        let meta = reader.get_meta().await.unwrap();

        let placement = S3Medium::chunk_meta_placement(&fixture.medium.chunk_placement(fixture.chunk_id));
        let blob = build_chunk_meta_blob_v1(ChunkId::NULL, &meta).unwrap();
        fixture.client.insert(BUCKET, &placement.key, blob);

        let reader = fixture.reader();
        assert_eq!(*reader.get_meta().await.unwrap(), *meta);
        assert_eq!(reader.read_blocks(&[2]).await.unwrap(), vec![fixture.blocks[2].clone()]);
    }

    fn replace_meta(fixture: &Fixture, blob: Bytes) {
        let placement = S3Medium::chunk_meta_placement(&fixture.medium.chunk_placement(fixture.chunk_id));
        fixture.client.insert(BUCKET, &placement.key, blob);
    }

    fn meta_with_blocks(blocks: Vec<BlockInfo>) -> ChunkMeta {
        let mut meta = ChunkMeta::default();
        meta.set_extension(&BlocksExt {
            blocks,
            sync_on_close: false,
        })
        .unwrap();
        meta
    }

    fn block_info(offset: i64, size: i64) -> BlockInfo {
        BlockInfo {
            offset,
            size,
            checksum: 0,
        }
    }

    #[tokio::test]
    async fn meta_without_blocks_ext() {
        let fixture = sample_fixture().await;
        let blob = build_chunk_meta_blob(fixture.chunk_id, &ChunkMeta::default()).unwrap();
        replace_meta(&fixture, blob);

        let reader = fixture.reader();
        let err = reader.get_meta().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenMeta);
        assert!(reader.last_failure_time() > UNIX_EPOCH);

        let err = reader.read_blocks(&[0]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenMeta);
    }

    #[tokio::test]
    async fn inconsistent_extent_table() {
        let fixture = sample_fixture().await;
        let tables = [
            // gap between the blocks.
            vec![block_info(0, 4), block_info(5, 7)],
            // does not start at zero.
            vec![block_info(2, 4), block_info(6, 7)],
            // negative size.
            vec![block_info(0, -1)],
        ];
        for blocks in tables {
            let blob = build_chunk_meta_blob(fixture.chunk_id, &meta_with_blocks(blocks)).unwrap();
            replace_meta(&fixture, blob);

            let reader = fixture.reader();
            let err = reader.read_block_range(0, 1).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BrokenMeta);
            assert!(reader.last_failure_time() > UNIX_EPOCH);
        }
    }

    #[tokio::test]
    async fn overflowing_extent_table() {
        let fixture = sample_fixture().await;
        let meta = meta_with_blocks(vec![block_info(0, i64::MAX), block_info(i64::MAX, 1)]);
        // a v1 header has no checksum to catch this.
        replace_meta(&fixture, build_chunk_meta_blob_v1(fixture.chunk_id, &meta).unwrap());

        let reader = fixture.reader();
        let err = reader.get_meta().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenMeta);
        assert!(reader.last_failure_time() > UNIX_EPOCH);

        let err = reader.read_block_range(0, 2).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenMeta);
        // only meta fetches, no data was requested.
        assert_eq!(fixture.client.get_count(), 2);
    }

    #[tokio::test]
    async fn corrupted_data() {
        let fixture = sample_fixture().await;
        let placement = fixture.medium.chunk_placement(fixture.chunk_id);
        let mut data = fixture.client.object(BUCKET, &placement.key).unwrap().to_vec();
        data[5] ^= 0xff;
        fixture.client.insert(BUCKET, &placement.key, data.into());

        let reader = fixture.reader();
        assert_eq!(reader.read_blocks(&[0]).await.unwrap(), vec![fixture.blocks[0].clone()]);
        let err = reader.read_blocks(&[1]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChecksumViolation);

        let reader = S3Reader::new(
            fixture.medium.clone(),
            S3ReaderConfig {
                validate_block_checksums: false,
            },
            fixture.chunk_id,
        );
        let blocks = reader.read_blocks(&[1]).await.unwrap();
        assert!(blocks[0].validate_checksum().is_err());
    }

    #[tokio::test]
    async fn missing_meta() {
        let client = Arc::new(MockClient::default());
        let medium = Arc::new(S3Medium::new(client, S3MediumConfig::default()));
        let reader = new_s3_reader(medium, S3ReaderConfig::default(), ChunkId::random());
        let err = reader.read_blocks(&[0]).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(reader.last_failure_time() > UNIX_EPOCH);
    }

    #[tokio::test]
    async fn zero_sized_blocks() {
        let blocks = vec![
            Block::checksummed(Vec::new()),
            Block::checksummed(b"x".to_vec()),
            Block::checksummed(Vec::new()),
        ];
        let fixture = write_chunk(Arc::new(MockClient::default()), blocks).await;
        let reader = fixture.reader();

        let blocks = reader.read_blocks(&[2, 0]).await.unwrap();
        assert!(blocks.iter().all(|b| b.size() == 0));
        // only the meta was fetched.
        assert_eq!(fixture.client.get_count(), 1);

        assert_eq!(reader.read_block_range(0, 3).await.unwrap(), fixture.blocks);
    }
}
