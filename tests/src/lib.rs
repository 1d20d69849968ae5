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

//! End to end tests: chunks written by `S3Writer` and read back by
//! `S3Reader` through real opendal backends.

#[cfg(test)]
mod chunk_tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::UNIX_EPOCH,
    };

    use async_trait::async_trait;
    use bytes::Bytes;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use stratus_storage::{
        client::{GetObjectRequest, GetObjectResponse, PutObjectRequest},
        new_s3_reader, ChunkReader, ErrorKind, ObjectClient, ObjectClientRef, OpendalClient,
        Result, S3Medium, S3MediumConfig, S3MediumRef, S3ReaderConfig, S3Writer, S3WriterConfig,
    };
    use stratus_types::{Block, ChunkId, DeferredChunkMeta};
    use stratus_utils::{
        logger::install_fmt_log,
        object_storage::{new_fs_object_storage, new_memory_object_storage},
    };

    const BUCKET: &str = "stratus-test";

    /// Wraps a client, counts GETs and can cut ranged reads short.
    #[derive(Debug)]
    struct FaultyClient {
        inner: ObjectClientRef,
        gets: AtomicUsize,
        truncate_by: AtomicUsize,
    }

    impl FaultyClient {
        fn new(inner: ObjectClientRef) -> Self {
            Self {
                inner,
                gets: AtomicUsize::new(0),
                truncate_by: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ObjectClient for FaultyClient {
        async fn get_object(&self, request: GetObjectRequest) -> Result<GetObjectResponse> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            let ranged = request.range.is_some();
            let mut response = self.inner.get_object(request).await?;
            let cut = self.truncate_by.load(Ordering::SeqCst);
            if ranged && cut > 0 {
                let len = response.data.len().saturating_sub(cut);
                response.data.truncate(len);
            }
            Ok(response)
        }

        async fn put_object(&self, request: PutObjectRequest) -> Result<()> {
            self.inner.put_object(request).await
        }
    }

    fn memory_client() -> ObjectClientRef {
        let storage = new_memory_object_storage("/").unwrap();
        Arc::new(OpendalClient::new().with_bucket(BUCKET, storage))
    }

    fn medium(client: ObjectClientRef, key_prefix: Option<&str>) -> S3MediumRef {
        Arc::new(S3Medium::new(
            client,
            S3MediumConfig {
                bucket: BUCKET.to_string(),
                key_prefix: key_prefix.map(str::to_string),
            },
        ))
    }

    fn random_blocks(rng: &mut StdRng, count: usize) -> Vec<Block> {
        (0..count)
            .map(|_| {
                let size = rng.gen_range(1..4096);
                let data = (0..size).map(|_| rng.gen::<u8>()).collect::<Vec<_>>();
                Block::checksummed(Bytes::from(data))
            })
            .collect()
    }

    async fn write_chunk(medium: S3MediumRef, chunk_id: ChunkId, blocks: &[Block]) {
        let mut writer = S3Writer::new(medium, S3WriterConfig::default(), chunk_id);
        for batch in blocks.chunks(3) {
            writer.write_blocks(batch).unwrap();
        }
        let info = writer.close(DeferredChunkMeta::default()).await.unwrap();
        let data_size = blocks.iter().map(|b| b.size() as i64).sum::<i64>();
        assert!(info.disk_space > data_size);
    }

    #[tokio::test]
    async fn round_trip_memory() {
        install_fmt_log();
        let mut rng = StdRng::seed_from_u64(7);
        let medium = medium(memory_client(), Some("cluster-a/"));
        let chunk_id = ChunkId::random();
        let blocks = random_blocks(&mut rng, 10);
        write_chunk(medium.clone(), chunk_id, &blocks).await;

        let reader = new_s3_reader(medium, S3ReaderConfig::default(), chunk_id);
        assert_eq!(reader.chunk_id(), chunk_id);
        assert_eq!(reader.read_block_range(0, 10).await.unwrap(), blocks);

        let indexes = [9, 0, 4, 4, 2];
        let read = reader.read_blocks(&indexes).await.unwrap();
        let expected = indexes
            .iter()
            .map(|i| blocks[*i as usize].clone())
            .collect::<Vec<_>>();
        assert_eq!(read, expected);

        let read = reader.read_block_range(3, 4).await.unwrap();
        assert_eq!(read, blocks[3..7]);

        let meta = reader.get_meta().await.unwrap();
        assert_eq!(meta.block_index_mapping, Some((0..10).collect()));
        assert_eq!(reader.last_failure_time(), UNIX_EPOCH);
    }

    #[tokio::test]
    async fn round_trip_fs() {
        let dir = tempfile::tempdir().unwrap();
        let storage = new_fs_object_storage(dir.path()).unwrap();
        let client = Arc::new(OpendalClient::new().with_bucket(BUCKET, storage));
        let medium = medium(client, None);

        let mut rng = StdRng::seed_from_u64(11);
        let chunk_id = ChunkId::random();
        let blocks = random_blocks(&mut rng, 5);
        write_chunk(medium.clone(), chunk_id, &blocks).await;

        let data_file = dir.path().join(medium.chunk_placement(chunk_id).key);
        let data_size = blocks.iter().map(|b| b.size() as u64).sum::<u64>();
        assert_eq!(std::fs::metadata(&data_file).unwrap().len(), data_size);

        let reader = new_s3_reader(medium, S3ReaderConfig::default(), chunk_id);
        let read = reader.read_blocks(&[4, 1]).await.unwrap();
        assert_eq!(read, vec![blocks[4].clone(), blocks[1].clone()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_readers_share_one_meta_fetch() {
        let faulty = Arc::new(FaultyClient::new(memory_client()));
        let medium = medium(faulty.clone(), None);
        let mut rng = StdRng::seed_from_u64(3);
        let chunk_id = ChunkId::random();
        let blocks = random_blocks(&mut rng, 8);
        write_chunk(medium.clone(), chunk_id, &blocks).await;

        let reader = new_s3_reader(medium, S3ReaderConfig::default(), chunk_id);
        let reads = (0..8)
            .map(|i| {
                let reader = reader.clone();
                tokio::spawn(async move { reader.read_blocks(&[i]).await })
            })
            .collect::<Vec<_>>();
        for (i, read) in futures::future::join_all(reads).await.into_iter().enumerate() {
            assert_eq!(read.unwrap().unwrap(), vec![blocks[i].clone()]);
        }
        // one meta fetch plus one ranged fetch per read.
        assert_eq!(faulty.gets.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn short_reads_are_detected() {
        let faulty = Arc::new(FaultyClient::new(memory_client()));
        let medium = medium(faulty.clone(), None);
        let chunk_id = ChunkId::random();
        let blocks = vec![
            Block::checksummed(b"hello".to_vec()),
            Block::checksummed(b"world".to_vec()),
        ];
        write_chunk(medium.clone(), chunk_id, &blocks).await;

        let reader = new_s3_reader(medium, S3ReaderConfig::default(), chunk_id);
        reader.get_meta().await.unwrap();
        faulty.truncate_by.store(2, Ordering::SeqCst);
        let err = reader.read_block_range(0, 2).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SizeMismatch);
        assert!(reader.last_failure_time() > UNIX_EPOCH);

        faulty.truncate_by.store(0, Ordering::SeqCst);
        assert_eq!(reader.read_block_range(0, 2).await.unwrap(), blocks);
    }

    #[tokio::test]
    async fn reading_an_unknown_chunk_fails() {
        let medium = medium(memory_client(), None);
        let reader = new_s3_reader(medium, S3ReaderConfig::default(), ChunkId::random());
        let err = reader.get_meta().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ObjectStorage);
        assert!(err.is_not_found());
    }
}
