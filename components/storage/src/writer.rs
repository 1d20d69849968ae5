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

use bytes::{Bytes, BytesMut};
use snafu::ensure;
use stratus_types::{Block, ChunkId, ChunkInfo, DeferredChunkMeta};
use tracing::{debug, info, instrument};

use crate::{
    client::{ObjectClientRef, PutObjectRequest},
    config::S3WriterConfig,
    err::{BlockTooLargeSnafu, Result},
    layout::ChunkLayoutEncoder,
    medium::{ObjectPlacement, S3Medium, S3MediumRef},
};

/// S3Writer writes one chunk into an [S3Medium].
///
/// Blocks are buffered in memory until [S3Writer::close], which uploads the
/// data object first and the meta object last. A chunk whose meta object is
/// visible therefore always has its data in place.
#[derive(Debug)]
pub struct S3Writer {
    client: ObjectClientRef,
    config: S3WriterConfig,
    chunk_placement: ObjectPlacement,
    meta_placement: ObjectPlacement,
    encoder: ChunkLayoutEncoder,
    buffers: Vec<Bytes>,
    buffered_size: i64,
}

impl S3Writer {
    pub fn new(medium: S3MediumRef, config: S3WriterConfig, chunk_id: ChunkId) -> Self {
        let chunk_placement = medium.chunk_placement(chunk_id);
        let meta_placement = S3Medium::chunk_meta_placement(&chunk_placement);
        let encoder = ChunkLayoutEncoder::new(chunk_id).with_sync_on_close(config.sync_on_close);
        Self {
            client: medium.client(),
            config,
            chunk_placement,
            meta_placement,
            encoder,
            buffers: Vec::new(),
            buffered_size: 0,
        }
    }

    pub fn chunk_id(&self) -> ChunkId {
        self.encoder.chunk_id()
    }

    pub fn chunk_placement(&self) -> &ObjectPlacement {
        &self.chunk_placement
    }

    /// The number of data bytes written so far.
    pub fn data_size(&self) -> i64 {
        self.buffered_size
    }

    pub fn block_count(&self) -> usize {
        self.encoder.blocks_ext().len()
    }

    pub fn write_blocks(&mut self, blocks: &[Block]) -> Result<()> {
        let max_size = self.config.max_block_size.as_bytes();
        for block in blocks {
            ensure!(
                block.size() as u64 <= max_size,
                BlockTooLargeSnafu {
                    chunk_id: self.chunk_id(),
                    size: block.size() as u64,
                    max_size,
                }
            );
        }

        let request = self.encoder.add_blocks(blocks)?;
        debug_assert_eq!(request.start_offset, self.buffered_size);
        self.buffered_size = request.end_offset;
        self.buffers.extend(request.buffers);
        Ok(())
    }

    /// Close the chunk and upload it. The writer can not be used afterwards,
    /// even if an upload fails.
    #[instrument(level = "debug", skip_all, fields(chunk_id = %self.chunk_id()))]
    pub async fn close(&mut self, chunk_meta: DeferredChunkMeta) -> Result<ChunkInfo> {
        let meta_blob = self.encoder.close(chunk_meta)?;

        let mut data = BytesMut::with_capacity(self.buffered_size as usize);
        for buffer in self.buffers.drain(..) {
            data.extend_from_slice(&buffer);
        }
        debug_assert_eq!(data.len() as i64, self.encoder.data_size());

        debug!(placement = %self.chunk_placement, size = data.len(), "upload chunk data");
        self.client
            .put_object(PutObjectRequest {
                bucket: self.chunk_placement.bucket.clone(),
                key: self.chunk_placement.key.clone(),
                data: data.freeze(),
            })
            .await?;

        debug!(placement = %self.meta_placement, size = meta_blob.len(), "upload chunk meta");
        self.client
            .put_object(PutObjectRequest {
                bucket: self.meta_placement.bucket.clone(),
                key: self.meta_placement.key.clone(),
                data: meta_blob,
            })
            .await?;

        let chunk_info = *self.encoder.chunk_info();
        info!(
            chunk_id = %self.chunk_id(),
            blocks = self.block_count(),
            disk_space = chunk_info.disk_space,
            "chunk written"
        );
        Ok(chunk_info)
    }
}
