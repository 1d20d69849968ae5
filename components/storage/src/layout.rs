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

use bytes::Bytes;
use snafu::{ensure, ResultExt};
use stratus_types::{
    BlockInfo, BlocksExt, Block, ChunkId, ChunkInfo, ChunkMeta, DeferredChunkMeta,
};
use tracing::{debug, error};

use crate::{
    err::{BuildChunkMetaSnafu, EncoderClosedSnafu, Result},
    format::build_chunk_meta_blob,
};

/// Where, inside the chunk's data region, a batch of blocks has to be
/// persisted.
#[derive(Debug, Clone, Default)]
pub struct WriteRequest {
    pub start_offset: i64,
    pub end_offset: i64,
    pub buffers: Vec<Bytes>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum State {
    Open,
    Closed,
}

/// ChunkLayoutEncoder owns the physical layout of a chunk: block offsets,
/// the block extent table and the meta blob. Every chunk writer goes
/// through it, so that chunks are byte-identical whatever the medium is.
///
/// One encoder builds one chunk: `add_blocks*` and then `close`.
#[derive(Debug)]
pub struct ChunkLayoutEncoder {
    chunk_id: ChunkId,
    state: State,
    chunk_meta: ChunkMeta,
    chunk_info: ChunkInfo,
    blocks_ext: BlocksExt,
    data_size: i64,
    meta_data_size: i64,
}

impl ChunkLayoutEncoder {
    pub fn new(chunk_id: ChunkId) -> Self {
        Self {
            chunk_id,
            state: State::Open,
            chunk_meta: ChunkMeta::default(),
            chunk_info: ChunkInfo::default(),
            blocks_ext: BlocksExt::default(),
            data_size: 0,
            meta_data_size: 0,
        }
    }

    pub fn with_sync_on_close(mut self, sync_on_close: bool) -> Self {
        self.blocks_ext.sync_on_close = sync_on_close;
        self
    }

    /// Append `blocks` to the chunk.
    ///
    /// # Panics
    ///
    /// Panics if a block's declared checksum does not match its data.
    pub fn add_blocks(&mut self, blocks: &[Block]) -> Result<WriteRequest> {
        ensure!(
            self.state == State::Open,
            EncoderClosedSnafu {
                chunk_id: self.chunk_id
            }
        );

        let mut request = WriteRequest {
            start_offset: self.data_size,
            end_offset: self.data_size,
            buffers: Vec::with_capacity(blocks.len()),
        };

        for block in blocks {
            if let Err(e) = block.validate_checksum() {
                error!(chunk_id = %self.chunk_id, offset = request.end_offset, "{}", e);
                panic!(
                    "block checksum mismatch while writing chunk {}: {}",
                    self.chunk_id, e
                );
            }

            let size = block.size() as i64;
            self.blocks_ext.blocks.push(BlockInfo {
                offset: request.end_offset,
                size,
                checksum: block.get_or_compute_checksum(),
            });
            request.end_offset += size;
            request.buffers.push(block.data.clone());
        }

        self.data_size = request.end_offset;
        Ok(request)
    }

    /// Finish the chunk and return its meta blob. The caller persists the
    /// blob next to the data.
    ///
    /// A `chunk_meta` that is not finalized yet gets the identity block
    /// index mapping.
    pub fn close(&mut self, mut chunk_meta: DeferredChunkMeta) -> Result<Bytes> {
        ensure!(
            self.state == State::Open,
            EncoderClosedSnafu {
                chunk_id: self.chunk_id
            }
        );

        if !chunk_meta.is_finalized() {
            let block_count = self.blocks_ext.blocks.len() as i32;
            *chunk_meta.block_index_mapping_mut() = Some((0..block_count).collect());
            chunk_meta.finalize();
        }

        self.chunk_meta = chunk_meta.into_inner();
        self.chunk_meta
            .set_extension(&self.blocks_ext)
            .context(BuildChunkMetaSnafu {
                chunk_id: self.chunk_id,
            })?;

        let blob = self.prepare_chunk_meta_blob()?;
        self.chunk_info.disk_space = self.data_size + self.meta_data_size;
        self.state = State::Closed;

        debug!(
            chunk_id = %self.chunk_id,
            blocks = self.blocks_ext.blocks.len(),
            data_size = self.data_size,
            meta_data_size = self.meta_data_size,
            "chunk layout closed"
        );
        Ok(blob)
    }

    /// Build the meta blob, header included, from the current chunk meta.
    pub fn prepare_chunk_meta_blob(&mut self) -> Result<Bytes> {
        let blob = build_chunk_meta_blob(self.chunk_id, &self.chunk_meta)?;
        self.meta_data_size = blob.len() as i64;
        Ok(blob)
    }

    pub fn chunk_id(&self) -> ChunkId {
        self.chunk_id
    }

    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    pub fn data_size(&self) -> i64 {
        self.data_size
    }

    pub fn meta_data_size(&self) -> i64 {
        self.meta_data_size
    }

    pub fn chunk_meta(&self) -> &ChunkMeta {
        &self.chunk_meta
    }

    pub fn chunk_info(&self) -> &ChunkInfo {
        &self.chunk_info
    }

    pub fn blocks_ext(&self) -> &BlocksExt {
        &self.blocks_ext
    }
}
