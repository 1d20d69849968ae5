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

use std::path::PathBuf;

use bytes::Bytes;
use clap::Args;
use snafu::{ResultExt, Whatever};
use stratus_common::{BLOCK_SIZE, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
use stratus_storage::{S3Writer, S3WriterConfig};
use stratus_types::{Block, ChunkId, DeferredChunkMeta};
use stratus_utils::readable_size::ReadableSize;
use tracing::info;

use super::storage::StorageArgs;

const CHUNK_OPTIONS_HEADER: &str = "Chunk options";

#[derive(Debug, Clone, Args)]
#[command(long_about = r"

Split a file into blocks and write them as one chunk. The chunk id is
printed on success.
")]
pub struct PutArgs {
    #[arg(help = "The file to upload", value_name = "FILE")]
    pub file: PathBuf,

    #[arg(
        long,
        help = "Size of every block but the last one",
        help_heading = CHUNK_OPTIONS_HEADER,
        default_value_t = ReadableSize(BLOCK_SIZE as u64),
        value_parser = validate_block_size,
    )]
    pub block_size: ReadableSize,

    #[arg(
        long,
        help = "Id of the new chunk, a random one by default",
        help_heading = CHUNK_OPTIONS_HEADER,
        value_name = "CHUNK_ID"
    )]
    pub chunk_id: Option<ChunkId>,

    #[arg(long, help = "Mark the chunk as synced on close", help_heading = CHUNK_OPTIONS_HEADER)]
    pub sync_on_close: bool,

    #[command(flatten)]
    pub storage: StorageArgs,
}

impl PutArgs {
    pub async fn run(self) -> Result<(), Whatever> {
        let data = tokio::fs::read(&self.file)
            .await
            .with_whatever_context(|e| format!("failed to read {}: {}", self.file.display(), e))?;
        let chunk_id = self.chunk_id.unwrap_or_else(ChunkId::random);
        let blocks = split_blocks(Bytes::from(data), self.block_size.as_bytes_usize());

        let medium = self.storage.open_medium()?;
        let config = S3WriterConfig {
            sync_on_close: self.sync_on_close,
            max_block_size: self.block_size,
        };
        let mut writer = S3Writer::new(medium, config, chunk_id);
        writer
            .write_blocks(&blocks)
            .with_whatever_context(|e| format!("failed to write chunk {}: {}", chunk_id, e))?;
        let chunk_info = writer
            .close(DeferredChunkMeta::default())
            .await
            .with_whatever_context(|e| format!("failed to upload chunk {}: {}", chunk_id, e))?;

        info!(
            %chunk_id,
            blocks = blocks.len(),
            disk_space = chunk_info.disk_space,
            "put {} as {}",
            self.file.display(),
            writer.chunk_placement()
        );
        println!("{}", chunk_id);
        Ok(())
    }
}

fn split_blocks(data: Bytes, block_size: usize) -> Vec<Block> {
    let mut blocks = Vec::with_capacity(data.len().div_ceil(block_size));
    let mut offset = 0;
    while offset < data.len() {
        let end = (offset + block_size).min(data.len());
        blocks.push(Block::checksummed(data.slice(offset..end)));
        offset = end;
    }
    blocks
}

fn validate_block_size(s: &str) -> Result<ReadableSize, String> {
    let size = s
        .parse::<ReadableSize>()
        .map_err(|e| format!("invalid block size: {}", e))?;
    let n = size.as_bytes_usize();
    if n < MIN_BLOCK_SIZE {
        return Err(format!("block size {} too small", size));
    }
    if n > MAX_BLOCK_SIZE {
        return Err(format!("block size {} too large", size));
    }
    Ok(size)
}
