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

use clap::Args;
use snafu::{whatever, ResultExt, Whatever};
use stratus_common::{BlockCount, BlockIndex};
use stratus_storage::{ChunkReader, S3Reader, S3ReaderConfig};
use stratus_types::ChunkId;
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::storage::StorageArgs;

#[derive(Debug, Clone, Args)]
#[command(long_about = r"

Read blocks of a chunk and write their data, in the requested order, to
stdout or to a file.
")]
pub struct GetArgs {
    #[arg(help = "Id of the chunk", value_name = "CHUNK_ID")]
    pub chunk_id: ChunkId,

    #[arg(
        long,
        help = "Comma separated block indexes, all blocks by default",
        value_delimiter = ',',
        value_name = "INDEXES"
    )]
    pub blocks: Vec<BlockIndex>,

    #[arg(long, short, help = "Write to this file instead of stdout", value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Do not verify block checksums")]
    pub skip_checksum: bool,

    #[command(flatten)]
    pub storage: StorageArgs,
}

impl GetArgs {
    pub async fn run(self) -> Result<(), Whatever> {
        let medium = self.storage.open_medium()?;
        let config = S3ReaderConfig {
            validate_block_checksums: !self.skip_checksum,
        };
        let reader = S3Reader::new(medium, config, self.chunk_id);

        let blocks = if self.blocks.is_empty() {
            let block_count = reader
                .blocks_ext()
                .await
                .with_whatever_context(|e| format!("failed to read the meta of {}: {}", self.chunk_id, e))?
                .len();
            let block_count = checked_block_count(block_count)?;
            reader.read_block_range(0, block_count).await
        } else {
            reader.read_blocks(&self.blocks).await
        }
        .with_whatever_context(|e| format!("failed to read chunk {}: {}", self.chunk_id, e))?;

        let size: usize = blocks.iter().map(|b| b.size()).sum();
        match &self.output {
            Some(path) => {
                let mut file = tokio::fs::File::create(path)
                    .await
                    .with_whatever_context(|e| format!("failed to create {}: {}", path.display(), e))?;
                for block in &blocks {
                    file.write_all(&block.data)
                        .await
                        .with_whatever_context(|e| format!("failed to write {}: {}", path.display(), e))?;
                }
                file.flush()
                    .await
                    .with_whatever_context(|e| format!("failed to flush {}: {}", path.display(), e))?;
            }
            None => {
                let mut stdout = tokio::io::stdout();
                for block in &blocks {
                    stdout
                        .write_all(&block.data)
                        .await
                        .whatever_context("failed to write to stdout")?;
                }
                stdout.flush().await.whatever_context("failed to flush stdout")?;
            }
        }

        info!(chunk_id = %self.chunk_id, blocks = blocks.len(), size, "get done");
        Ok(())
    }
}

fn checked_block_count(block_count: usize) -> Result<BlockCount, Whatever> {
    match BlockCount::try_from(block_count) {
        Ok(block_count) => Ok(block_count),
        Err(_) => whatever!("chunk has {} blocks, too many to read at once", block_count),
    }
}
