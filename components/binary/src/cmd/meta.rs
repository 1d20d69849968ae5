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

use clap::Args;
use serde_json::json;
use snafu::{ResultExt, Whatever};
use stratus_storage::{ChunkReader, S3Reader, S3ReaderConfig};
use stratus_types::ChunkId;

use super::storage::StorageArgs;

/// Print the decoded meta of a chunk as JSON.
#[derive(Debug, Clone, Args)]
pub struct MetaArgs {
    #[arg(help = "Id of the chunk", value_name = "CHUNK_ID")]
    pub chunk_id: ChunkId,

    #[command(flatten)]
    pub storage: StorageArgs,
}

impl MetaArgs {
    pub async fn run(self) -> Result<(), Whatever> {
        let medium = self.storage.open_medium()?;
        let reader = S3Reader::new(medium, S3ReaderConfig::default(), self.chunk_id);
        let meta = reader
            .get_meta()
            .await
            .with_whatever_context(|e| format!("failed to read the meta of {}: {}", self.chunk_id, e))?;
        let blocks_ext = reader
            .blocks_ext()
            .await
            .with_whatever_context(|e| format!("failed to read the meta of {}: {}", self.chunk_id, e))?;

        let value = json!({
            "chunk_id": self.chunk_id.to_string(),
            "placement": reader.chunk_placement().to_string(),
            "chunk_type": meta.chunk_type,
            "format": meta.format,
            "features": meta.features,
            "block_index_mapping": meta.block_index_mapping,
            "extensions": meta.extensions.keys().collect::<Vec<_>>(),
            "sync_on_close": blocks_ext.sync_on_close,
            "data_size": blocks_ext.data_size(),
            "blocks": blocks_ext.blocks,
        });
        let out = serde_json::to_string_pretty(&value).whatever_context("failed to encode the meta")?;
        println!("{}", out);
        Ok(())
    }
}
