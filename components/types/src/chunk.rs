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

use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use snafu::{ensure, ResultExt};
use stratus_common::BLOCKS_EXT_NAME;

use crate::err::{
    DecodeExtensionSnafu, EncodeExtensionSnafu, InconsistentBlockExtentSnafu, Result,
};

/// The position of one block inside the chunk's data region.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub offset: i64,
    pub size: i64,
    pub checksum: u64,
}

impl BlockInfo {
    /// The offset right past the block. Saturates on tables that were not
    /// validated.
    pub fn end(&self) -> i64 {
        self.offset.saturating_add(self.size)
    }
}

/// A typed sub-document stored in [ChunkMeta::extensions] under a fixed name.
pub trait ChunkMetaExtension: Serialize + DeserializeOwned {
    const NAME: &'static str;
}

/// BlocksExt is the block extent table of a chunk.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlocksExt {
    pub blocks: Vec<BlockInfo>,
    pub sync_on_close: bool,
}

impl ChunkMetaExtension for BlocksExt {
    const NAME: &'static str = BLOCKS_EXT_NAME;
}

impl BlocksExt {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The size of the data region described by this table.
    pub fn data_size(&self) -> i64 {
        self.blocks.last().map(BlockInfo::end).unwrap_or(0)
    }

    /// Check that the blocks tile the data region without gaps or overlaps,
    /// starting at offset zero.
    pub fn validate(&self) -> Result<()> {
        let mut expected_offset = 0i64;
        for (index, info) in self.blocks.iter().enumerate() {
            let end = info.offset.checked_add(info.size);
            ensure!(
                info.offset == expected_offset && info.size >= 0 && end.is_some(),
                InconsistentBlockExtentSnafu {
                    index,
                    offset: info.offset,
                    size: info.size,
                    expected_offset,
                }
            );
            expected_offset = end.unwrap_or(i64::MAX);
        }
        Ok(())
    }
}

/// ChunkMeta is the structured payload of a chunk meta blob.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub chunk_type: i32,
    pub format: i32,
    pub features: u64,
    /// Maps the logical block index to the physical one. Lets a repair step
    /// reorder blocks without rewriting data; the identity for a normally
    /// written chunk.
    pub block_index_mapping: Option<Vec<i32>>,
    pub extensions: BTreeMap<String, Vec<u8>>,
}

impl ChunkMeta {
    pub fn set_extension<E: ChunkMetaExtension>(&mut self, ext: &E) -> Result<()> {
        let buf = bincode::serialize(ext).context(EncodeExtensionSnafu { name: E::NAME })?;
        self.extensions.insert(E::NAME.to_string(), buf);
        Ok(())
    }

    pub fn get_extension<E: ChunkMetaExtension>(&self) -> Result<Option<E>> {
        match self.extensions.get(E::NAME) {
            None => Ok(None),
            Some(buf) => {
                let ext = bincode::deserialize(buf).context(DecodeExtensionSnafu { name: E::NAME })?;
                Ok(Some(ext))
            }
        }
    }

    pub fn has_extension<E: ChunkMetaExtension>(&self) -> bool {
        self.extensions.contains_key(E::NAME)
    }
}

/// DeferredChunkMeta is the meta a chunk writer hands over when it closes
/// the chunk. Until it is finalized, the block index mapping may still be
/// filled in by the layout encoder.
#[derive(Debug, Clone, Default)]
pub struct DeferredChunkMeta {
    meta: ChunkMeta,
    finalized: bool,
}

impl DeferredChunkMeta {
    pub fn new(meta: ChunkMeta) -> Self {
        Self {
            meta,
            finalized: false,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    /// Panics if the meta has already been finalized.
    pub fn block_index_mapping_mut(&mut self) -> &mut Option<Vec<i32>> {
        assert!(!self.finalized, "chunk meta is already finalized");
        &mut self.meta.block_index_mapping
    }

    pub fn meta(&self) -> &ChunkMeta {
        &self.meta
    }

    pub fn into_inner(self) -> ChunkMeta {
        self.meta
    }
}

impl From<ChunkMeta> for DeferredChunkMeta {
    fn from(meta: ChunkMeta) -> Self {
        DeferredChunkMeta::new(meta)
    }
}

/// ChunkInfo is the accounting summary of a written chunk.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub disk_space: i64,
}
