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

use serde::{Deserialize, Serialize};
use stratus_common::{MAX_BLOCK_SIZE, STRATUS_DEBUG_BUCKET};
use stratus_utils::readable_size::ReadableSize;

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct S3MediumConfig {
    pub bucket: String,
    /// Prepended to every object key of the medium, e.g. `cluster-a/`.
    pub key_prefix: Option<String>,
}

impl Default for S3MediumConfig {
    fn default() -> Self {
        Self {
            bucket: STRATUS_DEBUG_BUCKET.to_string(),
            key_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct S3ReaderConfig {
    /// Verify every fetched block against the checksum recorded in the
    /// block extent table.
    pub validate_block_checksums: bool,
}

impl Default for S3ReaderConfig {
    fn default() -> Self {
        Self {
            validate_block_checksums: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct S3WriterConfig {
    /// Recorded in the block extent table of every written chunk.
    pub sync_on_close: bool,
    pub max_block_size: ReadableSize,
}

impl Default for S3WriterConfig {
    fn default() -> Self {
        Self {
            sync_on_close: false,
            max_block_size: ReadableSize(MAX_BLOCK_SIZE as u64),
        }
    }
}
