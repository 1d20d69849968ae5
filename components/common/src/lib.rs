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

pub const STRATUS_DEBUG_BUCKET: &str = "test-bucket";

/// Every chunk data object lives under this prefix.
pub const CHUNK_DATA_KEY_PREFIX: &str = "chunk-data/";
/// The meta object of a chunk is stored next to its data object,
/// under the data key with this suffix appended.
pub const CHUNK_META_SUFFIX: &str = ".meta";

/// The name of the chunk meta extension holding the block extent table.
pub const BLOCKS_EXT_NAME: &str = "blocks_ext";

pub const MIN_BLOCK_SIZE: usize = 4 << 10; // 4 KiB
// The default block size used when splitting files into chunks.
pub const BLOCK_SIZE: usize = 1 << 20; // 1 MiB
pub const MAX_BLOCK_SIZE: usize = 16 << 20; // 16 MiB

pub type BlockIndex = i32;
pub type BlockCount = i32;
