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

pub mod block;
pub mod checksum;
pub mod chunk;
pub mod chunk_id;
pub mod envelope;
pub mod err;

pub use block::Block;
pub use chunk::{BlockInfo, BlocksExt, ChunkInfo, ChunkMeta, ChunkMetaExtension, DeferredChunkMeta};
pub use chunk_id::ChunkId;
