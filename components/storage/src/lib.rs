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

//! Chunk layout on an object store.
//!
//! A chunk is stored as two objects: the data object, the concatenation of
//! its blocks, and the meta object, a small header followed by the
//! serialized [stratus_types::ChunkMeta] which carries the block extent
//! table.

pub mod client;
pub mod config;
pub mod err;
pub mod format;
pub mod layout;
pub mod medium;
pub mod meta_cache;
pub mod reader;
pub mod writer;

pub use client::{ObjectClient, ObjectClientRef, OpendalClient};
pub use config::{S3MediumConfig, S3ReaderConfig, S3WriterConfig};
pub use err::{Error, ErrorKind, Result};
pub use layout::{ChunkLayoutEncoder, WriteRequest};
pub use medium::{ObjectPlacement, S3Medium, S3MediumRef};
pub use reader::{new_s3_reader, ChunkReader, ChunkReaderRef, S3Reader};
pub use writer::S3Writer;
