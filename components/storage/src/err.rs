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

use snafu::{Location, Snafu};
use stratus_types::ChunkId;

/// The semantic class of an [Error], what callers and the health checker
/// dispatch on.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    ChecksumViolation,
    InvalidRange,
    RangeOutOfBounds,
    SizeMismatch,
    BrokenMeta,
    ChunkIdMismatch,
    ObjectStorage,
    EncoderClosed,
    BlockTooLarge,
}

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("OpenDAL operator failed"))]
    OpenDal {
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        error: opendal::Error,
    },

    #[snafu(display("no object storage is registered for bucket {bucket:?}"))]
    UnknownBucket {
        bucket: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("chunk {chunk_id} layout is already closed"))]
    EncoderClosed {
        chunk_id: ChunkId,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("block of {size} bytes exceeds the limit of {max_size} bytes"))]
    BlockTooLarge {
        chunk_id: ChunkId,
        size: u64,
        max_size: u64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to build chunk meta for chunk {chunk_id}"))]
    BuildChunkMeta {
        chunk_id: ChunkId,
        #[snafu(implicit)]
        location: Location,
        source: stratus_types::err::Error,
    },

    // Read path.
    #[snafu(display("chunk meta file {file} is too short: {len} bytes, at least {expected} bytes expected"))]
    MetaTooShort {
        file: String,
        len: usize,
        expected: usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("incorrect header signature {signature:#x} in chunk meta file {file}"))]
    UnknownMetaSignature {
        file: String,
        signature: u32,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "incorrect checksum in chunk meta file {file}: expected {expected:#x}, actual {actual:#x}, meta file length {len}"
    ))]
    MetaChecksumMismatch {
        file: String,
        expected: u64,
        actual: u64,
        len: usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("invalid chunk id in meta file {file}: expected {expected}, actual {actual}"))]
    ChunkIdMismatch {
        file: String,
        expected: ChunkId,
        actual: ChunkId,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to parse chunk meta file {file}"))]
    ParseMeta {
        file: String,
        #[snafu(implicit)]
        location: Location,
        source: stratus_types::err::Error,
    },

    #[snafu(display("chunk meta file {file} has no block extent table"))]
    MissingBlocksExt {
        file: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("invalid block range: [{start}, {end})"))]
    InvalidBlockRange {
        start: i64,
        end: i64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "block range [{start}, {end}) of chunk {chunk_id} is out of bounds: only {block_count} blocks exist"
    ))]
    BlockRangeOutOfBounds {
        chunk_id: ChunkId,
        start: i64,
        end: i64,
        block_count: i64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("block extents [{start}, {end}) of chunk {chunk_id} do not span a valid byte range"))]
    InvalidBlockSpan {
        chunk_id: ChunkId,
        start: i64,
        end: i64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("incorrect data size of {key}: expected {expected}, actual {actual}"))]
    DataSizeMismatch {
        key: String,
        expected: i64,
        actual: i64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("block {block_index} of chunk {chunk_id} is corrupted"))]
    CorruptedBlock {
        chunk_id: ChunkId,
        block_index: i64,
        #[snafu(implicit)]
        location: Location,
        source: stratus_types::err::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::OpenDal { .. } | Error::UnknownBucket { .. } => ErrorKind::ObjectStorage,
            Error::EncoderClosed { .. } => ErrorKind::EncoderClosed,
            Error::BlockTooLarge { .. } => ErrorKind::BlockTooLarge,
            Error::BuildChunkMeta { .. } => ErrorKind::BrokenMeta,
            Error::MetaTooShort { .. }
            | Error::UnknownMetaSignature { .. }
            | Error::ParseMeta { .. }
            | Error::MissingBlocksExt { .. }
            | Error::InvalidBlockSpan { .. } => ErrorKind::BrokenMeta,
            Error::MetaChecksumMismatch { .. } | Error::CorruptedBlock { .. } => {
                ErrorKind::ChecksumViolation
            }
            Error::ChunkIdMismatch { .. } => ErrorKind::ChunkIdMismatch,
            Error::InvalidBlockRange { .. } => ErrorKind::InvalidRange,
            Error::BlockRangeOutOfBounds { .. } => ErrorKind::RangeOutOfBounds,
            Error::DataSizeMismatch { .. } => ErrorKind::SizeMismatch,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::OpenDal { error, .. } if error.kind() == opendal::ErrorKind::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
