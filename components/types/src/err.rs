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

use std::num::ParseIntError;

use snafu::{Location, Snafu};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("block checksum mismatch: expected {expected:#x}, actual {actual:#x}"))]
    BlockChecksumMismatch {
        expected: u64,
        actual: u64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("invalid chunk id {str:?}"))]
    InvalidChunkIdStr {
        str: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to parse chunk id {str:?}"))]
    ParseChunkIdFailed {
        str: String,
        #[snafu(implicit)]
        location: Location,
        source: ParseIntError,
    },

    #[snafu(display("failed to encode chunk meta extension {name}"))]
    EncodeExtension {
        name: String,
        #[snafu(implicit)]
        location: Location,
        source: bincode::Error,
    },
    #[snafu(display("failed to decode chunk meta extension {name}"))]
    DecodeExtension {
        name: String,
        #[snafu(implicit)]
        location: Location,
        source: bincode::Error,
    },

    #[snafu(display(
        "block extent {index} is inconsistent: offset {offset}, size {size}, expected offset {expected_offset}"
    ))]
    InconsistentBlockExtent {
        index: usize,
        offset: i64,
        size: i64,
        expected_offset: i64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("envelope is too short: {len} bytes, at least {expected} expected"))]
    EnvelopeTooShort {
        len: usize,
        expected: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("incorrect envelope magic {magic:#x}"))]
    InvalidEnvelopeMagic {
        magic: u32,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("unsupported envelope codec {codec}"))]
    UnsupportedEnvelopeCodec {
        codec: u32,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("envelope payload length mismatch: declared {declared}, actual {actual}"))]
    EnvelopeLengthMismatch {
        declared: u64,
        actual: u64,
        #[snafu(implicit)]
        location: Location,
    },
    EncodeEnvelope {
        #[snafu(implicit)]
        location: Location,
        source: bincode::Error,
    },
    DecodeEnvelope {
        #[snafu(implicit)]
        location: Location,
        source: bincode::Error,
    },
}

impl Error {
    pub fn is_checksum_mismatch(&self) -> bool {
        matches!(self, Error::BlockChecksumMismatch { .. })
    }
}
