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

//! The binary layout of a chunk meta blob.
//!
//! A blob is a fixed size header followed by the envelope wrapped
//! [ChunkMeta]. All header fields are little-endian.
//!
//! ```text
//! v1: | signature: u32 | payload ... |
//! v2: | signature: u32 | checksum: u64 | chunk_id: 16 bytes | payload ... |
//! ```
//!
//! The v2 checksum covers the payload only. A v1 header carries neither a
//! checksum nor a chunk id; readers take the chunk id they asked for.

use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, Bytes, BytesMut};
use snafu::{ensure, ResultExt};
use stratus_types::{
    checksum::{checksum, Checksum},
    chunk_id::CHUNK_ID_BYTES,
    envelope::{deserialize_with_envelope, serialize_with_envelope},
    ChunkId, ChunkMeta,
};

use crate::err::{
    BuildChunkMetaSnafu, ChunkIdMismatchSnafu, MetaChecksumMismatchSnafu, MetaTooShortSnafu,
    ParseMetaSnafu, Result, UnknownMetaSignatureSnafu,
};

pub const CHUNK_META_HEADER_BASE_SIZE: usize = 4;
pub const CHUNK_META_HEADER_V1_SIZE: usize = CHUNK_META_HEADER_BASE_SIZE;
pub const CHUNK_META_HEADER_V2_SIZE: usize = CHUNK_META_HEADER_BASE_SIZE + 8 + CHUNK_ID_BYTES;

pub const CHUNK_META_HEADER_V1_SIGNATURE: u32 = u32::from_le_bytes(*b"CMH1");
pub const CHUNK_META_HEADER_V2_SIGNATURE: u32 = u32::from_le_bytes(*b"CMH2");

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ChunkMetaHeader {
    V1,
    V2 { checksum: Checksum, chunk_id: ChunkId },
}

impl ChunkMetaHeader {
    pub fn signature(&self) -> u32 {
        match self {
            ChunkMetaHeader::V1 => CHUNK_META_HEADER_V1_SIGNATURE,
            ChunkMetaHeader::V2 { .. } => CHUNK_META_HEADER_V2_SIGNATURE,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            ChunkMetaHeader::V1 => CHUNK_META_HEADER_V1_SIZE,
            ChunkMetaHeader::V2 { .. } => CHUNK_META_HEADER_V2_SIZE,
        }
    }

    pub fn encode_to(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.signature());
        if let ChunkMetaHeader::V2 { checksum, chunk_id } = self {
            buf.put_u64_le(*checksum);
            buf.put_slice(&chunk_id.to_le_bytes());
        }
    }

    /// Parse the header at the front of `blob`, dispatching on the signature
    /// of the common base header. Returns the header and the payload
    /// following it.
    pub fn parse<'a>(blob: &'a [u8], file: &str) -> Result<(Self, &'a [u8])> {
        ensure!(
            blob.len() >= CHUNK_META_HEADER_BASE_SIZE,
            MetaTooShortSnafu {
                file,
                len: blob.len(),
                expected: CHUNK_META_HEADER_BASE_SIZE,
            }
        );

        let signature = LittleEndian::read_u32(&blob[..CHUNK_META_HEADER_BASE_SIZE]);
        let header = match signature {
            CHUNK_META_HEADER_V1_SIGNATURE => ChunkMetaHeader::V1,
            CHUNK_META_HEADER_V2_SIGNATURE => {
                ensure!(
                    blob.len() >= CHUNK_META_HEADER_V2_SIZE,
                    MetaTooShortSnafu {
                        file,
                        len: blob.len(),
                        expected: CHUNK_META_HEADER_V2_SIZE,
                    }
                );
                let checksum = LittleEndian::read_u64(&blob[4..12]);
                let mut id = [0u8; CHUNK_ID_BYTES];
                id.copy_from_slice(&blob[12..CHUNK_META_HEADER_V2_SIZE]);
                ChunkMetaHeader::V2 {
                    checksum,
                    chunk_id: ChunkId::from_le_bytes(id),
                }
            }
            _ => return UnknownMetaSignatureSnafu { file, signature }.fail(),
        };
        Ok((header, &blob[header.size()..]))
    }
}

/// Serialize `meta` into a v2 meta blob for `chunk_id`.
pub fn build_chunk_meta_blob(chunk_id: ChunkId, meta: &ChunkMeta) -> Result<Bytes> {
    let payload = serialize_with_envelope(meta).context(BuildChunkMetaSnafu { chunk_id })?;
    let header = ChunkMetaHeader::V2 {
        checksum: checksum(&payload),
        chunk_id,
    };
    Ok(assemble(header, &payload))
}

/// Serialize `meta` into a legacy v1 meta blob. Kept so that chunks written
/// by old writers can be reproduced.
pub fn build_chunk_meta_blob_v1(chunk_id: ChunkId, meta: &ChunkMeta) -> Result<Bytes> {
    let payload = serialize_with_envelope(meta).context(BuildChunkMetaSnafu { chunk_id })?;
    Ok(assemble(ChunkMetaHeader::V1, &payload))
}

fn assemble(header: ChunkMetaHeader, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(header.size() + payload.len());
    header.encode_to(&mut buf);
    buf.put_slice(payload);
    buf.freeze()
}

/// Decode a meta blob of the chunk `expected_chunk_id`.
///
/// `file` only names the blob in error messages.
pub fn decode_chunk_meta_blob(blob: &[u8], expected_chunk_id: ChunkId, file: &str) -> Result<ChunkMeta> {
    let (header, payload) = ChunkMetaHeader::parse(blob, file)?;

    // v1 headers do not carry the chunk id, the caller already knows which
    // chunk it asked for.
    let chunk_id = match header {
        ChunkMetaHeader::V1 => expected_chunk_id,
        ChunkMetaHeader::V2 {
            checksum: expected,
            chunk_id,
        } => {
            let actual = checksum(payload);
            ensure!(
                actual == expected,
                MetaChecksumMismatchSnafu {
                    file,
                    expected,
                    actual,
                    len: blob.len(),
                }
            );
            chunk_id
        }
    };

    ensure!(
        chunk_id == expected_chunk_id,
        ChunkIdMismatchSnafu {
            file,
            expected: expected_chunk_id,
            actual: chunk_id,
        }
    );

    deserialize_with_envelope(payload).context(ParseMetaSnafu { file })
}
