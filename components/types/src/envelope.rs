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

//! A self-describing wrapper around a bincode payload.
//!
//! Layout, little-endian:
//!
//! ```text
//! | magic: u32 | codec: u32 | payload_len: u64 | payload ... |
//! ```

use byteorder::{ByteOrder, LittleEndian};
use serde::{de::DeserializeOwned, Serialize};
use snafu::{ensure, ResultExt};

use crate::err::{
    DecodeEnvelopeSnafu, EncodeEnvelopeSnafu, EnvelopeLengthMismatchSnafu, EnvelopeTooShortSnafu,
    InvalidEnvelopeMagicSnafu, Result, UnsupportedEnvelopeCodecSnafu,
};

pub const ENVELOPE_MAGIC: u32 = u32::from_le_bytes(*b"ENV1");
pub const ENVELOPE_HEADER_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u32)]
pub enum Codec {
    None = 0,
}

impl TryFrom<u32> for Codec {
    type Error = u32;

    fn try_from(value: u32) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Codec::None),
            other => Err(other),
        }
    }
}

pub fn serialize_with_envelope<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let payload = bincode::serialize(value).context(EncodeEnvelopeSnafu)?;
    let mut buf = vec![0u8; ENVELOPE_HEADER_SIZE];
    LittleEndian::write_u32(&mut buf[0..4], ENVELOPE_MAGIC);
    LittleEndian::write_u32(&mut buf[4..8], Codec::None as u32);
    LittleEndian::write_u64(&mut buf[8..16], payload.len() as u64);
    buf.extend_from_slice(&payload);
    Ok(buf)
}

pub fn deserialize_with_envelope<T: DeserializeOwned>(buf: &[u8]) -> Result<T> {
    ensure!(
        buf.len() >= ENVELOPE_HEADER_SIZE,
        EnvelopeTooShortSnafu {
            len: buf.len(),
            expected: ENVELOPE_HEADER_SIZE,
        }
    );
    let (header, payload) = buf.split_at(ENVELOPE_HEADER_SIZE);
    let magic = LittleEndian::read_u32(&header[0..4]);
    ensure!(magic == ENVELOPE_MAGIC, InvalidEnvelopeMagicSnafu { magic });

    let codec = LittleEndian::read_u32(&header[4..8]);
    match Codec::try_from(codec) {
        Ok(Codec::None) => {}
        Err(codec) => return UnsupportedEnvelopeCodecSnafu { codec }.fail(),
    }

    let declared = LittleEndian::read_u64(&header[8..16]);
    ensure!(
        declared == payload.len() as u64,
        EnvelopeLengthMismatchSnafu {
            declared,
            actual: payload.len() as u64,
        }
    );

    bincode::deserialize(payload).context(DecodeEnvelopeSnafu)
}
