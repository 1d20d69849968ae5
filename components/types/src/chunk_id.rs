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

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use snafu::{ensure, ResultExt};

use crate::err::{Error, InvalidChunkIdStrSnafu, ParseChunkIdFailedSnafu};

pub const CHUNK_ID_BYTES: usize = 16;

/// ChunkId identifies a chunk globally.
///
/// It is rendered as four 32-bit hex words, the most significant first,
/// e.g. `1a-0-ff-12`. That form is part of the object key of the chunk,
/// so it must never change.
#[derive(Debug, Default, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ChunkId(u128);

impl ChunkId {
    pub const NULL: ChunkId = ChunkId(0);

    pub fn from_parts(parts: [u32; 4]) -> Self {
        let id = parts
            .iter()
            .fold(0u128, |acc, part| (acc << 32) | u128::from(*part));
        ChunkId(id)
    }

    pub fn random() -> Self {
        ChunkId(rand::random::<u128>())
    }

    /// The most significant word first.
    pub fn parts(&self) -> [u32; 4] {
        [
            (self.0 >> 96) as u32,
            (self.0 >> 64) as u32,
            (self.0 >> 32) as u32,
            self.0 as u32,
        ]
    }

    pub fn to_le_bytes(&self) -> [u8; CHUNK_ID_BYTES] {
        self.0.to_le_bytes()
    }

    pub fn from_le_bytes(bytes: [u8; CHUNK_ID_BYTES]) -> Self {
        ChunkId(u128::from_le_bytes(bytes))
    }
}

impl Display for ChunkId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d] = self.parts();
        write!(f, "{:x}-{:x}-{:x}-{:x}", a, b, c, d)
    }
}

impl FromStr for ChunkId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split('-')
            .map(|part| u32::from_str_radix(part, 16))
            .collect::<Result<Vec<_>, _>>()
            .context(ParseChunkIdFailedSnafu { str: s.to_string() })?;
        ensure!(parts.len() == 4, InvalidChunkIdStrSnafu { str: s.to_string() });
        Ok(ChunkId::from_parts([parts[0], parts[1], parts[2], parts[3]]))
    }
}

impl TryFrom<&str> for ChunkId {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        ChunkId::from_str(s)
    }
}
