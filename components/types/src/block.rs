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

use bytes::Bytes;
use snafu::ensure;

use crate::{
    checksum::{checksum, Checksum},
    err::{BlockChecksumMismatchSnafu, Result},
};

/// Block is one checksummed piece of a chunk's data region.
///
/// The checksum is optional: a block without one is trusted as is,
/// and the checksum is computed from the data when somebody asks for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub data: Bytes,
    checksum: Option<Checksum>,
}

impl Block {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            checksum: None,
        }
    }

    pub fn with_checksum(data: impl Into<Bytes>, checksum: Checksum) -> Self {
        Self {
            data: data.into(),
            checksum: Some(checksum),
        }
    }

    /// Build a block whose checksum is computed right away.
    pub fn checksummed(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let checksum = checksum(&data);
        Self {
            data,
            checksum: Some(checksum),
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn checksum(&self) -> Option<Checksum> {
        self.checksum
    }

    pub fn get_or_compute_checksum(&self) -> Checksum {
        self.checksum.unwrap_or_else(|| checksum(&self.data))
    }

    pub fn validate_checksum(&self) -> Result<()> {
        if let Some(expected) = self.checksum {
            let actual = checksum(&self.data);
            ensure!(
                expected == actual,
                BlockChecksumMismatchSnafu { expected, actual }
            );
        }
        Ok(())
    }
}
