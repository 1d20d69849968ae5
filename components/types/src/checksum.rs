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

use crc::{Crc, CRC_64_ECMA_182};

pub type Checksum = u64;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

/// The checksum used for both block data and the chunk meta payload.
/// Every writer must use this exact function, otherwise readers will
/// reject the chunk.
pub fn checksum(data: &[u8]) -> Checksum {
    CRC64.checksum(data)
}
