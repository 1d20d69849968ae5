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
    sync::Arc,
};

use stratus_common::{CHUNK_DATA_KEY_PREFIX, CHUNK_META_SUFFIX};
use stratus_types::ChunkId;

use crate::{client::ObjectClientRef, config::S3MediumConfig};

/// Where an object lives in the object storage.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ObjectPlacement {
    pub bucket: String,
    pub key: String,
}

impl Display for ObjectPlacement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

pub type S3MediumRef = Arc<S3Medium>;

/// S3Medium is an object storage medium chunks are persisted to: the
/// client to talk to it and the naming of chunk objects inside it.
#[derive(Debug)]
pub struct S3Medium {
    client: ObjectClientRef,
    config: S3MediumConfig,
}

impl S3Medium {
    pub fn new(client: ObjectClientRef, config: S3MediumConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> ObjectClientRef {
        self.client.clone()
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    pub fn chunk_placement(&self, chunk_id: ChunkId) -> ObjectPlacement {
        let prefix = self.config.key_prefix.as_deref().unwrap_or_default();
        ObjectPlacement {
            bucket: self.config.bucket.clone(),
            key: format!("{}{}{}", prefix, CHUNK_DATA_KEY_PREFIX, chunk_id),
        }
    }

    pub fn chunk_meta_placement(chunk_placement: &ObjectPlacement) -> ObjectPlacement {
        ObjectPlacement {
            bucket: chunk_placement.bucket.clone(),
            key: format!("{}{}", chunk_placement.key, CHUNK_META_SUFFIX),
        }
    }
}
