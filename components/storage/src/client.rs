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
    collections::HashMap,
    fmt::{Debug, Display, Formatter},
    sync::Arc,
};

use async_trait::async_trait;
use bytes::Bytes;
use snafu::{OptionExt, ResultExt};
use stratus_utils::object_storage::ObjectStorage;
use tracing::trace;

use crate::err::{OpenDalSnafu, Result, UnknownBucketSnafu};

/// An inclusive byte range, `bytes=first-last` in RFC 7233 terms.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ByteRange {
    pub first: u64,
    pub last: u64,
}

impl ByteRange {
    /// The range covering `len > 0` bytes starting at `offset`.
    pub fn with_len(offset: u64, len: u64) -> Self {
        debug_assert!(len > 0);
        Self {
            first: offset,
            last: offset + len - 1,
        }
    }

    pub fn len(&self) -> u64 {
        self.last - self.first + 1
    }
}

impl Display for ByteRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "bytes={}-{}", self.first, self.last)
    }
}

#[derive(Debug, Clone)]
pub struct GetObjectRequest {
    pub bucket: String,
    pub key: String,
    pub range: Option<ByteRange>,
}

#[derive(Debug, Clone)]
pub struct GetObjectResponse {
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub data: Bytes,
}

pub type ObjectClientRef = Arc<dyn ObjectClient>;

/// The object storage operations chunk readers and writers depend on.
#[async_trait]
pub trait ObjectClient: Send + Sync + Debug + 'static {
    async fn get_object(&self, request: GetObjectRequest) -> Result<GetObjectResponse>;
    async fn put_object(&self, request: PutObjectRequest) -> Result<()>;
}

/// OpendalClient serves each bucket through its own opendal operator.
#[derive(Debug, Default, Clone)]
pub struct OpendalClient {
    buckets: HashMap<String, ObjectStorage>,
}

impl OpendalClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>, storage: ObjectStorage) -> Self {
        self.buckets.insert(bucket.into(), storage);
        self
    }

    fn storage(&self, bucket: &str) -> Result<&ObjectStorage> {
        self.buckets
            .get(bucket)
            .context(UnknownBucketSnafu { bucket })
    }
}

#[async_trait]
impl ObjectClient for OpendalClient {
    async fn get_object(&self, request: GetObjectRequest) -> Result<GetObjectResponse> {
        let storage = self.storage(&request.bucket)?;
        let data = match request.range {
            Some(range) => {
                trace!(bucket = %request.bucket, key = %request.key, %range, "get object");
                storage
                    .read_with(&request.key)
                    .range(range.first..range.last + 1)
                    .await
            }
            None => {
                trace!(bucket = %request.bucket, key = %request.key, "get object");
                storage.read(&request.key).await
            }
        }
        .context(OpenDalSnafu)?;
        Ok(GetObjectResponse {
            data: Bytes::from(data),
        })
    }

    async fn put_object(&self, request: PutObjectRequest) -> Result<()> {
        let storage = self.storage(&request.bucket)?;
        trace!(bucket = %request.bucket, key = %request.key, len = request.data.len(), "put object");
        storage
            .write(&request.key, request.data)
            .await
            .context(OpenDalSnafu)
    }
}
