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

use std::path::Path;

use serde::{Deserialize, Serialize};
use stratus_common::STRATUS_DEBUG_BUCKET;

pub type ObjectStorage = opendal::Operator;

pub type ObjectStorageError = opendal::Error;

pub fn is_not_found_error(e: &ObjectStorageError) -> bool {
    e.kind() == opendal::ErrorKind::NotFound
}

/// Connection settings of an S3 compatible service.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct S3Config {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// All keys are resolved relative to this root inside the bucket.
    pub root: String,
}

impl Default for S3Config {
    fn default() -> Self {
        // a local minio.
        Self {
            endpoint: "http://localhost:9000".to_string(),
            region: "us-east-1".to_string(),
            bucket: STRATUS_DEBUG_BUCKET.to_string(),
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
            root: "/".to_string(),
        }
    }
}

pub fn new_memory_object_storage(root: &str) -> Result<ObjectStorage, ObjectStorageError> {
    let mut builder = opendal::services::Memory::default();
    builder.root(root);
    Ok(opendal::Operator::new(builder)?.finish())
}

pub fn new_fs_object_storage<P: AsRef<Path>>(path: P) -> Result<ObjectStorage, ObjectStorageError> {
    let path = path.as_ref();
    std::fs::create_dir_all(path).map_err(|e| {
        opendal::Error::new(
            opendal::ErrorKind::Unexpected,
            &format!("failed to create {}", path.display()),
        )
        .set_source(e)
    })?;
    let mut builder = opendal::services::Fs::default();
    builder.root(&path.to_string_lossy());
    Ok(opendal::Operator::new(builder)?.finish())
}

pub fn new_s3_object_storage(config: &S3Config) -> Result<ObjectStorage, ObjectStorageError> {
    let mut builder = opendal::services::S3::default();
    builder
        .endpoint(&config.endpoint)
        .region(&config.region)
        .bucket(&config.bucket)
        .access_key_id(&config.access_key_id)
        .secret_access_key(&config.secret_access_key)
        .root(&config.root);
    Ok(opendal::Operator::new(builder)?.finish())
}
