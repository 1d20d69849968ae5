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

use std::{path::PathBuf, sync::Arc};

use clap::Args;
use snafu::{ResultExt, Whatever};
use stratus_common::STRATUS_DEBUG_BUCKET;
use stratus_storage::{OpendalClient, S3Medium, S3MediumConfig, S3MediumRef};
use stratus_utils::object_storage::{new_fs_object_storage, new_s3_object_storage, S3Config};
use tracing::debug;

const STORAGE_OPTIONS_HEADER: &str = "Storage options";

/// Where chunks live. A local directory when `--fs-root` is given, an S3
/// compatible service otherwise.
#[derive(Debug, Clone, Args)]
pub struct StorageArgs {
    #[arg(
        long,
        help = "Keep chunks in a local directory instead of S3",
        help_heading = STORAGE_OPTIONS_HEADER,
        value_name = "DIRECTORY",
    )]
    pub fs_root: Option<PathBuf>,

    #[arg(
        long,
        env = "STRATUS_S3_ENDPOINT",
        help_heading = STORAGE_OPTIONS_HEADER,
        default_value = "http://localhost:9000",
    )]
    pub endpoint: String,

    #[arg(
        long,
        env = "STRATUS_S3_REGION",
        help_heading = STORAGE_OPTIONS_HEADER,
        default_value = "us-east-1",
    )]
    pub region: String,

    #[arg(
        long,
        env = "STRATUS_S3_BUCKET",
        help_heading = STORAGE_OPTIONS_HEADER,
        default_value = STRATUS_DEBUG_BUCKET,
    )]
    pub bucket: String,

    #[arg(
        long,
        env = "AWS_ACCESS_KEY_ID",
        hide_env_values = true,
        help_heading = STORAGE_OPTIONS_HEADER,
        default_value = "minioadmin",
    )]
    pub access_key_id: String,

    #[arg(
        long,
        env = "AWS_SECRET_ACCESS_KEY",
        hide_env_values = true,
        help_heading = STORAGE_OPTIONS_HEADER,
        default_value = "minioadmin",
    )]
    pub secret_access_key: String,

    #[arg(
        long,
        help = "Prefix of every object key, like 'cluster-a/'",
        help_heading = STORAGE_OPTIONS_HEADER,
    )]
    pub key_prefix: Option<String>,
}

impl StorageArgs {
    pub fn open_medium(&self) -> Result<S3MediumRef, Whatever> {
        let storage = match &self.fs_root {
            Some(root) => {
                debug!(root = %root.display(), "use local object storage");
                new_fs_object_storage(root).with_whatever_context(|e| {
                    format!("failed to open object storage at {}: {}", root.display(), e)
                })?
            }
            None => {
                debug!(endpoint = %self.endpoint, bucket = %self.bucket, "use s3 object storage");
                new_s3_object_storage(&S3Config {
                    endpoint: self.endpoint.clone(),
                    region: self.region.clone(),
                    bucket: self.bucket.clone(),
                    access_key_id: self.access_key_id.clone(),
                    secret_access_key: self.secret_access_key.clone(),
                    ..Default::default()
                })
                .with_whatever_context(|e| {
                    format!("failed to connect to {}: {}", self.endpoint, e)
                })?
            }
        };

        let client = OpendalClient::new().with_bucket(&self.bucket, storage);
        Ok(Arc::new(S3Medium::new(
            Arc::new(client),
            S3MediumConfig {
                bucket: self.bucket.clone(),
                key_prefix: self.key_prefix.clone(),
            },
        )))
    }
}
