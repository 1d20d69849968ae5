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

use snafu::{ResultExt, Whatever};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// The environment variable overriding the default filter directive.
pub const LOG_ENV: &str = "STRATUS_LOG";

/// Configuration for stratus logging.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The default filter directive (in the sense of
    /// [tracing_subscriber::filter::EnvFilter]). Overridden by the
    /// `STRATUS_LOG` environment variable if set.
    pub default_filter: String,
    pub ansi: bool,
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            ansi: false,
            with_target: false,
        }
    }
}

impl LoggingConfig {
    pub fn init_tracing_subscriber(self) -> Result<(), Whatever> {
        let env_filter = create_env_filter(&self.default_filter);
        // Don't create the subscriber if we'll never emit any logs
        if env_filter.max_level_hint() == Some(LevelFilter::OFF) {
            return Ok(());
        }

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_ansi(self.ansi)
            .with_target(self.with_target)
            .with_writer(std::io::stderr)
            .with_filter(env_filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .whatever_context("failed to install the tracing subscriber")?;
        tracing::debug!("logging started");
        Ok(())
    }
}

fn create_env_filter(filter: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(filter))
}

/// Install a pretty stdout subscriber, used by tests and debugging.
///
/// Safe to call more than once, only the first call takes effect.
pub fn install_fmt_log() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(create_env_filter("debug"))
        .with_test_writer()
        .try_init();
}
