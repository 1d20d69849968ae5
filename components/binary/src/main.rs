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

mod cmd;

use clap::{Parser, Subcommand};
use snafu::{ResultExt, Whatever};
use stratus_utils::logger::LoggingConfig;

use crate::cmd::{get::GetArgs, meta::MetaArgs, put::PutArgs};

const LOGGING_OPTIONS_HEADER: &str = "Logging options";

#[derive(Debug, Parser)]
#[command(name = "stratus", about = "Write and read chunks on object storage", version)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,

    #[arg(
        long,
        global = true,
        help = "Default log filter, overridden by STRATUS_LOG",
        help_heading = LOGGING_OPTIONS_HEADER,
        value_name = "FILTER",
        default_value = "info",
    )]
    log_filter: String,

    #[arg(
        long,
        global = true,
        help = "Number of threads to use for tokio async runtime",
        default_value = "4"
    )]
    async_work_threads: usize,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Put(PutArgs),
    Get(GetArgs),
    Meta(MetaArgs),
}

fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();
    LoggingConfig {
        default_filter: cli.log_filter.clone(),
        ..Default::default()
    }
    .init_tracing_subscriber()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cli.async_work_threads.max(1))
        .thread_name("stratus-worker")
        .enable_all()
        .build()
        .whatever_context("failed to build the tokio runtime")?;

    runtime.block_on(async move {
        match cli.commands {
            Commands::Put(args) => args.run().await,
            Commands::Get(args) => args.run().await,
            Commands::Meta(args) => args.run().await,
        }
    })
}
