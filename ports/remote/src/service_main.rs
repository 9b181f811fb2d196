// Copyright 2025 HEM Sp. z o.o.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod cli;
mod logger;

use clap::Parser;
use log::{debug, error, info};
use pnut_core::{ExitReason, RemoteConfig, RemoteService, ServiceError};
use tokio::runtime::Runtime;

use crate::cli::Cli;
use crate::logger::init_logger;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Err(e) = init_logger(&cli.log_dir, cli.log_level, cli.console) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    let config_path = cli.config.unwrap_or_else(RemoteConfig::default_path);
    let config = RemoteConfig::load(&config_path)?;

    // device calls are blocked on from the scheduler thread, which needs worker threads
    let runtime = Runtime::new()?;

    let service = match RemoteService::from_config(&config, runtime.handle().clone()) {
        Ok(service) => service,
        Err(ServiceError::Dongle(e)) => {
            error!("Remote receiver unavailable: {}", e);
            eprintln!("Remote receiver unavailable: {}", e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let exit = service.exit_signal();
    runtime.spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C signal, exiting...");
                exit.set();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    info!("Listening for remote button presses");
    let reason = service.wait();
    service.shutdown();
    if let ExitReason::DeviceLost(e) = &reason {
        error!("Remote receiver lost: {}", e);
        eprintln!("Remote receiver lost: {}", e);
        std::process::exit(1);
    }
    debug!("Remote service exited ({:?})", reason);
    Ok(())
}
