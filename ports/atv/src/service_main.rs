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

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use pnut_atv_service::{build_router, AppState, AtvServiceConfig, HassConnector};
use pnut_core::devices::HassClient;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file, defaults to $PNUT_ATV_CONFIG or atv.json
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listening port
    #[arg(short, long)]
    port: Option<u16>,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C signal, exiting...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = AtvServiceConfig::load(&cli.config.unwrap_or_else(AtvServiceConfig::default_path))?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    let hass = Arc::new(HassClient::new(&config.home_assistant.url, config.home_assistant.resolve_token()?)?);
    let state = AppState::new(Arc::new(HassConnector::new(hass, &config.entity)));
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!("Apple TV service listening on {}", listener.local_addr()?);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    state.close().await;
    Ok(())
}
