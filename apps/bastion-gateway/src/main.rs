// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use bastion_gateway::config::GatewayConfig;
use bastion_gateway::gateway::{shutdown_signal, Gateway, GatewayError};
use bastion_gateway::logging::{init_tracing, LogFormat};
use bastion_gateway::provider::AwsIdentityProvider;

async fn run() -> Result<(), GatewayError> {
    let config = GatewayConfig::from_env()?;

    if config.allowed_groups.is_empty() {
        info!("No allowed groups configured, every authenticated user is let through");
    } else {
        info!(groups = ?config.allowed_groups, "Restricting access to allowed groups");
    }
    info!(upstream = %config.upstream, bind = %config.bind_addr, "Starting bastion gateway");

    let provider = Arc::new(AwsIdentityProvider::from_env().await);
    let gateway = Gateway::new(config, provider)?;
    gateway.run(shutdown_signal()).await
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(LogFormat::from_env());

    match run().await {
        Ok(()) => {
            info!("Bastion gateway stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Bastion gateway failed");
            ExitCode::FAILURE
        }
    }
}
