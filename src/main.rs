// Copyright 2026 Daniel Pelikan
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

//! SThexa Controller Application

mod ui;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sthexa_controller::bluetooth::gatt_server::radio_state_for;
use sthexa_controller::bluetooth::{
    GattServer, PeripheralTransport, TransportEvent, UnavailableTransport,
};
use sthexa_controller::config::Config;
use sthexa_controller::control::{LoggingHaptics, NoAttitude};
use sthexa_controller::controller::{Controller, ControllerHandle, ControllerParts, INBOX_DEPTH};
use sthexa_controller::input::spawn_gamepad;
use sthexa_controller::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("sthexa_controller=info".parse()?))
        .init();

    info!("Starting SThexa Controller v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load()?;
    config.validate()?;
    info!("Configuration loaded");

    let state = AppState::new();
    let (handle, inbox) = ControllerHandle::channel(INBOX_DEPTH);

    // Initialize BLE GATT server
    let transport: Box<dyn PeripheralTransport> =
        match GattServer::new(handle.clone(), config.bluetooth.notify_queue_depth).await {
            Ok((server, transport)) => {
                tokio::spawn(async move {
                    if let Err(e) = server.run().await {
                        error!("GATT server stopped: {}", e);
                    }
                });
                Box::new(transport)
            }
            Err(e) => {
                error!("Failed to initialize BLE GATT server: {}", e);
                let radio = radio_state_for(&e);
                let handle = handle.clone();
                tokio::spawn(async move {
                    handle
                        .transport_event(TransportEvent::RadioStateChanged(radio))
                        .await;
                });
                Box::new(UnavailableTransport::new(radio))
            }
        };

    let gamepad_task = spawn_gamepad(&config.gamepad, handle.clone());

    // No IMU on the desktop host; mode 6 reports it and keeps running.
    let controller = Controller::new(
        ControllerParts {
            config,
            transport,
            haptics: Box::new(LoggingHaptics::new()),
            attitude: Arc::new(NoAttitude),
            app_state: state.clone(),
        },
        &handle,
    );
    let controller_task = tokio::spawn(controller.run(inbox));

    // Start system tray
    let (mut action_rx, tray_handle) = ui::run_tray(state.clone())?;
    let mut refresh = tokio::time::interval(Duration::from_secs(1));

    info!("Ready. System tray active.");

    loop {
        tokio::select! {
            Some(action) = action_rx.recv() => {
                match action {
                    ui::TrayAction::UpdateMode => {
                        info!("Mode update requested");
                        handle.update_mode().await;
                    }
                    ui::TrayAction::Quit => {
                        info!("Quit requested");
                        break;
                    }
                }
            }
            _ = refresh.tick() => {
                tray_handle.update(|_| {});
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    if let Some(task) = gamepad_task {
        task.abort();
    }
    handle.shutdown().await;
    if let Err(e) = controller_task.await {
        warn!("Controller task ended abnormally: {}", e);
    }

    info!("SThexa Controller stopped");
    Ok(())
}
