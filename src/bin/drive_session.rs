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

//! Scripted controller session against the simulated transport.
//!
//! Usage: cargo run --bin drive_session -- [drive|stand|full]

use anyhow::Result;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use sthexa_controller::bluetooth::protocol::{decode_command, ControlFrame};
use sthexa_controller::bluetooth::{
    RadioState, SimulatedTransport, TransportEvent, WriteRequest, CHARACTERISTIC_UUID,
};
use sthexa_controller::config::Config;
use sthexa_controller::control::{LoggingHaptics, SharedAttitude, Stick};
use sthexa_controller::controller::{Controller, ControllerHandle, ControllerParts, INBOX_DEPTH};
use sthexa_controller::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let script = args.get(1).map(|s| s.as_str()).unwrap_or("full");

    let transport = SimulatedTransport::new();
    let attitude = SharedAttitude::new();
    let state = AppState::new();
    let (handle, inbox) = ControllerHandle::channel(INBOX_DEPTH);

    let controller = Controller::new(
        ControllerParts {
            config: Config::default(),
            transport: Box::new(transport.clone()),
            haptics: Box::new(LoggingHaptics::new()),
            attitude: Arc::new(attitude.clone()),
            app_state: state.clone(),
        },
        &handle,
    );
    let task = tokio::spawn(controller.run(inbox));

    println!("Bringing up peripheral...");
    handle
        .transport_event(TransportEvent::RadioStateChanged(RadioState::PoweredOn))
        .await;
    handle.transport_event(TransportEvent::ServiceRegistered).await;
    handle.transport_event(TransportEvent::Subscribed).await;
    println!("Status: {}", state.get_status_text());

    match script {
        "drive" => drive(&handle).await,
        "stand" => stand(&handle, &attitude).await?,
        "full" => {
            drive(&handle).await;
            stand(&handle, &attitude).await?;
        }
        _ => {
            println!("Unknown script: {}", script);
            println!("Usage: drive_session [drive|stand|full]");
        }
    }

    handle.transport_event(TransportEvent::Unsubscribed).await;
    handle.shutdown().await;
    task.await?;

    println!("Notifications sent: {}", transport.notifications().len());
    for frame in transport.notifications().iter() {
        println!("  {:?}", decode_command(frame)?);
    }
    println!("Status: {}", state.get_status_text());

    Ok(())
}

async fn drive(handle: &ControllerHandle) {
    println!("Driving forward with the left stick...");
    handle.joystick_drag(Stick::Left, 0.0, -35.0).await;
    sleep(Duration::from_millis(300)).await;

    println!("Turning with the right stick...");
    handle.joystick_drag(Stick::Right, 70.0, 0.0).await;
    sleep(Duration::from_millis(300)).await;

    handle.joystick_release(Stick::Left).await;
    handle.joystick_release(Stick::Right).await;

    println!("Requesting mode update...");
    handle.update_mode().await;
    sleep(Duration::from_millis(200)).await;
}

async fn stand(handle: &ControllerHandle, attitude: &SharedAttitude) -> Result<()> {
    println!("Robot reports WHOLE BODY CONTROL STAND...");
    let frame = ControlFrame::new(6, 0.5).to_bytes().to_vec();
    let results = handle
        .write(vec![WriteRequest::new(CHARACTERISTIC_UUID, frame)])
        .await;
    println!("Write results: {:?}", results);

    attitude.set(0.2, -0.1);
    sleep(Duration::from_millis(300)).await;

    let value = handle.read(CHARACTERISTIC_UUID, 0).await?;
    println!("Read: {:?}", decode_command(&value)?);

    println!("Robot returns to mode 0...");
    let frame = ControlFrame::new(0, 0.0).to_bytes().to_vec();
    handle
        .write(vec![WriteRequest::new(CHARACTERISTIC_UUID, frame)])
        .await;
    sleep(Duration::from_millis(200)).await;
    Ok(())
}
