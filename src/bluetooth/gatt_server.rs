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

//! BlueZ GATT server backing `PeripheralTransport`.
//!
//! `GattServer` runs as its own task: it executes registration and
//! advertising commands from the controller, forwards read/write requests
//! into the controller inbox, and reports power and subscription changes.

use anyhow::Result;
use bluer::adv::{Advertisement, AdvertisementHandle};
use bluer::gatt::local::{
    Application, ApplicationHandle, Characteristic, CharacteristicNotifier, CharacteristicNotify,
    CharacteristicNotifyMethod, CharacteristicRead, CharacteristicReadRequest,
    CharacteristicWrite, CharacteristicWriteMethod, CharacteristicWriteRequest, ReqError, Service,
};
use bluer::{Adapter, AdapterEvent, AdapterProperty};
use futures::{pin_mut, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::ble_constants::*;
use super::peripheral::{AttError, WriteRequest};
use super::transport::{PeripheralTransport, RadioState, TransportError, TransportEvent};
use crate::controller::ControllerHandle;

type NotifySlot = Arc<Mutex<Option<mpsc::Sender<Vec<u8>>>>>;

/// Commands executed by the server task.
#[derive(Debug)]
enum ServerCommand {
    RegisterService,
    StartAdvertising { local_name: String, service: Uuid },
    StopAdvertising,
}

/// Controller-side handle to the BlueZ server.
pub struct BluerTransport {
    commands: mpsc::UnboundedSender<ServerCommand>,
    notify_tx: NotifySlot,
}

impl BluerTransport {
    fn command(&self, command: ServerCommand) -> Result<(), TransportError> {
        self.commands
            .send(command)
            .map_err(|_| TransportError::Failed("GATT server task stopped".to_string()))
    }
}

impl PeripheralTransport for BluerTransport {
    fn backend_name(&self) -> &'static str {
        "BlueZ"
    }

    fn register_service(&mut self) -> Result<(), TransportError> {
        self.command(ServerCommand::RegisterService)
    }

    fn start_advertising(&mut self, local_name: &str, service: Uuid) -> Result<(), TransportError> {
        self.command(ServerCommand::StartAdvertising {
            local_name: local_name.to_string(),
            service,
        })
    }

    fn stop_advertising(&mut self) -> Result<(), TransportError> {
        self.command(ServerCommand::StopAdvertising)
    }

    fn notify(&mut self, value: Vec<u8>) -> Result<(), TransportError> {
        let guard = self.notify_tx.lock();
        let tx = guard.as_ref().ok_or(TransportError::Closed)?;
        tx.try_send(value).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }
}

/// Map an ATT error to the BlueZ error reply.
fn req_error(err: AttError) -> ReqError {
    match err {
        AttError::InvalidOffset => ReqError::InvalidOffset,
        AttError::ReadNotPermitted | AttError::WriteNotPermitted => ReqError::NotPermitted,
        AttError::InvalidAttributeValueLength => ReqError::InvalidValueLength,
        AttError::Unlikely => ReqError::Failed,
    }
}

/// Classify a BlueZ session/adapter error.
pub fn radio_state_for(err: &bluer::Error) -> RadioState {
    match err.kind {
        bluer::ErrorKind::NotAuthorized | bluer::ErrorKind::NotPermitted => RadioState::Unauthorized,
        bluer::ErrorKind::NotReady => RadioState::PoweredOff,
        _ => RadioState::Unsupported,
    }
}

/// GATT server task for the transfer service.
pub struct GattServer {
    adapter: Adapter,
    controller: ControllerHandle,
    commands: mpsc::UnboundedReceiver<ServerCommand>,
    notify_tx: NotifySlot,
    notify_queue_depth: usize,
    adv_handle: Option<AdvertisementHandle>,
    app_handle: Option<ApplicationHandle>,
}

impl GattServer {
    /// Open the default adapter and create the server plus its transport handle.
    pub async fn new(
        controller: ControllerHandle,
        notify_queue_depth: usize,
    ) -> Result<(Self, BluerTransport), bluer::Error> {
        info!("Initializing BLE GATT server...");

        let session = bluer::Session::new().await?;
        info!("BlueZ session created");

        let adapter = session.default_adapter().await?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let notify_tx: NotifySlot = Arc::new(Mutex::new(None));

        let server = Self {
            adapter,
            controller,
            commands: command_rx,
            notify_tx: notify_tx.clone(),
            notify_queue_depth: notify_queue_depth.max(1),
            adv_handle: None,
            app_handle: None,
        };
        let transport = BluerTransport {
            commands: command_tx,
            notify_tx,
        };
        Ok((server, transport))
    }

    /// Report the initial power state, then serve commands and adapter events.
    pub async fn run(mut self) -> Result<()> {
        let radio = match self.adapter.is_powered().await {
            Ok(true) => RadioState::PoweredOn,
            Ok(false) => RadioState::PoweredOff,
            Err(e) => {
                error!("Failed to query adapter power: {}", e);
                radio_state_for(&e)
            }
        };
        self.controller
            .transport_event(TransportEvent::RadioStateChanged(radio))
            .await;

        let events = self.adapter.events().await?;
        pin_mut!(events);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.execute(command).await,
                    None => {
                        info!("Controller dropped the transport, stopping GATT server");
                        break;
                    }
                },
                Some(event) = events.next() => self.on_adapter_event(event).await,
            }
        }

        Ok(())
    }

    async fn on_adapter_event(&mut self, event: AdapterEvent) {
        if let AdapterEvent::PropertyChanged(AdapterProperty::Powered(powered)) = event {
            info!("Adapter powered: {}", powered);
            let radio = if powered {
                RadioState::PoweredOn
            } else {
                RadioState::PoweredOff
            };
            self.controller
                .transport_event(TransportEvent::RadioStateChanged(radio))
                .await;
        }
    }

    async fn execute(&mut self, command: ServerCommand) {
        debug!("GATT server command: {:?}", command);
        match command {
            ServerCommand::RegisterService => {
                // Dropping the old handle unregisters a stale application.
                self.app_handle = None;
                let event = match self.register_gatt_service().await {
                    Ok(handle) => {
                        self.app_handle = Some(handle);
                        info!("GATT service registered");
                        TransportEvent::ServiceRegistered
                    }
                    Err(e) => TransportEvent::ServiceRegistrationFailed(e.to_string()),
                };
                self.controller.transport_event(event).await;
            }
            ServerCommand::StartAdvertising {
                local_name,
                service,
            } => {
                self.adv_handle = None;
                let adv = Advertisement {
                    service_uuids: vec![service].into_iter().collect(),
                    discoverable: Some(true),
                    local_name: Some(local_name),
                    ..Default::default()
                };
                match self.adapter.advertise(adv).await {
                    Ok(handle) => {
                        self.adv_handle = Some(handle);
                        info!("BLE advertising started");
                    }
                    Err(e) => error!("Failed to advertise: {}", e),
                }
            }
            ServerCommand::StopAdvertising => {
                if self.adv_handle.take().is_some() {
                    info!("BLE advertising stopped");
                }
            }
        }
    }

    /// Register the transfer service with BlueZ.
    async fn register_gatt_service(&self) -> bluer::Result<ApplicationHandle> {
        let read_controller = self.controller.clone();
        let write_controller = self.controller.clone();
        let notify_controller = self.controller.clone();
        let notify_tx = self.notify_tx.clone();
        let queue_depth = self.notify_queue_depth;

        let transfer_char = Characteristic {
            uuid: CHARACTERISTIC_UUID,
            read: Some(CharacteristicRead {
                read: true,
                fun: Box::new(move |req: CharacteristicReadRequest| {
                    let controller = read_controller.clone();
                    Box::pin(async move {
                        controller
                            .read(CHARACTERISTIC_UUID, req.offset as usize)
                            .await
                            .map_err(req_error)
                    })
                }),
                ..Default::default()
            }),
            write: Some(CharacteristicWrite {
                write: true,
                method: CharacteristicWriteMethod::Fun(Box::new(
                    move |data: Vec<u8>, _req: CharacteristicWriteRequest| {
                        let controller = write_controller.clone();
                        Box::pin(async move {
                            // BlueZ delivers one request per call.
                            let results = controller
                                .write(vec![WriteRequest::new(CHARACTERISTIC_UUID, data)])
                                .await;
                            results
                                .into_iter()
                                .next()
                                .unwrap_or(Err(AttError::Unlikely))
                                .map_err(req_error)
                        })
                    },
                )),
                ..Default::default()
            }),
            notify: Some(CharacteristicNotify {
                notify: true,
                method: CharacteristicNotifyMethod::Fun(Box::new(
                    move |notifier: CharacteristicNotifier| {
                        let controller = notify_controller.clone();
                        let notify_tx = notify_tx.clone();
                        Box::pin(Self::notify_session(notifier, controller, notify_tx, queue_depth))
                    },
                )),
                ..Default::default()
            }),
            ..Default::default()
        };

        let service = Service {
            uuid: SERVICE_UUID,
            primary: true,
            characteristics: vec![transfer_char],
            ..Default::default()
        };

        let app = Application {
            services: vec![service],
            ..Default::default()
        };

        self.adapter.serve_gatt_application(app).await
    }

    /// Lifetime of one subscription: forward queued frames until the central stops.
    async fn notify_session(
        mut notifier: CharacteristicNotifier,
        controller: ControllerHandle,
        notify_tx: NotifySlot,
        queue_depth: usize,
    ) {
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(queue_depth);
        *notify_tx.lock() = Some(tx.clone());
        info!("Central subscribed to notifications");
        controller.transport_event(TransportEvent::Subscribed).await;

        loop {
            let next = tokio::select! {
                value = rx.recv() => value,
                _ = notifier.stopped() => None,
            };
            let Some(value) = next else {
                break;
            };
            if let Err(e) = notifier.notify(value).await {
                warn!("Failed to send notification: {}", e);
                break;
            }
        }

        if release_slot(&notify_tx, &tx) {
            info!("Central unsubscribed");
            controller.transport_event(TransportEvent::Unsubscribed).await;
        } else {
            debug!("Notify session replaced by a newer subscription");
        }
    }
}

/// Clear the slot if it still holds `own`. A newer session keeps its sender.
fn release_slot(slot: &NotifySlot, own: &mpsc::Sender<Vec<u8>>) -> bool {
    let mut guard = slot.lock();
    match guard.as_ref() {
        Some(current) if current.same_channel(own) => {
            *guard = None;
            true
        }
        _ => false,
    }
}
