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

//! System tray implementation using ksni.

use anyhow::Result;
use ksni::{self, menu::StandardItem, Handle, MenuItem, Tray, TrayService};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use sthexa_controller::state::{AppState, ConnectionStatus};

/// Actions that can be triggered from the tray menu.
#[derive(Debug, Clone)]
pub enum TrayAction {
    UpdateMode,
    Quit,
}

/// System tray icon and menu.
pub struct SthexaTray {
    state: Arc<AppState>,
    action_tx: mpsc::UnboundedSender<TrayAction>,
}

impl SthexaTray {
    pub fn new(state: Arc<AppState>, action_tx: mpsc::UnboundedSender<TrayAction>) -> Self {
        Self { state, action_tx }
    }
}

impl Tray for SthexaTray {
    fn icon_name(&self) -> String {
        self.state.get_status().icon_name().to_string()
    }

    fn title(&self) -> String {
        "SThexa".to_string()
    }

    fn tool_tip(&self) -> ksni::ToolTip {
        let status = self.state.get_status();
        let description = format!("{}\n{}", status.as_str(), self.state.get_status_text());

        ksni::ToolTip {
            icon_name: String::new(),
            icon_pixmap: Vec::new(),
            title: "SThexa Controller".to_string(),
            description,
        }
    }

    fn menu(&self) -> Vec<MenuItem<Self>> {
        let status = self.state.get_status();
        let marker = match status {
            ConnectionStatus::Connected => "●",
            ConnectionStatus::Advertising => "◐",
            ConnectionStatus::Disconnected => "○",
            ConnectionStatus::Unavailable => "✕",
        };

        vec![
            MenuItem::Standard(StandardItem {
                label: format!("{} {}", marker, status.as_str()),
                enabled: false,
                ..Default::default()
            }),
            MenuItem::Standard(StandardItem {
                label: self.state.get_status_text(),
                enabled: false,
                ..Default::default()
            }),
            MenuItem::Separator,
            MenuItem::Standard(StandardItem {
                label: "Update Mode".to_string(),
                activate: Box::new(|tray: &mut Self| {
                    let _ = tray.action_tx.send(TrayAction::UpdateMode);
                }),
                ..Default::default()
            }),
            MenuItem::Separator,
            MenuItem::Standard(StandardItem {
                label: "Quit".to_string(),
                activate: Box::new(|tray: &mut Self| {
                    let _ = tray.action_tx.send(TrayAction::Quit);
                }),
                ..Default::default()
            }),
        ]
    }

    fn id(&self) -> String {
        "sthexa-controller".to_string()
    }

    fn category(&self) -> ksni::Category {
        ksni::Category::Hardware
    }
}

/// Run the system tray service.
pub fn run_tray(
    state: Arc<AppState>,
) -> Result<(mpsc::UnboundedReceiver<TrayAction>, Handle<SthexaTray>)> {
    let (action_tx, action_rx) = mpsc::unbounded_channel();

    let tray = SthexaTray::new(state, action_tx);
    let service = TrayService::new(tray);
    let handle = service.handle();

    std::thread::spawn(move || {
        let _ = service.run();
    });

    info!("System tray started");

    Ok((action_rx, handle))
}
