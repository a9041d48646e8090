//! Presentation adapters.
//!
//! - **`menu_model`** – [`MenuModel`], the tray menu as plain data, updated
//!   only through change-sets.
//! - [`LoggingPresenter`] – what the binary uses: keeps a `MenuModel` and logs
//!   every applied change with resolved names and colour labels.
//!
//! A real widget toolkit plugs in by implementing
//! [`PresentationSink`](crate::application::ports::PresentationSink).

pub mod menu_model;

pub use menu_model::{MenuError, MenuModel, MenuSlot};

use devtray_core::{ChangeSet, MenuChange};
use tracing::{debug, info, warn};

use crate::application::ports::PresentationSink;
use crate::application::sync_engine::EngineView;

/// Presenter that mirrors the menu in memory and logs every change.
#[derive(Debug, Default)]
pub struct LoggingPresenter {
    model: MenuModel,
}

impl LoggingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(&self) -> &MenuModel {
        &self.model
    }

    fn describe(change: &MenuChange, view: &EngineView<'_>) -> String {
        match change {
            MenuChange::InsertDevice { position, device } => {
                format!("insert {} at {position}", view.device_name(device))
            }
            MenuChange::RemoveDevice { position, device } => {
                format!("remove {} from {position}", view.device_name(device))
            }
            MenuChange::ShowSeparator(index) => format!("show separator {index}"),
            MenuChange::HideSeparator(index) => format!("hide separator {index}"),
            MenuChange::InsertCandidate {
                device,
                position,
                domain,
            } => format!(
                "offer {} [{}] for {} at {position}",
                view.domain_name(domain),
                view.domain_label(domain).unwrap_or("-"),
                view.device_name(device)
            ),
            MenuChange::RemoveCandidate { device, domain } => format!(
                "withdraw {} for {}",
                view.domain_name(domain),
                view.device_name(device)
            ),
            MenuChange::Relabel {
                device,
                attached_to: Some(domain),
            } => format!(
                "{} attached to {}",
                view.device_name(device),
                view.domain_name(domain)
            ),
            MenuChange::Relabel {
                device,
                attached_to: None,
            } => format!("{} detached", view.device_name(device)),
        }
    }
}

impl PresentationSink for LoggingPresenter {
    fn apply(&mut self, changes: &ChangeSet, view: &EngineView<'_>) {
        for change in changes {
            let text = Self::describe(change, view);
            match change {
                MenuChange::Relabel { .. } => info!("menu: {text}"),
                _ => debug!("menu: {text}"),
            }
            if let Err(err) = self.model.apply_change(change) {
                warn!("menu out of step after '{text}': {err}");
            }
        }
    }
}
