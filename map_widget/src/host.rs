use std::sync::{Mutex, PoisonError};
use thiserror::Error;

use crate::view::{RenderedView, WidgetInstanceId};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("widget host is closed")]
    Closed,
    #[error("failed to submit view for widget {id}: {message}")]
    Submit {
        id: WidgetInstanceId,
        message: String,
    },
}

/// The side of the widget framework that accepts finished views.
///
/// `update_widget` replaces whatever the instance currently shows with
/// `view` in one step.
pub trait WidgetHost: Send + Sync {
    /// # Errors
    /// If the host refuses the view for this instance.
    fn update_widget(
        &self,
        id: WidgetInstanceId,
        view: RenderedView,
    ) -> Result<(), HostError>;
}

/// In-process host that keeps every submitted view.
#[derive(Debug, Default)]
pub struct MemoryHost {
    submissions: Mutex<Vec<(WidgetInstanceId, RenderedView)>>,
}

impl MemoryHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All submissions so far, oldest first.
    #[must_use]
    pub fn submissions(&self) -> Vec<(WidgetInstanceId, RenderedView)> {
        self.submissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent view submitted for `id`.
    #[must_use]
    pub fn current_view(&self, id: WidgetInstanceId) -> Option<RenderedView> {
        self.submissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|(submitted, _)| *submitted == id)
            .map(|(_, view)| view.clone())
    }
}

impl WidgetHost for MemoryHost {
    fn update_widget(
        &self,
        id: WidgetInstanceId,
        view: RenderedView,
    ) -> Result<(), HostError> {
        self.submissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, view));
        Ok(())
    }
}
