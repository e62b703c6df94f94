use serde::{Deserialize, Serialize};
use std::{
    any::Any,
    collections::HashSet,
    panic::{self, AssertUnwindSafe},
    path::Path,
};
use tracing::{debug, error, info, warn};

use crate::{
    bitmap::load_bitmap,
    host::WidgetHost,
    store::ConfigStore,
    view::{
        Bitmap, RenderedView, WIDGET_IMAGE, WIDGET_LAYOUT, WIDGET_STATUS,
        WidgetInstanceId,
    },
};

/// Key under which the producer publishes the latest map snapshot path.
pub const MAP_IMAGE_PATH_KEY: &str = "map_image_path";

/// What to show when the snapshot file exists but cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeFailurePolicy {
    /// Submit the view without an image, same as a missing snapshot.
    #[default]
    Skip,
    /// Also put the placeholder text into the status slot.
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapWidgetOptions {
    pub decode_failure: DecodeFailurePolicy,
    pub max_image_dimension: Option<u32>,
    pub placeholder_text: String,
}

impl Default for MapWidgetOptions {
    fn default() -> Self {
        Self {
            decode_failure: DecodeFailurePolicy::Skip,
            max_image_dimension: None,
            placeholder_text: "Map unavailable".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    KeyAbsent,
    FileMissing,
}

/// Result of updating a single widget instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceOutcome {
    ImageBound,
    NoImage(SkipReason),
    DecodeFailed { placeholder_shown: bool },
    /// Nothing was submitted for this instance.
    Failed(String),
}

impl InstanceOutcome {
    #[must_use]
    pub const fn submitted(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Per-instance outcomes of one update callback, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    outcomes: Vec<(WidgetInstanceId, InstanceOutcome)>,
}

impl UpdateReport {
    #[must_use]
    pub fn outcomes(&self) -> &[(WidgetInstanceId, InstanceOutcome)] {
        &self.outcomes
    }

    #[must_use]
    pub fn outcome(&self, id: WidgetInstanceId) -> Option<&InstanceOutcome> {
        self.outcomes
            .iter()
            .find(|(outcome_id, _)| *outcome_id == id)
            .map(|(_, outcome)| outcome)
    }

    #[must_use]
    pub fn widgets_processed(&self) -> usize {
        self.outcomes.len()
    }

    /// Instances whose view was accepted by the host.
    #[must_use]
    pub fn widgets_updated(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.submitted())
            .count()
    }

    #[must_use]
    pub fn images_bound(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == InstanceOutcome::ImageBound)
            .count()
    }
}

/// Capability registered with the widget host for refresh callbacks.
pub trait WidgetProvider: Send + Sync {
    /// Refresh every instance in `widget_ids` from `store`.
    ///
    /// Instances are independent: a failure in one never prevents the others
    /// from being submitted.
    fn on_update(
        &self,
        host: &dyn WidgetHost,
        widget_ids: &[WidgetInstanceId],
        store: &dyn ConfigStore,
    ) -> UpdateReport;
}

/// Widget showing the last map snapshot published by the producer.
#[derive(Debug, Clone, Default)]
pub struct MapWidgetProvider {
    options: MapWidgetOptions,
}

impl MapWidgetProvider {
    #[must_use]
    pub const fn new(options: MapWidgetOptions) -> Self {
        Self { options }
    }

    /// Look up and decode the published snapshot.
    fn resolve_snapshot(&self, store: &dyn ConfigStore) -> Snapshot {
        let Some(image_path) = store.get_string(MAP_IMAGE_PATH_KEY) else {
            debug!("No map snapshot published yet");
            return Snapshot::Missing(SkipReason::KeyAbsent);
        };

        let path = Path::new(&image_path);
        if !matches!(path.try_exists(), Ok(true)) {
            debug!("Map snapshot {} does not exist", image_path);
            return Snapshot::Missing(SkipReason::FileMissing);
        }

        match load_bitmap(path, self.options.max_image_dimension) {
            Ok(bitmap) => Snapshot::Decoded(bitmap),
            Err(e) => {
                warn!("{}", e);
                Snapshot::Undecodable
            }
        }
    }

    /// Build one instance's view from the resolved snapshot.
    ///
    /// Fails when there is nothing safe to submit.
    fn render(
        &self,
        snapshot: &Snapshot,
    ) -> Result<(RenderedView, InstanceOutcome), String> {
        let mut view = RenderedView::new(WIDGET_LAYOUT);

        let outcome = match snapshot {
            Snapshot::Missing(reason) => InstanceOutcome::NoImage(*reason),
            Snapshot::Decoded(bitmap) => {
                view.set_image_bitmap(WIDGET_IMAGE, bitmap.clone());
                InstanceOutcome::ImageBound
            }
            Snapshot::Undecodable => {
                let placeholder_shown = match self.options.decode_failure {
                    DecodeFailurePolicy::Skip => false,
                    DecodeFailurePolicy::Placeholder => {
                        view.set_text(
                            WIDGET_STATUS,
                            self.options.placeholder_text.as_str(),
                        );
                        true
                    }
                };
                InstanceOutcome::DecodeFailed { placeholder_shown }
            }
            Snapshot::Unavailable(message) => return Err(message.clone()),
        };

        Ok((view, outcome))
    }

    #[tracing::instrument(skip(self, host, snapshot))]
    fn update_instance(
        &self,
        host: &dyn WidgetHost,
        id: WidgetInstanceId,
        snapshot: &Snapshot,
    ) -> InstanceOutcome {
        let (view, outcome) = match self.render(snapshot) {
            Ok(rendered) => rendered,
            Err(message) => return InstanceOutcome::Failed(message),
        };

        match host.update_widget(id, view) {
            Ok(()) => outcome,
            Err(e) => {
                warn!("Failed to update widget {}: {}", id, e);
                InstanceOutcome::Failed(e.to_string())
            }
        }
    }
}

/// The store and image file are read once per callback, so every instance
/// in a batch sees the same snapshot.
#[derive(Debug, Clone)]
enum Snapshot {
    Missing(SkipReason),
    Decoded(Bitmap),
    Undecodable,
    /// Resolving the snapshot panicked.
    Unavailable(String),
}

impl WidgetProvider for MapWidgetProvider {
    fn on_update(
        &self,
        host: &dyn WidgetHost,
        widget_ids: &[WidgetInstanceId],
        store: &dyn ConfigStore,
    ) -> UpdateReport {
        info!("Updating {} map widgets", widget_ids.len());

        let snapshot = panic::catch_unwind(AssertUnwindSafe(|| {
            self.resolve_snapshot(store)
        }))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            error!("Reading the map snapshot panicked: {}", message);
            Snapshot::Unavailable(format!("panicked: {message}"))
        });

        let mut seen = HashSet::new();
        let mut report = UpdateReport::default();

        for &id in widget_ids {
            if !seen.insert(id) {
                continue;
            }

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.update_instance(host, id, &snapshot)
            }))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                error!("Widget {} update panicked: {}", id, message);
                InstanceOutcome::Failed(format!("panicked: {message}"))
            });

            report.outcomes.push((id, outcome));
        }

        info!(
            "Processed {} map widgets, {} updated, {} with an image",
            report.widgets_processed(),
            report.widgets_updated(),
            report.images_bound()
        );

        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
