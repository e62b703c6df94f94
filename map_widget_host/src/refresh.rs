use map_widget::{PrefsError, PrefsFile, UpdateReport, WidgetInstanceId};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{error, info};

use crate::{context::AppContext, fs_host::FileSystemHost};

const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Response {
    pub widgets_processed: usize,
    pub widgets_updated: usize,
    pub images_bound: usize,
}

impl From<&UpdateReport> for Response {
    fn from(report: &UpdateReport) -> Self {
        Self {
            widgets_processed: report.widgets_processed(),
            widgets_updated: report.widgets_updated(),
            images_bound: report.images_bound(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Prefs(#[from] PrefsError),
    #[error("failed to prepare output directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("update worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
    #[error("update exceeded its budget of {0:?}")]
    BudgetExceeded(Duration),
}

/// Run one update callback for `widget_ids`.
///
/// The preferences file is re-read on every call. The provider runs on a
/// blocking worker; if it is still running when the budget runs out the host
/// is closed, so views for the remaining instances are never submitted. A
/// view the host is already writing at that moment still lands.
pub async fn refresh(
    context: &AppContext,
    widget_ids: &[WidgetInstanceId],
) -> Result<Response, RefreshError> {
    let store = PrefsFile::load(&context.config.prefs_path)?;
    let host = Arc::new(FileSystemHost::new(&context.config.output_dir)?);
    let budget = context.config.update_budget();

    info!("Refreshing {} widgets", widget_ids.len());

    let provider = Arc::clone(&context.provider);
    let worker_host = Arc::clone(&host);
    let ids = widget_ids.to_vec();
    let worker = tokio::task::spawn_blocking(move || {
        provider.on_update(worker_host.as_ref(), &ids, &store)
    });

    match tokio::time::timeout(budget, worker).await {
        Ok(report) => Ok(Response::from(&report?)),
        Err(_) => {
            host.close();
            error!("Widget update exceeded its budget of {:?}", budget);
            Err(RefreshError::BudgetExceeded(budget))
        }
    }
}

/// Refresh `widget_ids` every `interval` until Ctrl-C.
///
/// A failed refresh is logged and retried on the next tick.
pub async fn watch(
    context: &AppContext,
    widget_ids: &[WidgetInstanceId],
    interval: Duration,
) {
    watch_until(context, widget_ids, interval, tokio::signal::ctrl_c()).await;
}

/// Refresh `widget_ids` every `interval` until `shutdown` completes.
///
/// `shutdown` is polled across the whole loop, so a signal that arrives while
/// a refresh is running stops the loop once that refresh returns.
async fn watch_until<F: Future>(
    context: &AppContext,
    widget_ids: &[WidgetInstanceId],
    interval: Duration,
    shutdown: F,
) {
    let mut ticker = tokio::time::interval(interval.max(MIN_INTERVAL));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("Stopping widget refresh");
                break;
            }
            _ = ticker.tick() => {
                match refresh(context, widget_ids).await {
                    Ok(response) => info!(
                        "Refreshed {} widgets, {} with an image",
                        response.widgets_updated, response.images_bound
                    ),
                    Err(e) => error!("Refresh failed: {}", e),
                }
            }
        }
    }
}
