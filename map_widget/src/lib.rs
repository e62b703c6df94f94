//! Home-screen widget showing the most recent map snapshot.
//!
//! A producer application renders map snapshots to disk and publishes the
//! latest path under [`MAP_IMAGE_PATH_KEY`] in a shared key-value store. On
//! every refresh the widget host calls [`WidgetProvider::on_update`] and
//! [`MapWidgetProvider`] binds the decoded snapshot into each instance's view.
//!
//! ```rust
//! use std::collections::HashMap;
//! use map_widget::{
//!     InstanceOutcome, MapWidgetProvider, MemoryHost, SkipReason,
//!     WidgetInstanceId, WidgetProvider,
//! };
//!
//! let host = MemoryHost::new();
//! let store: HashMap<String, String> = HashMap::new();
//!
//! let report = MapWidgetProvider::default().on_update(
//!     &host,
//!     &[WidgetInstanceId(1), WidgetInstanceId(2)],
//!     &store,
//! );
//!
//! assert_eq!(report.widgets_updated(), 2);
//! assert_eq!(
//!     report.outcome(WidgetInstanceId(1)),
//!     Some(&InstanceOutcome::NoImage(SkipReason::KeyAbsent))
//! );
//! ```

mod bitmap;
mod host;
mod provider;
mod store;
mod view;

pub use bitmap::{DecodeError, load_bitmap};
pub use host::{HostError, MemoryHost, WidgetHost};
pub use provider::{
    DecodeFailurePolicy, InstanceOutcome, MAP_IMAGE_PATH_KEY,
    MapWidgetOptions, MapWidgetProvider, SkipReason, UpdateReport,
    WidgetProvider,
};
pub use store::{ConfigStore, PrefsError, PrefsFile};
pub use view::{
    Bitmap, RenderedView, ViewAction, WIDGET_IMAGE, WIDGET_LAYOUT,
    WIDGET_STATUS, WidgetInstanceId,
};
