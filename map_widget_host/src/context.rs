use map_widget::{MapWidgetOptions, MapWidgetProvider, WidgetProvider};
use serde::Deserialize;
use std::{path::PathBuf, sync::Arc, time::Duration};

const fn default_update_budget_ms() -> u64 {
    10_000
}

const fn default_interval_secs() -> u64 {
    1_800
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Preferences file published by the producer application.
    pub prefs_path: PathBuf,
    /// Directory rendered widget views are written to.
    pub output_dir: PathBuf,
    #[serde(flatten)]
    pub widget: MapWidgetOptions,
    #[serde(default = "default_update_budget_ms")]
    pub update_budget_ms: u64,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Config {
    pub const fn update_budget(&self) -> Duration {
        Duration::from_millis(self.update_budget_ms)
    }

    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Clone)]
pub struct AppContext {
    pub config: Config,
    pub provider: Arc<dyn WidgetProvider>,
}

impl widget_app::ContextProvider<Config> for AppContext {
    fn new(config: Config) -> Self {
        let provider = MapWidgetProvider::new(config.widget.clone());

        Self {
            config,
            provider: Arc::new(provider),
        }
    }
}
