use figment::{
    Figment,
    providers::{Env, Format, Toml},
};

/// Environment variable naming the TOML configuration file.
pub const CONFIG_FILE_ENV: &str = "MAP_WIDGET_CONFIG";

/// Configuration file read when `MAP_WIDGET_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "map_widget.toml";

/// Prefix of the environment variables that override the file.
pub const ENV_PREFIX: &str = "MAP_WIDGET_";

pub trait ContextProvider<Config> {
    fn new(config: Config) -> Self;
}

/// Install the JSON tracing subscriber used by every binary in the workspace.
///
/// The log level is taken from `RUST_LOG`. Installing twice is a no-op.
pub fn init_tracing() {
    let result = tracing_subscriber::fmt()
        .json()
        // allow log level to be overridden by RUST_LOG env var
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        // this needs to be set to remove duplicated information in the log.
        .with_current_span(false)
        .with_ansi(false)
        .with_target(false)
        .try_init();

    if let Err(e) = result {
        tracing::debug!("tracing subscriber already installed: {}", e);
    }
}

/// Build the figment the workspace reads its configuration from.
///
/// Values from the TOML file are overridden by `MAP_WIDGET_`-prefixed
/// environment variables. A missing file contributes nothing.
#[must_use]
pub fn figment() -> Figment {
    let config_file = std::env::var(CONFIG_FILE_ENV)
        .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

    Figment::new()
        .merge(Toml::file(config_file))
        .merge(Env::prefixed(ENV_PREFIX))
}

/// Extract a configuration value from [`figment`].
///
/// # Errors
/// If a provider fails to parse or the merged values do not deserialize
/// into `Config`.
pub fn load_config<Config>() -> Result<Config, figment::Error>
where
    Config: for<'de> serde::Deserialize<'de>,
{
    figment().extract()
}

/// Initialize the application context with configuration from the config
/// file and environment variables.
///
/// # Errors
/// If the configuration cannot be extracted.
pub fn create_app_context<A, Config>() -> Result<A, figment::Error>
where
    A: ContextProvider<Config>,
    Config: for<'de> serde::Deserialize<'de>,
{
    init_tracing();

    let config: Config = load_config()?;

    Ok(A::new(config))
}
