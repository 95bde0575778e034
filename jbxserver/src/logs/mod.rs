//! Journalisation : subscriber `tracing` et tampon consultable en HTTP
//!
//! [`init_logging`] installe un registre `tracing-subscriber` composé de :
//!
//! 1. un filtre de niveau rechargeable à chaud (`/api/logs/level`),
//! 2. [`SseLayer`], qui copie chaque événement retenu dans [`LogState`],
//! 3. la sortie console `fmt`, si `enable_console`.
//!
//! Le tampon est servi par `/log-dump` (JSON) et `/log-sse` (flux).

mod buffer;
mod routes;
mod sselayer;

pub use buffer::{LogEntry, LogState};
pub use routes::{
    LevelRequest, LevelResponse, LogQuery, LogsApiDoc, create_logs_router, get_level, log_dump,
    log_sse, set_level,
};
pub use sselayer::SseLayer;

use jbxconfig::Config;
use tracing::Level;
use tracing_subscriber::{
    Registry, filter::LevelFilter, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

/// Poignée du filtre de niveau installé par [`init_logging`]
pub type LevelHandle = reload::Handle<LevelFilter, Registry>;

/// Du moins au plus bavard
pub const LEVELS: [Level; 5] = [
    Level::ERROR,
    Level::WARN,
    Level::INFO,
    Level::DEBUG,
    Level::TRACE,
];

/// `"warn"`, `"WARN"`... ; `None` pour un nom inconnu
pub fn parse_level(name: &str) -> Option<Level> {
    let name = name.trim();
    LEVELS
        .into_iter()
        .find(|level| level.as_str().eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Nombre d'entrées conservées par le tampon
    pub buffer_capacity: usize,
    pub enable_console: bool,
    /// Niveau appliqué au démarrage
    pub min_level: Level,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            buffer_capacity: 1000,
            enable_console: true,
            min_level: Level::INFO,
        }
    }
}

impl LoggingOptions {
    /// `host.logger.*`, chaque clé absente ou invalide gardant sa valeur par défaut
    pub fn from_config(config: &Config) -> Self {
        let mut options = Self::default();
        if let Ok(capacity) = config.get_log_cache_size() {
            options.buffer_capacity = capacity;
        }
        if let Ok(console) = config.get_log_enable_console() {
            options.enable_console = console;
        }
        if let Some(level) = config
            .get_log_min_level()
            .ok()
            .as_deref()
            .and_then(parse_level)
        {
            options.min_level = level;
        }
        options
    }
}

/// Installe le subscriber global et renvoie le tampon qu'il alimente
///
/// Si un subscriber global existe déjà (tests, intégration dans un autre
/// binaire), il est conservé : le tampon renvoyé reste alors vide.
///
/// ```rust,no_run
/// use jbxserver::logs::{init_logging, LoggingOptions};
///
/// let logs = init_logging(LoggingOptions::default());
/// tracing::info!("hello");
/// assert_eq!(logs.snapshot().len(), 1);
/// ```
pub fn init_logging(options: LoggingOptions) -> LogState {
    let (filter, handle) = reload::Layer::new(LevelFilter::from_level(options.min_level));
    let state = LogState::new(options.buffer_capacity, options.min_level, Some(handle));

    let console = options
        .enable_console
        .then(|| fmt::layer().with_target(true));

    // Le filtre doit précéder SseLayer pour que le tampon respecte le niveau
    let installed = Registry::default()
        .with(filter)
        .with(SseLayer::new(state.clone()))
        .with(console)
        .try_init();

    if let Err(e) = installed {
        eprintln!("A tracing subscriber is already installed: {}", e);
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Some(Level::DEBUG));
        assert_eq!(parse_level(" WARN "), Some(Level::WARN));
        assert_eq!(parse_level("loud"), None);
        assert_eq!(parse_level(""), None);
    }

    #[test]
    fn test_options_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();

        let options = LoggingOptions::from_config(&config);
        assert_eq!(options.buffer_capacity, 1000);
        assert_eq!(options.min_level, Level::INFO);

        config
            .set_value(
                &["host", "logger", "min_level"],
                serde_yaml::Value::String("debug".into()),
            )
            .unwrap();
        config
            .set_value(
                &["host", "logger", "enable_console"],
                serde_yaml::Value::Bool(false),
            )
            .unwrap();

        let options = LoggingOptions::from_config(&config);
        assert_eq!(options.min_level, Level::DEBUG);
        assert!(!options.enable_console);
    }

    #[test]
    fn test_unknown_level_keeps_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        config
            .set_value(
                &["host", "logger", "min_level"],
                serde_yaml::Value::String("verbose".into()),
            )
            .unwrap();

        assert_eq!(LoggingOptions::from_config(&config).min_level, Level::INFO);
    }
}
