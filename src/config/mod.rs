//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{net::SocketAddr, num::NonZeroU32, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use time::{Date, macros::format_description};
use tracing::level_filters::LevelFilter;

pub use cli::{
    CliArgs, Command, FeedArgs, GlobalOverrides, ImageMode, ServeArgs, VisualizeArgs, WriteArgs,
};

use crate::{
    application::{
        content::{
            ContentOptions, DEFAULT_EDITOR_IDENTITY, DEFAULT_EDITOR_MODEL, DEFAULT_HISTORY_LIMIT,
        },
        retry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, RetryPolicy},
        syndication::{DEFAULT_FEED_LIMIT, FeedChannel},
        visualize::{
            DEFAULT_BATCH_SIZE, DEFAULT_COOLDOWN, DEFAULT_DIRECTOR_MODEL, GenerationMode,
            LinkMode, VisualizeOptions,
        },
    },
    presentation::media::DEFAULT_POLLINATIONS_BASE,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "glitchwire";
const ENV_PREFIX: &str = "GLITCHWIRE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 4;
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_DIRECT_IMAGE_MODEL: &str = "gemini-2.0-flash-preview-image-generation";
const DEFAULT_SITE_URL: &str = "http://localhost:3000";
const DEFAULT_FEED_TITLE: &str = "GLITCHWIRE";
const DEFAULT_FEED_DESCRIPTION: &str = "Dispatches from the noise floor.";

pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY (or SUPABASE_ANON_KEY)";

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub gemini: GeminiSettings,
    pub storage: StorageSettings,
    pub generation: GenerationSettings,
    pub content: ContentOptions,
    pub visualize: VisualizeSettings,
    pub feed: FeedChannel,
    pub server: ServerSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub supabase_url: Option<String>,
    pub service_role_key: Option<String>,
    pub anon_key: Option<String>,
}

impl StorageSettings {
    /// The service-role key when present, else the anonymous key.
    pub fn api_key(&self) -> Option<&str> {
        self.service_role_key
            .as_deref()
            .or(self.anon_key.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct VisualizeSettings {
    pub options: VisualizeOptions,
    pub pollinations_base: String,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("missing required configuration: {}", .keys.join(", "))]
    Missing { keys: Vec<&'static str> },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI),
/// then check that everything the chosen command needs is present.
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    raw.apply_global_overrides(&cli.globals);
    match &cli.command {
        Command::Visualize(args) => raw.apply_visualize_overrides(args),
        Command::Serve(args) => raw.apply_serve_overrides(args),
        Command::Write(_) | Command::Feed(_) | Command::Personas => {}
    }

    let settings = Settings::from_raw(raw)?;
    settings.require_for(&cli.command)?;
    Ok(settings)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            gemini,
            storage,
            generation,
            content,
            visualize,
            feed,
            server,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            gemini: build_gemini_settings(gemini),
            storage: build_storage_settings(storage),
            generation: build_generation_settings(generation)?,
            content: build_content_settings(content)?,
            visualize: build_visualize_settings(visualize)?,
            feed: build_feed_settings(feed)?,
            server: build_server_settings(server)?,
        })
    }

    /// Names of every required value the command would need but is missing.
    pub fn missing_for(&self, command: &Command) -> Vec<&'static str> {
        let needs_gemini = matches!(command, Command::Write(_) | Command::Visualize(_));
        let needs_database = !matches!(command, Command::Personas);
        let needs_storage = matches!(command, Command::Visualize(_));

        let mut missing = Vec::new();
        if needs_gemini && self.gemini.api_key.is_none() {
            missing.push(ENV_GEMINI_API_KEY);
        }
        if needs_database && self.database.url.is_none() {
            missing.push(ENV_DATABASE_URL);
        }
        if needs_storage {
            if self.storage.supabase_url.is_none() {
                missing.push(ENV_SUPABASE_URL);
            }
            if self.storage.api_key().is_none() {
                missing.push(ENV_SUPABASE_KEY);
            }
        }
        missing
    }

    pub fn require_for(&self, command: &Command) -> Result<(), LoadError> {
        let keys = self.missing_for(command);
        if keys.is_empty() {
            Ok(())
        } else {
            Err(LoadError::Missing { keys })
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    gemini: RawGeminiSettings,
    storage: RawStorageSettings,
    generation: RawGenerationSettings,
    content: RawContentSettings,
    visualize: RawVisualizeSettings,
    feed: RawFeedSettings,
    server: RawServerSettings,
}

impl RawSettings {
    fn apply_global_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(key) = overrides.gemini_api_key.as_ref() {
            self.gemini.api_key = Some(key.clone());
        }
        if let Some(url) = overrides.supabase_url.as_ref() {
            self.storage.supabase_url = Some(url.clone());
        }
        if let Some(key) = overrides.supabase_service_role_key.as_ref() {
            self.storage.service_role_key = Some(key.clone());
        }
        if let Some(key) = overrides.supabase_anon_key.as_ref() {
            self.storage.anon_key = Some(key.clone());
        }
    }

    fn apply_visualize_overrides(&mut self, args: &VisualizeArgs) {
        if let Some(size) = args.batch_size {
            self.visualize.batch_size = Some(size);
        }
        if let Some(mode) = args.mode {
            self.visualize.mode = Some(match mode {
                ImageMode::Pollinations => GenerationMode::Pollinations,
                ImageMode::Gemini => GenerationMode::Gemini,
            });
        }
    }

    fn apply_serve_overrides(&mut self, args: &ServeArgs) {
        if let Some(host) = args.host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = args.port {
            self.server.port = Some(port);
        }
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url: non_blank(database.url),
        max_connections,
    })
}

fn build_gemini_settings(gemini: RawGeminiSettings) -> GeminiSettings {
    GeminiSettings {
        api_key: non_blank(gemini.api_key),
        base_url: non_blank(gemini.base_url)
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
    }
}

fn build_storage_settings(storage: RawStorageSettings) -> StorageSettings {
    StorageSettings {
        supabase_url: non_blank(storage.supabase_url)
            .map(|url| url.trim_end_matches('/').to_string()),
        service_role_key: non_blank(storage.service_role_key),
        anon_key: non_blank(storage.anon_key),
    }
}

fn build_generation_settings(
    generation: RawGenerationSettings,
) -> Result<GenerationSettings, LoadError> {
    let seconds = generation
        .request_timeout_seconds
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    if seconds == 0 {
        return Err(LoadError::invalid(
            "generation.request_timeout_seconds",
            "must be greater than zero",
        ));
    }
    Ok(GenerationSettings {
        request_timeout: Duration::from_secs(seconds),
    })
}

fn build_content_settings(content: RawContentSettings) -> Result<ContentOptions, LoadError> {
    let history_limit = content.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let publish_offset_days = content.publish_offset_days.unwrap_or(0);
    if !(-3650..=3650).contains(&publish_offset_days) {
        return Err(LoadError::invalid(
            "content.publish_offset_days",
            "must be within ten years of today",
        ));
    }

    let pinned_date = match non_blank(content.pinned_date) {
        Some(value) => Some(
            Date::parse(&value, format_description!("[year]-[month]-[day]")).map_err(|err| {
                LoadError::invalid("content.pinned_date", format!("expected YYYY-MM-DD: {err}"))
            })?,
        ),
        None => None,
    };

    Ok(ContentOptions {
        history_limit,
        publish_offset_days,
        pinned_date,
        editor_model: non_blank(content.editor_model)
            .unwrap_or_else(|| DEFAULT_EDITOR_MODEL.to_string()),
        editor_identity: non_blank(content.editor_identity)
            .unwrap_or_else(|| DEFAULT_EDITOR_IDENTITY.to_string()),
    })
}

fn build_visualize_settings(
    visualize: RawVisualizeSettings,
) -> Result<VisualizeSettings, LoadError> {
    let batch_size = non_zero_u32(
        visualize.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).into(),
        "visualize.batch_size",
    )?;
    let max_attempts = non_zero_u32(
        visualize
            .max_attempts
            .unwrap_or(DEFAULT_MAX_ATTEMPTS)
            .into(),
        "visualize.max_attempts",
    )?;
    let base_delay = visualize
        .base_delay_ms
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_BASE_DELAY);
    let cooldown = visualize
        .cooldown_seconds
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_COOLDOWN);

    let backends = visualize.backends.unwrap_or_default();
    let retry = RetryPolicy::new(backends, max_attempts, base_delay);

    let options = VisualizeOptions {
        batch_size: batch_size.get(),
        cooldown,
        mode: visualize.mode.unwrap_or_default(),
        link_mode: visualize.link_mode.unwrap_or_default(),
        retry,
        director_model: non_blank(visualize.director_model)
            .unwrap_or_else(|| DEFAULT_DIRECTOR_MODEL.to_string()),
        direct_model: non_blank(visualize.direct_model)
            .unwrap_or_else(|| DEFAULT_DIRECT_IMAGE_MODEL.to_string()),
    };

    Ok(VisualizeSettings {
        options,
        pollinations_base: non_blank(visualize.pollinations_base)
            .unwrap_or_else(|| DEFAULT_POLLINATIONS_BASE.to_string()),
    })
}

fn build_feed_settings(feed: RawFeedSettings) -> Result<FeedChannel, LoadError> {
    let site_url = non_blank(feed.site_url).unwrap_or_else(|| DEFAULT_SITE_URL.to_string());
    url::Url::parse(&site_url)
        .map_err(|err| LoadError::invalid("feed.site_url", format!("invalid URL: {err}")))?;
    let limit = non_zero_u32(
        feed.limit.unwrap_or(DEFAULT_FEED_LIMIT).into(),
        "feed.limit",
    )?;

    Ok(FeedChannel {
        site_url,
        title: non_blank(feed.title).unwrap_or_else(|| DEFAULT_FEED_TITLE.to_string()),
        description: non_blank(feed.description)
            .unwrap_or_else(|| DEFAULT_FEED_DESCRIPTION.to_string()),
        limit: limit.get(),
    })
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;
    Ok(ServerSettings { addr })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawGeminiSettings {
    api_key: Option<String>,
    base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    supabase_url: Option<String>,
    service_role_key: Option<String>,
    anon_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawGenerationSettings {
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    history_limit: Option<u32>,
    publish_offset_days: Option<i64>,
    pinned_date: Option<String>,
    editor_model: Option<String>,
    editor_identity: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawVisualizeSettings {
    batch_size: Option<u32>,
    cooldown_seconds: Option<u64>,
    mode: Option<GenerationMode>,
    link_mode: Option<LinkMode>,
    backends: Option<Vec<String>>,
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    director_model: Option<String>,
    direct_model: Option<String>,
    pollinations_base: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFeedSettings {
    site_url: Option<String>,
    title: Option<String>,
    description: Option<String>,
    limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
