use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the glitchwire binary.
#[derive(Debug, Parser)]
#[command(
    name = "glitchwire",
    version,
    about = "Persona-driven writer, editor and illustrator for a fictional glitch-culture blog"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "GLITCHWIRE_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub globals: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Draft, edit and publish one article in a persona's voice.
    Write(WriteArgs),
    /// Generate and attach images for posts that have none.
    Visualize(VisualizeArgs),
    /// Write the RSS feed to a file or stdout.
    Feed(FeedArgs),
    /// Serve the feed and post views over HTTP.
    Serve(ServeArgs),
    /// List the writer persona keys.
    Personas,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Write(_) => "write",
            Command::Visualize(_) => "visualize",
            Command::Feed(_) => "feed",
            Command::Serve(_) => "serve",
            Command::Personas => "personas",
        }
    }
}

/// Credentials and logging knobs shared by every subcommand. The conventional
/// environment names are bound here so they win over configuration files.
#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the log level (e.g. info, debug).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Postgres connection URL.
    #[arg(long = "database-url", env = "DATABASE_URL", value_name = "URL", global = true)]
    pub database_url: Option<String>,

    /// API key for the generation service.
    #[arg(
        long = "gemini-api-key",
        env = "GEMINI_API_KEY",
        value_name = "KEY",
        hide_env_values = true,
        global = true
    )]
    pub gemini_api_key: Option<String>,

    /// Base URL of the object storage project.
    #[arg(long = "supabase-url", env = "SUPABASE_URL", value_name = "URL", global = true)]
    pub supabase_url: Option<String>,

    /// Privileged storage key; preferred over the anonymous key.
    #[arg(
        long = "supabase-service-role-key",
        env = "SUPABASE_SERVICE_ROLE_KEY",
        value_name = "KEY",
        hide_env_values = true,
        global = true
    )]
    pub supabase_service_role_key: Option<String>,

    /// Anonymous storage key.
    #[arg(
        long = "supabase-anon-key",
        env = "SUPABASE_ANON_KEY",
        value_name = "KEY",
        hide_env_values = true,
        global = true
    )]
    pub supabase_anon_key: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct WriteArgs {
    /// Persona key; defaults to the first persona.
    #[arg(long, value_name = "KEY")]
    pub writer: Option<String>,

    /// Topic hint; the persona picks its own subject when omitted.
    #[arg(long, value_name = "TEXT")]
    pub topic: Option<String>,

    /// Run every step except the final insert and print the post.
    #[arg(long = "dry-run", action = clap::ArgAction::SetTrue)]
    pub dry_run: bool,
}

#[derive(Debug, Args, Default, Clone)]
pub struct VisualizeArgs {
    /// Maximum number of posts processed in this run.
    #[arg(long = "batch-size", value_name = "N")]
    pub batch_size: Option<u32>,

    /// Image generation path.
    #[arg(long, value_enum, value_name = "MODE")]
    pub mode: Option<ImageMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImageMode {
    Pollinations,
    Gemini,
}

#[derive(Debug, Args, Default, Clone)]
pub struct FeedArgs {
    /// Destination file; stdout when omitted.
    #[arg(long, short = 'o', value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub port: Option<u16>,
}
