// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use doctrans::app_config::{self, Config, TranslationProvider};
use doctrans::app_controller::Controller;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Gemini,
    OpenAI,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Gemini => TranslationProvider::Gemini,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a document into every target language (resumes previous progress)
    Translate(RunArgs),

    /// Show recorded progress for a document without calling the service
    Status(RunArgs),

    /// Generate shell completions for doctrans
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug, Clone)]
struct RunArgs {
    /// Key of the source document inside the store root
    #[arg(value_name = "SOURCE_KEY")]
    source_key: Option<String>,

    /// Root directory of the document store
    #[arg(short, long)]
    root: Option<String>,

    /// Target language codes, comma separated (e.g. 'fr,es,it')
    #[arg(short, long, value_delimiter = ',')]
    target_languages: Option<Vec<String>>,

    /// Source language code (e.g. 'de')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Translatable field names, comma separated (e.g. 'prose,title')
    #[arg(long, value_delimiter = ',')]
    fields: Option<Vec<String>>,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// API key for the provider
    #[arg(long, env = "DOCTRANS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Translate a small sample into English and Spanish only
    #[arg(long)]
    test_mode: bool,
}

/// doctrans - restartable, deduplicating translation of structured JSON documents
#[derive(Parser, Debug)]
#[command(name = "doctrans")]
#[command(version)]
#[command(about = "Translate large JSON documents into many languages with an LLM")]
#[command(long_about = "doctrans extracts the translatable text fields of a JSON document, translates each \
distinct text once per language through a text-generation service, and writes one document per target language.

Progress is saved after every batch, so an interrupted run picks up where it stopped.

EXAMPLES:
    doctrans translate catalog.json                   # Translate using conf.json
    doctrans translate -t fr,es catalog.json          # Only French and Spanish
    doctrans translate --test-mode catalog.json       # Small sample, en and es only
    doctrans status catalog.json                      # Show recorded progress
    doctrans completions bash > doctrans.bash         # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.

SUPPORTED PROVIDERS:
    gemini - Google Gemini API (requires API key)
    openai - OpenAI or compatible chat completions API (requires API key)")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(LevelFilter::Trace));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once with info level by default
    // We'll update the level after loading the config if needed
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "doctrans", &mut std::io::stdout());
            Ok(())
        }
        Commands::Translate(args) => run_translate(args).await,
        Commands::Status(args) => run_status(args).await,
    }
}

/// Load conf.json (writing a default one when missing) and apply CLI overrides
fn load_config(options: &RunArgs) -> Result<Config> {
    if let Some(cmd_log_level) = &options.log_level {
        log::set_max_level(level_filter(&cmd_log_level.clone().into()));
    }

    let config_path = &options.config_path;
    let mut config = if Path::new(config_path).exists() {
        let file = File::open(config_path).context(format!("Failed to open config file: {}", config_path))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).context(format!("Failed to parse config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        let config_json =
            serde_json::to_string_pretty(&config).context("Failed to serialize default config to JSON")?;
        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;
        config
    };

    if let Some(source_key) = &options.source_key {
        config.storage.source_key = source_key.clone();
    }
    if let Some(root) = &options.root {
        config.storage.root = root.clone();
    }
    if let Some(target_languages) = &options.target_languages {
        config.target_languages = target_languages.iter().map(|code| code.trim().to_string()).collect();
    }
    if let Some(source_language) = &options.source_language {
        config.source_language = source_language.clone();
    }
    if let Some(fields) = &options.fields {
        config.document.translatable_fields = fields.iter().map(|field| field.trim().to_string()).collect();
    }
    if let Some(provider) = &options.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(model) = &options.model {
        config.translation.active_provider_config_mut().model = model.clone();
    }
    if let Some(api_key) = &options.api_key {
        config.translation.active_provider_config_mut().api_key = api_key.clone();
    }
    if options.test_mode {
        config.test_mode = true;
    }

    match &options.log_level {
        Some(log_level) => config.log_level = log_level.clone().into(),
        None => log::set_max_level(level_filter(&config.log_level)),
    }

    Ok(config)
}

async fn run_translate(options: RunArgs) -> Result<()> {
    let config = load_config(&options)?;
    config.validate().context("Configuration validation failed")?;

    let mut controller = Controller::from_config(config)?;
    controller
        .check_connection()
        .await
        .context("Could not reach the translation provider")?;

    match controller.run().await {
        Ok(summary) if summary.is_complete() => {
            info!("All texts translated into every target language");
            Ok(())
        }
        Ok(_) => {
            warn!("Some texts kept their source text; run again to retry them");
            Ok(())
        }
        Err(e) => {
            error!("Run stopped in state {}: {}", controller.state(), e);
            Err(anyhow!(e))
        }
    }
}

async fn run_status(options: RunArgs) -> Result<()> {
    let config = load_config(&options)?;
    if config.storage.source_key.is_empty() {
        return Err(anyhow!("A source document key is required"));
    }

    let controller = Controller::from_config(config)?;
    let summary = controller.status().await?;
    println!("{}", summary);
    Ok(())
}
