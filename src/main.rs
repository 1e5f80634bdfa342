use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use transtats_rest::{
    Config, Engine, Extension, Registry, RequestOptions, ResponseCache, RestClient, SqliteStore,
};

/// Query translation platform REST APIs
#[derive(Parser, Debug)]
#[command(name = "transtats-rest", version, about, long_about = None)]
struct Args {
    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Response cache database (defaults to the user cache directory)
    #[arg(long, global = true)]
    cache_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a service and print the response as JSON
    Get {
        /// Platform engine (damnedlies, transifex, zanata, weblate)
        engine: Engine,
        /// Platform base URL, e.g. https://hosted.weblate.org
        base_url: String,
        /// Service name from the engine table
        service: String,
        /// Positional path arguments
        path_args: Vec<String>,
        /// Append every configured query param
        #[arg(long, conflicts_with = "ext")]
        ext_all: bool,
        /// Append this query string verbatim
        #[arg(long)]
        ext: Option<String>,
        /// Extra header as NAME:VALUE (repeatable)
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
        #[arg(long, requires = "auth_token")]
        auth_user: Option<String>,
        #[arg(long, requires = "auth_user")]
        auth_token: Option<String>,
        /// Skip TLS certificate validation
        #[arg(long)]
        insecure: bool,
        /// Don't cache the response
        #[arg(long)]
        no_cache: bool,
    },
    /// List the services an engine knows about
    Services {
        engine: Engine,
    },
    /// Manage the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Delete expired records
    Purge,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got '{}'", raw))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("transtats-rest started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("transtats").join("transtats.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".transtats").join("transtats.log");
    }
    PathBuf::from("transtats.log")
}

fn open_cache(config: &Config, cli_path: Option<&PathBuf>) -> Result<ResponseCache> {
    match config.effective_cache_path(cli_path.map(PathBuf::as_path)) {
        Some(path) => Ok(ResponseCache::new(Arc::new(SqliteStore::open(path)?))),
        None => Ok(ResponseCache::in_memory()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;
    let config = Config::load();

    match args.command {
        Command::Get {
            engine,
            base_url,
            service,
            path_args,
            ext_all,
            ext,
            headers,
            auth_user,
            auth_token,
            insecure,
            no_cache,
        } => {
            // An unusable cache file degrades to a process-local cache
            let cache = open_cache(&config, args.cache_file.as_ref()).unwrap_or_else(|e| {
                tracing::warn!("Response cache unavailable, using memory: {:#}", e);
                ResponseCache::in_memory()
            });
            let mut client = RestClient::with_settings(engine, &base_url, config.http_settings())?
                .with_cache(cache)
                .save_response(config.save_response && !no_cache);
            if !config.effective_verify_tls(insecure) {
                client.disable_ssl_cert_validation()?;
            }

            let mut options = RequestOptions::new();
            options.ext = match ext {
                Some(query) => Extension::Literal(query),
                None => Extension::from(ext_all),
            };
            options.headers.extend(headers);
            options.auth_user = auth_user;
            options.auth_token = auth_token;

            let path_args: Vec<&str> = path_args.iter().map(String::as_str).collect();
            let response = client.process_request(&service, &path_args, options).await?;
            if response.is_empty() {
                tracing::info!("{} {} returned no data", engine, service);
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Services { engine } => {
            let registry = Registry::builtin();
            for name in registry.service_names(engine) {
                println!("{}", name);
            }
        }
        Command::Cache {
            action: CacheAction::Purge,
        } => {
            let purged = open_cache(&config, args.cache_file.as_ref())?
                .purge_expired()
                .await?;
            println!("Purged {} expired cache record(s)", purged);
        }
    }

    Ok(())
}
