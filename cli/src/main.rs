//! `xcode-bsp` - Build Server Protocol server for Xcode projects.
//!
//! Launched by the editor from the directory holding `.bsp/xcode-bsp.json`; speaks
//! JSON-RPC on stdin/stdout until `build/exit`.
//!
//! ```text
//! main() -> settings -> cache dir -> tracing -> project config -> store + graph
//!        -> ServerContext -> serve(stdin, stdout) -> exit code
//! ```

use std::env;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use xcode_bsp_config::{ProjectConfig, ServerSettings};
use xcode_bsp_engine::{BuildGraphService, XcodeBuild};
use xcode_bsp_rpc::MessageWriter;
use xcode_bsp_server::{MethodRegistry, ServerContext, ServerOptions, serve};
use xcode_bsp_store::{DATABASE_FILE_NAME, SqliteArgumentStore};
use xcode_bsp_types::project_name_for;

const USAGE: &str = "usage: xcode-bsp [server]";

fn init_tracing(settings_filter: Option<&str>, cache_dir: &Path, warnings: Vec<String>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(settings_filter.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let log_path = cache_dir.join("logs").join("xcode-bsp.log");
    let (log_file, mut warnings) = open_log_file(&log_path, warnings);

    // stdout carries the protocol; logs go to the file or stderr only.
    match log_file {
        Some(file) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(env_filter)
                .init();
            tracing::info!(path = %log_path.display(), "Logging initialized");
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(std::io::stderr))
                .with(env_filter)
                .init();
            warnings.push("Logging to stderr".to_string());
        }
    }

    for warning in warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file(path: &Path, mut warnings: Vec<String>) -> (Option<fs::File>, Vec<String>) {
    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warnings.push(format!("Failed to create log dir {}: {e}", parent.display()));
        return (None, warnings);
    }

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => (Some(file), warnings),
        Err(e) => {
            warnings.push(format!("Failed to open log file {}: {e}", path.display()));
            (None, warnings)
        }
    }
}

fn load_settings() -> (ServerSettings, Vec<String>) {
    match ServerSettings::load() {
        Ok(settings) => (settings.unwrap_or_default(), Vec::new()),
        Err(err) => (
            ServerSettings::default(),
            vec![format!("Ignoring server settings: {err}")],
        ),
    }
}

fn cache_dir(settings: &ServerSettings) -> Result<PathBuf> {
    let dir = settings
        .cache_dir()
        .context("Failed to determine a cache directory")?;
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;
    Ok(dir)
}

async fn run() -> Result<i32> {
    let (settings, warnings) = load_settings();
    let cache_dir = cache_dir(&settings)?;
    init_tracing(settings.log_filter(), &cache_dir, warnings);

    let root = env::current_dir().context("Failed to read the working directory")?;
    let project = ProjectConfig::load(&root)?;
    let project_name = project_name_for(&root);
    tracing::info!(
        root = %root.display(),
        cache = %cache_dir.display(),
        schemes = ?project.active_schemes,
        "starting {} {}",
        project.name,
        project.version
    );

    let store = SqliteArgumentStore::open(cache_dir.join(DATABASE_FILE_NAME))?;
    let client = XcodeBuild::new(&root, &cache_dir);
    let graph = BuildGraphService::new(Arc::new(client), project_name, project.active_schemes);

    let writer = Arc::new(MessageWriter::new(tokio::io::stdout()));
    let ctx = ServerContext::new(
        Arc::new(graph),
        Arc::new(store),
        writer,
        ServerOptions {
            cache_dir,
            source_kit_options_changed: settings.source_kit_options_changed(),
        },
    )?;
    let registry = MethodRegistry::standard()?;

    let code = serve(tokio::io::stdin(), Arc::new(ctx), Arc::new(registry)).await?;
    tracing::info!("exiting with code {code}");
    Ok(code)
}

#[tokio::main]
async fn main() {
    match env::args().nth(1).as_deref() {
        None | Some("server") => {}
        Some(other) => {
            eprintln!("unknown command: {other}\n{USAGE}");
            process::exit(2);
        }
    }

    match run().await {
        Ok(code) => process::exit(code),
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    }
}
