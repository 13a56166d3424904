use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cradle_bus::{EventBus, Topic};
use cradle_core::{template_html, SettingsStore};
use cradle_server::{ContentServer, ServerConfig};

#[derive(Parser)]
#[command(name = "cradle", version, about = "cradle local HTML app shell")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.cradle",
        help = "Config root directory (contains setting.json and logs/)"
    )]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Serve a directory over the loopback content server")]
    Serve {
        #[arg(help = "Directory to serve (defaults to the configured one)")]
        dir: Option<PathBuf>,
        #[arg(long, default_value = "8000", help = "Loopback port to bind")]
        port: u16,
    },
    #[command(about = "Persist an HTML entry file as the shell's content")]
    Open {
        #[arg(help = "Path to the entry file, e.g. app/index.html")]
        file: PathBuf,
    },
    #[command(about = "Write the starter HTML template")]
    New {
        #[arg(default_value = "index.html", help = "Where to write the template")]
        path: PathBuf,
    },
    #[command(about = "Print the effective settings")]
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Expand ~ to home directory
    if cli.config_root.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            cli.config_root = PathBuf::from(home).join(
                cli.config_root
                    .strip_prefix("~")
                    .unwrap_or(&cli.config_root),
            );
        }
    }

    let log_dir = cli.config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "cradle.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Serve { dir, port } => serve(&cli.config_root, dir, port).await?,
        Commands::Open { file } => open(&cli.config_root, &file)?,
        Commands::New { path } => new_template(&path)?,
        Commands::Show => show(&cli.config_root)?,
    }

    Ok(())
}

async fn serve(config_root: &Path, dir: Option<PathBuf>, port: u16) -> Result<()> {
    let root = match dir {
        Some(dir) => dir,
        None => SettingsStore::load(config_root)?
            .root_dir()
            .context("no directory given and none configured; run `cradle open` first")?,
    };

    let bus = EventBus::new(32);
    let mut error_rx = bus.subscribe(Topic::ServerError).await;
    tokio::spawn(async move {
        while let Some(event) = error_rx.recv().await {
            tracing::error!(message = event.message(), "server error");
        }
    });

    let addr: SocketAddr = format!("127.0.0.1:{port}").parse()?;
    let server = Arc::new(ContentServer::new(bus.publisher()));
    server
        .start(ServerConfig::new(&root).with_addr(addr))
        .await?;
    if let Some(base) = server.base_url().await {
        println!("serving {} at {base}", root.display());
        println!("press ctrl-c to stop");
    }

    tokio::signal::ctrl_c().await?;
    server.stop().await?;
    Ok(())
}

fn open(config_root: &Path, file: &Path) -> Result<()> {
    let file = file
        .canonicalize()
        .with_context(|| format!("entry file not found: {}", file.display()))?;
    if !file.is_file() {
        bail!("not a file: {}", file.display());
    }

    let mut store = SettingsStore::load(config_root)?;
    store.set_entry_path(&file)?;
    println!(
        "configured {} (entry {})",
        store
            .root_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        store.entry_file_name()
    );
    Ok(())
}

fn new_template(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("refusing to overwrite existing file: {}", path.display());
    }
    std::fs::write(path, template_html()?)
        .with_context(|| format!("failed to write template: {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

fn show(config_root: &Path) -> Result<()> {
    let store = SettingsStore::load(config_root)?;
    println!("{}", serde_json::to_string_pretty(store.settings())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_persists_directory_and_file_name() {
        let config = tempfile::tempdir().unwrap();
        let content = tempfile::tempdir().unwrap();
        let entry = content.path().join("index.html");
        std::fs::write(&entry, "<html></html>").unwrap();

        open(config.path(), &entry).unwrap();

        let store = SettingsStore::load(config.path()).unwrap();
        assert_eq!(store.root_dir().unwrap(), content.path().canonicalize().unwrap());
        assert_eq!(store.entry_file_name(), "index.html");
    }

    #[test]
    fn open_rejects_missing_file() {
        let config = tempfile::tempdir().unwrap();
        let err = open(config.path(), Path::new("/no/such/file.html")).unwrap_err();
        assert!(err.to_string().contains("entry file not found"));
    }

    #[test]
    fn new_template_writes_and_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.html");

        new_template(&path).unwrap();
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("function init"));

        let err = new_template(&path).unwrap_err();
        assert!(err.to_string().contains("refusing to overwrite"));
    }
}
