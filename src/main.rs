use std::{
    env,
    path::{Path, PathBuf},
    process,
};

use anyhow::bail;
use clap::{Args, Parser, Subcommand};
use launcher_host::{
    app::App,
    config::{ConfigManager, EnvConfigManager, HostSettings},
    logger::init_tracing,
    manifest::PluginManifest,
    schema::write_schema,
};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "launcher-host",
    about = "Runs launcher plugins and routes the UI's intents to them",
    version = "0.2.0"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the host
    Run(RunArgs),

    /// Check a plugin manifest
    Validate { file: PathBuf },

    /// Emit JSON‐Schema into `<root>/schemas`
    Schema,

    /// Read or write host settings in `<root>/config/.env`
    Config(ConfigArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Log level (e.g. error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Override LAUNCHER_ADDRESS
    #[arg(long)]
    address: Option<String>,

    /// Override LAUNCHER_PORT
    #[arg(long)]
    port: Option<u16>,

    /// Override LAUNCHER_PLUGIN_TIMEOUT_MS, 0 disables the timeout
    #[arg(long)]
    plugin_timeout_ms: Option<u64>,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    Get { key: String },
    Set { key: String, value: String },
}

/// Resolve the host root directory from the environment or use default.
pub fn resolve_root_dir() -> PathBuf {
    if let Ok(path) = env::var("LAUNCHER_ROOT") {
        PathBuf::from(path)
    } else {
        PathBuf::from("./launcher")
    }
}

fn config_manager(root: &Path) -> ConfigManager {
    ConfigManager(EnvConfigManager::new(root.join("config").join(".env")))
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let root = resolve_root_dir();
    match cli.command.unwrap_or(Commands::Run(RunArgs {
        log_level: "info".to_string(),
        ..Default::default()
    })) {
        Commands::Run(args) => run(root, args).await,
        Commands::Validate { file } => {
            let manifest = PluginManifest::load(&file)?;
            match manifest.validate() {
                Ok(cmd) => {
                    println!("✅ Manifest for `{}` is valid.", cmd.id);
                    Ok(())
                }
                Err(e) => bail!("{}: {}", file.display(), e),
            }
        }
        Commands::Schema => {
            let out_dir = root.join("schemas");
            for file in write_schema(&out_dir)? {
                println!("wrote {}", out_dir.join(file).display());
            }
            Ok(())
        }
        Commands::Config(args) => {
            let config = config_manager(&root);
            match args.command {
                ConfigCommands::Get { key } => match config.0.get(&key).await {
                    Some(value) => println!("{key}={value}"),
                    None => bail!("{key} is not set"),
                },
                ConfigCommands::Set { key, value } => {
                    if let Err(e) = config.0.set(&key, &value).await {
                        bail!("could not set {key}: {e}");
                    }
                    println!("{key}={value}");
                }
            }
            Ok(())
        }
    }
}

async fn run(root: PathBuf, args: RunArgs) -> anyhow::Result<()> {
    let _log_guards = init_tracing(
        root.clone(),
        "logs/launcher.log",
        "logs/launcher_requests.log",
        &args.log_level,
    )?;
    info!("launcher host starting up…");

    let config = config_manager(&root);
    let mut settings = HostSettings::load(&config).await?;
    if let Some(address) = args.address {
        settings.address = address;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(ms) = args.plugin_timeout_ms {
        settings.plugin_timeout_ms = ms;
    }

    let mut app = App::new(&settings);
    let host = app.host();
    host.register_factory(plugin_mock::NAME, plugin_mock::factory());
    if let Err(e) = host.add_plugin_with(plugin_mock::command().into(), plugin_mock::factory()) {
        error!(error = %e, "built-in echo plugin not registered");
    }
    let loaded = app.load_plugins(&root, &settings);
    info!(loaded, wanted = settings.plugins.len(), "manifests loaded");

    let addr = match app.start(&settings.bind_addr()).await {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to start launcher host: {:#}", e);
            process::exit(1);
        }
    };

    println!("Launcher host listening on ws://{addr}; press Ctrl‐C to exit");
    tokio::signal::ctrl_c().await?;

    println!("\nShutting down…");
    app.shutdown().await;
    println!("Goodbye!");
    Ok(())
}
