use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::config::{ConfigCommands, handle_config_command};
use commands::signing::{self, WriteArgs};
use config::CliOverrides;

#[derive(Parser)]
#[command(name = "keyprop")]
#[command(about = "Resolve Android release signing from key.properties", long_about = None)]
struct Cli {
    /// Flutter workspace or Gradle root directory
    #[arg(long, global = true, env = "KEYPROP_PROJECT", default_value = ".")]
    project: PathBuf,

    /// Android directory inside a Flutter project (overrides config)
    #[arg(long, global = true)]
    android_dir: Option<String>,

    /// Signing properties file, relative to the Android root (overrides config)
    #[arg(long, global = true)]
    properties: Option<PathBuf>,

    /// Application module directory (overrides config)
    #[arg(long, global = true)]
    module: Option<String>,

    /// Fail instead of producing an unsigned release build
    #[arg(long, global = true)]
    require_signing: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resolved debug/release build configuration
    Resolve {
        /// Variant to resolve (debug, release or all)
        #[arg(long, default_value = "all")]
        variant: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        /// Print passwords instead of masking them
        #[arg(long)]
        show_secrets: bool,
    },

    /// Validate key.properties
    Check {
        /// Also open the keystore with keytool
        #[arg(long)]
        keytool: bool,
    },

    /// Generate key.properties
    Write {
        /// Keystore path, relative to the app module
        #[arg(long, required_unless_present = "import", conflicts_with = "import")]
        store_file: Option<String>,

        /// Copy this keystore into the app module and reference it
        #[arg(long)]
        import: Option<PathBuf>,

        /// Keystore password
        #[arg(long, env = "KEYPROP_STORE_PASSWORD", hide_env_values = true)]
        store_password: String,

        /// Key alias
        #[arg(long)]
        key_alias: String,

        /// Key password
        #[arg(long, env = "KEYPROP_KEY_PASSWORD", hide_env_values = true)]
        key_password: String,

        /// Overwrite an existing key.properties
        #[arg(long)]
        force: bool,
    },

    /// Remove key.properties
    Clean {
        /// Also remove keystores imported with `write --import`
        #[arg(long)]
        keystore: bool,
    },

    /// Show version
    Version,

    /// Manage CLI configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "keyprop=debug,keyprop_core=debug"
    } else {
        "keyprop=info,keyprop_core=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (doesn't override existing env vars)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Config commands don't need a project, handle separately
    if let Commands::Config(cmd) = cli.command {
        return handle_config_command(cmd);
    }

    let overrides = CliOverrides {
        project_dir: cli.project,
        android_dir: cli.android_dir,
        properties_file: cli.properties,
        app_module: cli.module,
        require_signing: cli.require_signing,
    };
    let resolved = config::load_and_resolve(&overrides)?;

    match cli.command {
        Commands::Resolve {
            variant,
            json,
            show_secrets,
        } => signing::resolve(&resolved, &variant, json, show_secrets)?,
        Commands::Check { keytool } => signing::check(&resolved, keytool).await?,
        Commands::Write {
            store_file,
            import,
            store_password,
            key_alias,
            key_password,
            force,
        } => {
            let args = WriteArgs {
                store_file,
                import,
                store_password,
                key_alias,
                key_password,
                force,
            };
            signing::write(&resolved, args).await?
        }
        Commands::Clean { keystore } => signing::clean(&resolved, keystore).await?,
        Commands::Version => println!("keyprop {}", keyprop_core::VERSION),
        Commands::Config(_) => unreachable!(), // Handled above
    }

    Ok(())
}
