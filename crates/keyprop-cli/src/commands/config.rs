//! `keyprop config` commands for managing CLI configuration.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use std::fs;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use keyprop_core::project::{DEFAULT_ANDROID_DIR, DEFAULT_APP_MODULE, KEY_PROPERTIES_FILE};

use crate::config::{CliConfig, config_path, load_config};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create a new config file
    Init {
        /// Android directory inside Flutter projects
        #[arg(long)]
        android_dir: Option<String>,

        /// Signing properties file, relative to the Android root
        #[arg(long)]
        properties_file: Option<String>,

        /// Application module directory
        #[arg(long)]
        app_module: Option<String>,

        /// Fail instead of producing unsigned release builds
        #[arg(long)]
        require_signing: bool,

        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration
    Show,

    /// Show config file path
    Path,
}

pub fn handle_config_command(cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Init {
            android_dir,
            properties_file,
            app_module,
            require_signing,
            force,
        } => {
            let config = CliConfig {
                android_dir: Some(android_dir.unwrap_or_else(|| DEFAULT_ANDROID_DIR.to_string())),
                properties_file: Some(properties_file.unwrap_or_else(|| KEY_PROPERTIES_FILE.to_string())),
                app_module: Some(app_module.unwrap_or_else(|| DEFAULT_APP_MODULE.to_string())),
                require_release_signing: Some(require_signing),
            };
            init_config(&config, force)
        }
        ConfigCommands::Show => show_config(),
        ConfigCommands::Path => show_path(),
    }
}

/// Create a new config file.
fn init_config(config: &CliConfig, force: bool) -> Result<()> {
    let path = config_path()?;

    if path.exists() && !force {
        bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(dir) = path.parent() {
        if !dir.exists() {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
            #[cfg(unix)]
            fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
        }
    }

    write_config(&path, config)?;

    println!("Created config file at {}", path.display());
    Ok(())
}

/// Display current configuration.
fn show_config() -> Result<()> {
    let path = config_path()?;

    let Some(config) = load_config()? else {
        println!("No config file found at {}", path.display());
        println!();
        println!("Using defaults:");
        println!("  android_dir:             {}", DEFAULT_ANDROID_DIR);
        println!("  properties_file:         {}", KEY_PROPERTIES_FILE);
        println!("  app_module:              {}", DEFAULT_APP_MODULE);
        println!("  require_release_signing: false");
        println!();
        println!("Run 'keyprop config init' to create a config file.");
        return Ok(());
    };

    println!("Config file: {}", path.display());
    println!();
    println!("  android_dir:             {}", config.android_dir.as_deref().unwrap_or("(default)"));
    println!("  properties_file:         {}", config.properties_file.as_deref().unwrap_or("(default)"));
    println!("  app_module:              {}", config.app_module.as_deref().unwrap_or("(default)"));
    println!(
        "  require_release_signing: {}",
        config
            .require_release_signing
            .map_or("(default)".to_string(), |v| v.to_string())
    );

    Ok(())
}

/// Show the config file path.
fn show_path() -> Result<()> {
    println!("{}", config_path()?.display());

    if let Ok(env_path) = std::env::var("KEYPROP_CONFIG") {
        println!();
        println!("Note: KEYPROP_CONFIG is set to: {}", env_path);
    }

    Ok(())
}

/// Write config to file with HUML formatting and owner-only permissions.
fn write_config(path: &Path, config: &CliConfig) -> Result<()> {
    let content = serialize_to_huml(config);

    fs::write(path, &content).with_context(|| format!("Failed to write {}", path.display()))?;

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Serialize config to HUML format.
///
/// huml-rs only deserializes, so the document is generated by hand.
fn serialize_to_huml(config: &CliConfig) -> String {
    let mut output = String::from("%HUML v0.2.0\n");

    let strings = [
        ("android_dir", &config.android_dir),
        ("properties_file", &config.properties_file),
        ("app_module", &config.app_module),
    ];
    for (key, value) in strings {
        if let Some(value) = value {
            output.push_str(&format!("{}: {}\n", key, quote(value)));
        }
    }

    if let Some(require) = config.require_release_signing {
        output.push_str(&format!("require_release_signing: {}\n", require));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from;

    #[test]
    fn test_serialize_to_huml() {
        let config = CliConfig {
            android_dir: Some("android".to_string()),
            properties_file: None,
            app_module: Some("app".to_string()),
            require_release_signing: Some(true),
        };

        let huml = serialize_to_huml(&config);
        assert!(huml.starts_with("%HUML v0.2.0\n"));
        assert!(huml.contains("android_dir: \"android\"\n"));
        assert!(!huml.contains("properties_file"));
        assert!(huml.contains("require_release_signing: true\n"));
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(r#"a"b\c"#), r#""a\"b\\c""#);
    }

    #[test]
    fn test_written_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.huml");
        let config = CliConfig {
            android_dir: Some("android".to_string()),
            properties_file: Some("key.properties".to_string()),
            app_module: Some("app".to_string()),
            require_release_signing: Some(false),
        };

        write_config(&path, &config).unwrap();
        let loaded = load_config_from(&path).unwrap().unwrap();

        assert_eq!(loaded, config);
    }
}
