//! CLI configuration loading and resolution.
//!
//! Supports an optional `~/.keyprop/config.huml` file with priority order:
//! CLI flags > environment variables > config file > defaults.

use anyhow::{Context, Result, bail};
use keyprop_core::project::{DEFAULT_ANDROID_DIR, DEFAULT_APP_MODULE};
use keyprop_core::{AndroidProject, SigningPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// CLI configuration loaded from config.huml. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CliConfig {
    /// Android directory inside a Flutter project (e.g., "android").
    pub android_dir: Option<String>,
    /// Signing properties file, relative to the Android root.
    pub properties_file: Option<String>,
    /// Application module directory (e.g., "app").
    pub app_module: Option<String>,
    /// Fail instead of building an unsigned release.
    pub require_release_signing: Option<bool>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub project_dir: PathBuf,
    pub android_dir: Option<String>,
    pub properties_file: Option<PathBuf>,
    pub app_module: Option<String>,
    pub require_signing: bool,
}

/// Resolved configuration after applying priority rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub project_dir: PathBuf,
    pub android_dir: String,
    /// Custom properties file; `None` means `<android root>/key.properties`.
    pub properties_file: Option<PathBuf>,
    pub app_module: String,
    pub require_release_signing: bool,
}

impl ResolvedConfig {
    /// Locates the Android project described by this configuration.
    pub fn project(&self) -> Result<AndroidProject> {
        let mut project = AndroidProject::discover_with(&self.project_dir, &self.android_dir)?
            .with_module_dir(&self.app_module);
        if let Some(properties) = &self.properties_file {
            project = project.with_properties_path(properties);
        }
        Ok(project)
    }

    pub fn policy(&self) -> SigningPolicy {
        if self.require_release_signing {
            SigningPolicy::RequireSigned
        } else {
            SigningPolicy::AllowUnsigned
        }
    }
}

/// Returns the default config file path (~/.keyprop/config.huml).
pub fn default_config_path() -> Result<PathBuf> {
    config_dir().map(|d| d.join("config.huml"))
}

/// Returns the config directory path (~/.keyprop).
pub fn config_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|h| h.join(".keyprop"))
        .context("Could not determine home directory")
}

/// Returns the config file in effect, honoring `KEYPROP_CONFIG`.
pub fn config_path() -> Result<PathBuf> {
    match std::env::var("KEYPROP_CONFIG") {
        Ok(p) => Ok(PathBuf::from(p)),
        Err(_) => default_config_path(),
    }
}

/// Load configuration from the config file.
///
/// Returns `Ok(None)` if the config file doesn't exist.
/// Returns an error if the file exists but is invalid.
pub fn load_config() -> Result<Option<CliConfig>> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Option<CliConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let config: CliConfig = huml_rs::serde::from_str(&content)
        .with_context(|| format!("Invalid HUML in {}", path.display()))?;

    validate_config(&config)?;
    check_file_permissions(path);

    Ok(Some(config))
}

/// Reject values that cannot name a directory or file.
fn validate_config(config: &CliConfig) -> Result<()> {
    let fields = [
        ("android_dir", &config.android_dir),
        ("properties_file", &config.properties_file),
        ("app_module", &config.app_module),
    ];

    for (name, value) in fields {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            bail!("Config key '{}' must not be empty", name);
        }
    }

    Ok(())
}

/// Warn if config file has overly permissive permissions (on Unix).
#[cfg(unix)]
fn check_file_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(metadata) = std::fs::metadata(path) {
        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            tracing::warn!(
                "{} has overly permissive permissions ({:o}). Consider running: chmod 600 {}",
                path.display(),
                mode & 0o777,
                path.display()
            );
        }
    }
}

#[cfg(not(unix))]
fn check_file_permissions(_path: &Path) {}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("Invalid boolean for {}: '{}'", name, value),
    }
}

/// Loads the config file and resolves it against flags and environment.
///
/// A config file that exists but cannot be read or parsed is an error, so a
/// broken file never falls back to defaults such as unsigned releases.
pub fn load_and_resolve(overrides: &CliOverrides) -> Result<ResolvedConfig> {
    let file_config = load_config().context("Failed to load config file")?;
    resolve_config(overrides, file_config)
}

/// Resolve configuration by applying priority rules.
///
/// Priority order (highest to lowest):
/// 1. CLI flags (`--android-dir`, `--properties`, `--module`, `--require-signing`)
/// 2. Environment variables (`KEYPROP_ANDROID_DIR`, `KEYPROP_PROPERTIES`,
///    `KEYPROP_APP_MODULE`, `KEYPROP_REQUIRE_SIGNING`)
/// 3. Config file
/// 4. Defaults (`android`, `key.properties`, `app`, unsigned release allowed)
pub fn resolve_config(overrides: &CliOverrides, file_config: Option<CliConfig>) -> Result<ResolvedConfig> {
    let file = file_config.unwrap_or_default();

    let mut resolved = ResolvedConfig {
        project_dir: overrides.project_dir.clone(),
        android_dir: file.android_dir.unwrap_or_else(|| DEFAULT_ANDROID_DIR.to_string()),
        properties_file: file.properties_file.map(PathBuf::from),
        app_module: file.app_module.unwrap_or_else(|| DEFAULT_APP_MODULE.to_string()),
        require_release_signing: file.require_release_signing.unwrap_or(false),
    };

    if let Some(dir) = env_var("KEYPROP_ANDROID_DIR") {
        resolved.android_dir = dir;
    }
    if let Some(path) = env_var("KEYPROP_PROPERTIES") {
        resolved.properties_file = Some(PathBuf::from(path));
    }
    if let Some(module) = env_var("KEYPROP_APP_MODULE") {
        resolved.app_module = module;
    }
    if let Some(value) = env_var("KEYPROP_REQUIRE_SIGNING") {
        resolved.require_release_signing = parse_bool("KEYPROP_REQUIRE_SIGNING", &value)?;
    }

    if let Some(dir) = &overrides.android_dir {
        resolved.android_dir = dir.clone();
    }
    if let Some(path) = &overrides.properties_file {
        resolved.properties_file = Some(path.clone());
    }
    if let Some(module) = &overrides.app_module {
        resolved.app_module = module.clone();
    }
    if overrides.require_signing {
        resolved.require_release_signing = true;
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV_KEYS: [&str; 4] = [
        "KEYPROP_ANDROID_DIR",
        "KEYPROP_PROPERTIES",
        "KEYPROP_APP_MODULE",
        "KEYPROP_REQUIRE_SIGNING",
    ];

    fn without_env<R>(f: impl FnOnce() -> R) -> R {
        temp_env::with_vars_unset(ENV_KEYS, f)
    }

    #[test]
    fn test_resolve_defaults() {
        let resolved = without_env(|| resolve_config(&CliOverrides::default(), None).unwrap());

        assert_eq!(resolved.android_dir, "android");
        assert_eq!(resolved.app_module, "app");
        assert!(resolved.properties_file.is_none());
        assert!(!resolved.require_release_signing);
        assert_eq!(resolved.policy(), SigningPolicy::AllowUnsigned);
    }

    #[test]
    fn test_resolve_with_config_file() {
        let config = CliConfig {
            android_dir: Some("mobile".to_string()),
            properties_file: Some("signing/release.properties".to_string()),
            app_module: None,
            require_release_signing: Some(true),
        };

        let resolved = without_env(|| resolve_config(&CliOverrides::default(), Some(config)).unwrap());

        assert_eq!(resolved.android_dir, "mobile");
        assert_eq!(
            resolved.properties_file,
            Some(PathBuf::from("signing/release.properties"))
        );
        assert_eq!(resolved.app_module, "app");
        assert_eq!(resolved.policy(), SigningPolicy::RequireSigned);
    }

    #[test]
    fn test_env_overrides_config_file() {
        let config = CliConfig {
            app_module: Some("app".to_string()),
            require_release_signing: Some(true),
            ..Default::default()
        };

        let resolved = temp_env::with_vars(
            [
                ("KEYPROP_ANDROID_DIR", None),
                ("KEYPROP_PROPERTIES", None),
                ("KEYPROP_APP_MODULE", Some("mobile")),
                ("KEYPROP_REQUIRE_SIGNING", Some("false")),
            ],
            || resolve_config(&CliOverrides::default(), Some(config)).unwrap(),
        );

        assert_eq!(resolved.app_module, "mobile");
        assert!(!resolved.require_release_signing);
    }

    #[test]
    fn test_cli_flags_override_env() {
        let overrides = CliOverrides {
            project_dir: PathBuf::from("/work"),
            app_module: Some("flag-module".to_string()),
            properties_file: Some(PathBuf::from("/secrets/key.properties")),
            require_signing: true,
            ..Default::default()
        };

        let resolved = temp_env::with_vars(
            [
                ("KEYPROP_ANDROID_DIR", None),
                ("KEYPROP_PROPERTIES", Some("env.properties")),
                ("KEYPROP_APP_MODULE", Some("env-module")),
                ("KEYPROP_REQUIRE_SIGNING", Some("0")),
            ],
            || resolve_config(&overrides, None).unwrap(),
        );

        assert_eq!(resolved.project_dir, PathBuf::from("/work"));
        assert_eq!(resolved.app_module, "flag-module");
        assert_eq!(
            resolved.properties_file,
            Some(PathBuf::from("/secrets/key.properties"))
        );
        assert!(resolved.require_release_signing);
    }

    #[test]
    fn test_invalid_env_bool() {
        let result = temp_env::with_vars(
            [
                ("KEYPROP_ANDROID_DIR", None),
                ("KEYPROP_PROPERTIES", None),
                ("KEYPROP_APP_MODULE", None),
                ("KEYPROP_REQUIRE_SIGNING", Some("maybe")),
            ],
            || resolve_config(&CliOverrides::default(), None),
        );
        assert!(result.unwrap_err().to_string().contains("KEYPROP_REQUIRE_SIGNING"));
    }

    #[test]
    fn test_validate_empty_value() {
        let config = CliConfig {
            app_module: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
        assert!(validate_config(&CliConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.huml");
        std::fs::write(
            &path,
            "%HUML v0.2.0\nrequire_release_signing: true\nandroid_dir: android\n",
        )
        .unwrap();

        let result = temp_env::with_vars(
            [
                ("KEYPROP_CONFIG", Some(path.to_str().unwrap())),
                ("KEYPROP_ANDROID_DIR", None),
                ("KEYPROP_PROPERTIES", None),
                ("KEYPROP_APP_MODULE", None),
                ("KEYPROP_REQUIRE_SIGNING", None),
            ],
            || load_and_resolve(&CliOverrides::default()),
        );

        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to load config file"));
    }

    #[test]
    fn test_valid_config_file_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.huml");
        std::fs::write(&path, "%HUML v0.2.0\nrequire_release_signing: true\n").unwrap();

        let resolved = temp_env::with_vars(
            [
                ("KEYPROP_CONFIG", Some(path.to_str().unwrap())),
                ("KEYPROP_ANDROID_DIR", None),
                ("KEYPROP_PROPERTIES", None),
                ("KEYPROP_APP_MODULE", None),
                ("KEYPROP_REQUIRE_SIGNING", None),
            ],
            || load_and_resolve(&CliOverrides::default()),
        )
        .unwrap();

        assert_eq!(resolved.policy(), SigningPolicy::RequireSigned);
    }

    #[test]
    fn test_load_missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config_from(&dir.path().join("config.huml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_resolved_project_applies_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pubspec.yaml"), "name: study_sync\n").unwrap();
        std::fs::create_dir(dir.path().join("android")).unwrap();

        let resolved = ResolvedConfig {
            project_dir: dir.path().to_path_buf(),
            android_dir: "android".to_string(),
            properties_file: Some(PathBuf::from("release.properties")),
            app_module: "mobile".to_string(),
            require_release_signing: false,
        };

        let project = resolved.project().unwrap();
        assert_eq!(
            project.properties_path(),
            dir.path().join("android/release.properties")
        );
        assert_eq!(project.module_dir(), dir.path().join("android/mobile"));
    }
}
