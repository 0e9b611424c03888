//! Release signing resolution from `key.properties`.
//!
//! A missing file leaves the release variant unsigned. A present file must
//! carry all four signing keys; anything less is a hard error naming the
//! first key that is absent or empty.

use std::fmt;
use std::path::{Path, PathBuf};

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{KeypropError, Result};
use crate::project::AndroidProject;
use crate::properties::Properties;

pub const STORE_FILE: &str = "storeFile";
pub const STORE_PASSWORD: &str = "storePassword";
pub const KEY_ALIAS: &str = "keyAlias";
pub const KEY_PASSWORD: &str = "keyPassword";

/// Required signing keys, in the order they are validated.
pub const REQUIRED_KEYS: [&str; 4] = [STORE_FILE, STORE_PASSWORD, KEY_ALIAS, KEY_PASSWORD];

/// Credentials used to sign the release variant.
///
/// Passwords are wiped from memory when the config is dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SigningConfig {
    /// `storeFile` exactly as written in the properties file.
    store_file: String,
    /// `storeFile` resolved against the app module directory.
    #[zeroize(skip)]
    keystore_path: PathBuf,
    store_password: String,
    key_alias: String,
    key_password: String,
}

impl SigningConfig {
    /// Builds a config from explicit values. Relative store files are
    /// resolved against `module_dir`.
    pub fn new(
        store_file: impl Into<String>,
        store_password: impl Into<String>,
        key_alias: impl Into<String>,
        key_password: impl Into<String>,
        module_dir: &Path,
    ) -> Self {
        let store_file = store_file.into();
        Self {
            keystore_path: module_dir.join(&store_file),
            store_file,
            store_password: store_password.into(),
            key_alias: key_alias.into(),
            key_password: key_password.into(),
        }
    }

    /// Validates parsed properties and extracts the four signing values.
    ///
    /// `source` is only used to name the file in error messages.
    pub fn from_properties(properties: &Properties, module_dir: &Path, source: &Path) -> Result<Self> {
        let [store_file, store_password, key_alias, key_password] =
            REQUIRED_KEYS.map(|key| required(properties, key, source));

        for key in properties.keys().filter(|k| !REQUIRED_KEYS.contains(k)) {
            tracing::debug!("Ignoring unknown signing property '{}' in {}", key, source.display());
        }

        Ok(Self::new(
            store_file?,
            store_password?,
            key_alias?,
            key_password?,
            module_dir,
        ))
    }

    pub fn store_file(&self) -> &str {
        &self.store_file
    }

    /// Path to the keystore as Gradle's `file()` would resolve it.
    pub fn keystore_path(&self) -> &Path {
        &self.keystore_path
    }

    pub fn store_password(&self) -> &str {
        &self.store_password
    }

    pub fn key_alias(&self) -> &str {
        &self.key_alias
    }

    pub fn key_password(&self) -> &str {
        &self.key_password
    }
}

impl fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningConfig")
            .field("store_file", &self.store_file)
            .field("keystore_path", &self.keystore_path)
            .field("store_password", &"<redacted>")
            .field("key_alias", &self.key_alias)
            .field("key_password", &"<redacted>")
            .finish()
    }
}

fn required(properties: &Properties, key: &'static str, source: &Path) -> Result<String> {
    match properties.get(key) {
        None => Err(KeypropError::MissingSigningProperty {
            key,
            path: source.to_path_buf(),
        }),
        Some("") => Err(KeypropError::EmptySigningProperty {
            key,
            path: source.to_path_buf(),
        }),
        Some(value) => Ok(value.to_string()),
    }
}

/// Outcome of release signing resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningResolution {
    /// All four signing properties were present.
    Configured(SigningConfig),
    /// No properties file; the release variant stays unsigned.
    MissingFile { path: PathBuf },
}

impl SigningResolution {
    pub fn is_configured(&self) -> bool {
        matches!(self, SigningResolution::Configured(_))
    }

    pub fn config(&self) -> Option<&SigningConfig> {
        match self {
            SigningResolution::Configured(config) => Some(config),
            SigningResolution::MissingFile { .. } => None,
        }
    }

    pub fn into_config(self) -> Option<SigningConfig> {
        match self {
            SigningResolution::Configured(config) => Some(config),
            SigningResolution::MissingFile { .. } => None,
        }
    }
}

/// Resolves the release signing configuration.
///
/// - File missing: `MissingFile`, no signing fields are set
/// - File present and complete: `Configured` with the values as written
/// - File present but incomplete: error naming the first missing key
/// - Other I/O or parse failures: propagated
pub fn resolve_release_signing(properties_path: &Path, module_dir: &Path) -> Result<SigningResolution> {
    let Some(properties) = Properties::load(properties_path)? else {
        tracing::warn!(
            "{} not found, release build will be unsigned",
            properties_path.display()
        );
        return Ok(SigningResolution::MissingFile {
            path: properties_path.to_path_buf(),
        });
    };

    let config = SigningConfig::from_properties(&properties, module_dir, properties_path)?;
    tracing::debug!(
        "Resolved release signing with alias '{}' from {}",
        config.key_alias(),
        properties_path.display()
    );

    Ok(SigningResolution::Configured(config))
}

/// Resolves release signing using a project's layout.
pub fn resolve_project_signing(project: &AndroidProject) -> Result<SigningResolution> {
    resolve_release_signing(project.properties_path(), project.module_dir())
}
