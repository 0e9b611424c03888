//! Android keystore validation and key.properties generation.
//!
//! This module handles validating Android keystores and generating
//! the key.properties file read by Flutter/Gradle for release signing.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{KeypropError, Result};
use crate::project::AndroidProject;
use crate::properties::Properties;

use super::resolver::{KEY_ALIAS, KEY_PASSWORD, SigningConfig, STORE_FILE, STORE_PASSWORD};

/// Directory under the app module where imported keystores are kept.
pub const SIGNING_DIR: &str = "signing";

/// Android keystore container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeystoreType {
    Jks,
    Pkcs12,
}

impl KeystoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeystoreType::Jks => "jks",
            KeystoreType::Pkcs12 => "pkcs12",
        }
    }

    /// File extension used when writing a keystore of this type.
    pub fn extension(&self) -> &'static str {
        match self {
            KeystoreType::Jks => "jks",
            KeystoreType::Pkcs12 => "keystore",
        }
    }
}

impl std::str::FromStr for KeystoreType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jks" => Ok(KeystoreType::Jks),
            "pkcs12" | "p12" => Ok(KeystoreType::Pkcs12),
            _ => Err(format!("Unknown keystore type: {}", s)),
        }
    }
}

impl std::fmt::Display for KeystoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Information extracted from a keystore.
#[derive(Debug, Clone)]
pub struct KeystoreInfo {
    /// Type of the keystore (JKS or PKCS12).
    pub keystore_type: KeystoreType,
}

/// Validates the keystore referenced by a signing config.
///
/// Uses the `keytool` CLI to open the keystore and check the alias. The
/// store password is handed over through the environment, not argv.
pub async fn validate_keystore(config: &SigningConfig) -> Result<KeystoreInfo> {
    let keystore_path = config.keystore_path();
    let data = tokio::fs::read(keystore_path).await.map_err(|e| {
        KeypropError::Signing(format!(
            "Failed to read keystore {}: {}",
            keystore_path.display(),
            e
        ))
    })?;

    let keystore_type = detect_keystore_type(&data);

    let output = Command::new("keytool")
        .arg("-list")
        .arg("-keystore")
        .arg(keystore_path)
        .args(["-storepass:env", "KEYPROP_KEYTOOL_STOREPASS", "-alias"])
        .arg(config.key_alias())
        .env("KEYPROP_KEYTOOL_STOREPASS", config.store_password())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| KeypropError::Signing(format!("Failed to run keytool: {}", e)))?;

    if !output.status.success() {
        // keytool reports some failures on stdout
        let mut message = String::from_utf8_lossy(&output.stderr).into_owned();
        message.push_str(&String::from_utf8_lossy(&output.stdout));
        return Err(classify_keytool_error(&message, config.key_alias()));
    }

    tracing::debug!(
        "Validated {} keystore {} with alias '{}'",
        keystore_type,
        keystore_path.display(),
        config.key_alias()
    );

    Ok(KeystoreInfo { keystore_type })
}

/// Maps keytool failure output to a descriptive error.
fn classify_keytool_error(output: &str, alias: &str) -> KeypropError {
    if output.contains("keystore password was incorrect") {
        return KeypropError::Signing("Invalid keystore password".to_string());
    }
    if output.contains("does not exist") {
        return KeypropError::Signing(format!("Alias '{}' not found in keystore", alias));
    }
    if output.contains("Invalid keystore format") {
        return KeypropError::Signing("Invalid keystore format".to_string());
    }

    KeypropError::Signing(format!("Failed to validate keystore: {}", output.trim()))
}

/// Detects the keystore type from its magic bytes.
pub fn detect_keystore_type(data: &[u8]) -> KeystoreType {
    // JKS files start with magic bytes 0xFEEDFEED; PKCS12 is an ASN.1 SEQUENCE
    if data.starts_with(&[0xFE, 0xED, 0xFE, 0xED]) {
        return KeystoreType::Jks;
    }

    KeystoreType::Pkcs12
}

/// Generates key.properties file content for Flutter/Gradle.
///
/// Values are escaped, so Windows paths and passwords containing `=`, `:`
/// or `#` are read back unchanged by `java.util.Properties`.
pub fn generate_key_properties(
    store_file: &str,
    store_password: &str,
    key_alias: &str,
    key_password: &str,
) -> String {
    let mut properties = Properties::new();
    properties.insert(STORE_PASSWORD, store_password);
    properties.insert(KEY_PASSWORD, key_password);
    properties.insert(KEY_ALIAS, key_alias);
    properties.insert(STORE_FILE, store_file);
    properties.to_properties_string()
}

/// Writes the key.properties file for a project.
///
/// Returns the path written. On Unix the file is restricted to the owner
/// before any credentials are written to it.
pub async fn write_key_properties(project: &AndroidProject, config: &SigningConfig) -> Result<PathBuf> {
    if !project.root().is_dir() {
        return Err(KeypropError::Signing(format!(
            "Android directory not found: {}",
            project.root().display()
        )));
    }

    let key_properties_path = project.properties_path().to_path_buf();
    let content = generate_key_properties(
        config.store_file(),
        config.store_password(),
        config.key_alias(),
        config.key_password(),
    );

    let write_err = |e: std::io::Error| KeypropError::Signing(format!("Failed to write key.properties: {}", e));

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(&key_properties_path).await.map_err(write_err)?;

    // An overwritten file keeps its old mode, so tighten it before writing.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(write_err)?;
    }

    file.write_all(content.as_bytes()).await.map_err(write_err)?;
    file.flush().await.map_err(write_err)?;

    tracing::debug!("Wrote key.properties to {}", key_properties_path.display());

    Ok(key_properties_path)
}

/// Removes the key.properties file from a project.
///
/// Returns whether a file was removed.
pub async fn cleanup_key_properties(project: &AndroidProject) -> Result<bool> {
    let key_properties_path = project.properties_path();

    if !key_properties_path.exists() {
        return Ok(false);
    }

    tokio::fs::remove_file(key_properties_path)
        .await
        .map_err(|e| KeypropError::Signing(format!("Failed to remove key.properties: {}", e)))?;
    tracing::debug!("Removed key.properties from {}", key_properties_path.display());

    Ok(true)
}

/// Writes a keystore into `dir`, named after its type.
pub async fn write_keystore(dir: &Path, keystore_data: &[u8], keystore_type: KeystoreType) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| KeypropError::Signing(format!("Failed to create signing directory: {}", e)))?;

    let keystore_path = dir.join(format!("keystore.{}", keystore_type.extension()));

    tokio::fs::write(&keystore_path, keystore_data)
        .await
        .map_err(|e| KeypropError::Signing(format!("Failed to write keystore: {}", e)))?;

    tracing::debug!("Wrote keystore to {}", keystore_path.display());

    Ok(keystore_path)
}

/// Removes key.properties and the imported keystore directory.
pub async fn cleanup_android_signing(project: &AndroidProject) -> Result<()> {
    cleanup_key_properties(project).await?;

    let signing_dir = project.module_dir().join(SIGNING_DIR);
    if signing_dir.exists() {
        tokio::fs::remove_dir_all(&signing_dir).await.map_err(|e| {
            KeypropError::Signing(format!("Failed to remove signing directory: {}", e))
        })?;
        tracing::debug!("Removed signing directory: {}", signing_dir.display());
    }

    Ok(())
}
