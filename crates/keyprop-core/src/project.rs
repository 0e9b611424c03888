//! Android project layout detection.
//!
//! Gradle resolves `key.properties` against the root project and the
//! keystore path against the app module, so both directories are tracked.

use std::path::{Path, PathBuf};

use crate::error::{KeypropError, Result};

/// Default name of the signing properties file.
pub const KEY_PROPERTIES_FILE: &str = "key.properties";

/// Default name of the application module directory.
pub const DEFAULT_APP_MODULE: &str = "app";

/// Default name of the Android directory inside a Flutter project.
pub const DEFAULT_ANDROID_DIR: &str = "android";

/// Layout of an Android Gradle project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidProject {
    root: PathBuf,
    properties_path: PathBuf,
    module_dir: PathBuf,
}

impl AndroidProject {
    /// Creates a project rooted at the given Android directory with the
    /// default `key.properties` and `app` module locations.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            properties_path: root.join(KEY_PROPERTIES_FILE),
            module_dir: root.join(DEFAULT_APP_MODULE),
            root,
        }
    }

    /// Locates the Android project for a workspace.
    ///
    /// Checks, in order:
    /// 1. A Flutter project (`pubspec.yaml`) with an `android/` directory
    /// 2. The workspace itself being a Gradle root (`settings.gradle[.kts]`)
    /// 3. An `android/` directory that is a Gradle root
    pub fn discover(workspace: &Path) -> Result<Self> {
        Self::discover_with(workspace, DEFAULT_ANDROID_DIR)
    }

    /// Like [`AndroidProject::discover`] with a custom Android directory name.
    pub fn discover_with(workspace: &Path, android_dir: &str) -> Result<Self> {
        let android = workspace.join(android_dir);
        if detect_flutter_project(workspace) && android.is_dir() {
            tracing::debug!("Detected Flutter project, Android root at {}", android.display());
            return Ok(Self::new(android));
        }

        if is_gradle_root(workspace) {
            tracing::debug!("Using Gradle root {}", workspace.display());
            return Ok(Self::new(workspace));
        }

        if is_gradle_root(&android) {
            tracing::debug!("Using Gradle root {}", android.display());
            return Ok(Self::new(android));
        }

        Err(KeypropError::Configuration(format!(
            "No Android project found in {}. Expected a Flutter project with an '{}' \
             directory or a Gradle root containing settings.gradle(.kts)",
            workspace.display(),
            android_dir
        )))
    }

    /// Overrides the location of the signing properties file.
    ///
    /// Relative paths are taken relative to the Android root.
    pub fn with_properties_path(mut self, path: impl AsRef<Path>) -> Self {
        self.properties_path = self.root.join(path);
        self
    }

    /// Overrides the application module directory name or path.
    pub fn with_module_dir(mut self, module: impl AsRef<Path>) -> Self {
        self.module_dir = self.root.join(module);
        self
    }

    /// The Android root project directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn properties_path(&self) -> &Path {
        &self.properties_path
    }

    pub fn module_dir(&self) -> &Path {
        &self.module_dir
    }
}

/// Detects if a directory contains a Flutter project.
///
/// A Flutter project is identified by the presence of `pubspec.yaml`.
pub fn detect_flutter_project(workspace: &Path) -> bool {
    workspace.join("pubspec.yaml").exists()
}

fn is_gradle_root(dir: &Path) -> bool {
    dir.join("settings.gradle").exists() || dir.join("settings.gradle.kts").exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_default_layout() {
        let project = AndroidProject::new("/work/android");
        assert_eq!(project.root(), Path::new("/work/android"));
        assert_eq!(
            project.properties_path(),
            Path::new("/work/android/key.properties")
        );
        assert_eq!(project.module_dir(), Path::new("/work/android/app"));
    }

    #[test]
    fn test_overrides() {
        let project = AndroidProject::new("/work/android")
            .with_properties_path("signing/release.properties")
            .with_module_dir("mobile");
        assert_eq!(
            project.properties_path(),
            Path::new("/work/android/signing/release.properties")
        );
        assert_eq!(project.module_dir(), Path::new("/work/android/mobile"));

        let project = AndroidProject::new("/work/android").with_properties_path("/etc/key.properties");
        assert_eq!(project.properties_path(), Path::new("/etc/key.properties"));
    }

    #[test]
    fn test_discover_flutter_project() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pubspec.yaml"), "name: study_sync\n").unwrap();
        std::fs::create_dir(dir.path().join("android")).unwrap();

        let project = AndroidProject::discover(dir.path()).unwrap();
        assert_eq!(project.root(), dir.path().join("android"));
    }

    #[test]
    fn test_discover_gradle_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("settings.gradle.kts"), "").unwrap();

        let project = AndroidProject::discover(dir.path()).unwrap();
        assert_eq!(project.root(), dir.path());
    }

    #[test]
    fn test_discover_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let result = AndroidProject::discover(dir.path());
        assert!(matches!(result, Err(KeypropError::Configuration(_))));
    }
}
