//! Build variant policy.
//!
//! Release builds take their signing config from `key.properties` and are
//! minified with resource shrinking. Debug builds never consult the
//! properties file and keep the toolchain's default debug signing.

use serde::{Deserialize, Serialize};

use crate::error::{KeypropError, Result};
use crate::project::AndroidProject;
use crate::signing::{SigningConfig, SigningResolution, resolve_project_signing};

/// Optimized ProGuard rules shipped with the Android toolchain.
pub const DEFAULT_PROGUARD_FILE: &str = "proguard-android-optimize.txt";

/// Project-specific ProGuard rules in the app module.
pub const PROJECT_PROGUARD_FILE: &str = "proguard-rules.pro";

/// A named build configuration producing a distinct artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildVariant {
    Debug,
    Release,
}

impl BuildVariant {
    pub const ALL: [BuildVariant; 2] = [BuildVariant::Debug, BuildVariant::Release];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildVariant::Debug => "debug",
            BuildVariant::Release => "release",
        }
    }
}

impl std::str::FromStr for BuildVariant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(BuildVariant::Debug),
            "release" => Ok(BuildVariant::Release),
            _ => Err(format!("Unknown build variant: {}", s)),
        }
    }
}

impl std::fmt::Display for BuildVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What to do when the release variant has no signing properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SigningPolicy {
    /// Build the release artifact unsigned.
    #[default]
    AllowUnsigned,
    /// Fail before any artifact is produced.
    RequireSigned,
}

/// How a variant's artifact gets signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningMode {
    /// Signed with credentials from `key.properties`.
    Release(SigningConfig),
    /// Release without signing properties.
    Unsigned,
    /// No override; the toolchain's debug keystore applies.
    DebugDefault,
}

impl SigningMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningMode::Release(_) => "release",
            SigningMode::Unsigned => "unsigned",
            SigningMode::DebugDefault => "debug-default",
        }
    }
}

/// Resolved settings for one build variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantConfig {
    pub variant: BuildVariant,
    pub signing: SigningMode,
    pub debuggable: bool,
    pub minify_enabled: bool,
    pub shrink_resources: bool,
    pub proguard_files: Vec<String>,
}

impl VariantConfig {
    /// Debug variant. Never touches `key.properties`.
    pub fn debug() -> Self {
        Self {
            variant: BuildVariant::Debug,
            signing: SigningMode::DebugDefault,
            debuggable: true,
            minify_enabled: false,
            shrink_resources: false,
            proguard_files: Vec::new(),
        }
    }

    /// Release variant, signed when the project's properties file exists.
    pub fn release(project: &AndroidProject, policy: SigningPolicy) -> Result<Self> {
        let signing = match resolve_project_signing(project)? {
            SigningResolution::Configured(config) => SigningMode::Release(config),
            SigningResolution::MissingFile { path } => match policy {
                SigningPolicy::AllowUnsigned => SigningMode::Unsigned,
                SigningPolicy::RequireSigned => return Err(KeypropError::SigningRequired { path }),
            },
        };

        Ok(Self {
            variant: BuildVariant::Release,
            signing,
            debuggable: false,
            minify_enabled: true,
            shrink_resources: true,
            proguard_files: vec![
                DEFAULT_PROGUARD_FILE.to_string(),
                PROJECT_PROGUARD_FILE.to_string(),
            ],
        })
    }

    pub fn resolve(variant: BuildVariant, project: &AndroidProject, policy: SigningPolicy) -> Result<Self> {
        match variant {
            BuildVariant::Debug => Ok(Self::debug()),
            BuildVariant::Release => Self::release(project, policy),
        }
    }

    pub fn signing_config(&self) -> Option<&SigningConfig> {
        match &self.signing {
            SigningMode::Release(config) => Some(config),
            SigningMode::Unsigned | SigningMode::DebugDefault => None,
        }
    }
}

/// Resolved configuration for a set of variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    variants: Vec<VariantConfig>,
}

impl BuildPlan {
    /// Resolves each requested variant in order, skipping repeats.
    ///
    /// Any signing error aborts the whole plan so that no artifact is built
    /// with partial credentials.
    pub fn resolve(project: &AndroidProject, variants: &[BuildVariant], policy: SigningPolicy) -> Result<Self> {
        let mut resolved: Vec<VariantConfig> = Vec::with_capacity(variants.len());

        for &variant in variants {
            if resolved.iter().any(|v| v.variant == variant) {
                continue;
            }
            resolved.push(VariantConfig::resolve(variant, project, policy)?);
        }

        Ok(Self { variants: resolved })
    }

    pub fn variants(&self) -> &[VariantConfig] {
        &self.variants
    }

    pub fn get(&self, variant: BuildVariant) -> Option<&VariantConfig> {
        self.variants.iter().find(|v| v.variant == variant)
    }
}
