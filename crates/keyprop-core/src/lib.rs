//! Keyprop Core Library
//!
//! Properties parsing, release signing resolution and build variant policy
//! for Android projects signed through `key.properties`.

pub mod error;
pub mod project;
pub mod properties;
pub mod signing;
pub mod variant;

pub use error::{KeypropError, Result};
pub use project::AndroidProject;
pub use properties::Properties;
pub use signing::{KeystoreType, SigningConfig, SigningResolution, resolve_release_signing};
pub use variant::{BuildPlan, BuildVariant, SigningMode, SigningPolicy, VariantConfig};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
