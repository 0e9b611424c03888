//! Release signing for Android builds.
//!
//! This module provides functionality for:
//! - Resolving the release signing configuration from `key.properties`
//! - Android keystore validation and key.properties generation

pub mod android;
pub mod resolver;

pub use android::*;
pub use resolver::*;
