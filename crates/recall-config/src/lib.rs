// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Recall memory engine.
//!
//! Provides TOML configuration parsing with strict validation
//! (`deny_unknown_fields`), XDG file hierarchy lookup, and environment
//! variable overrides. Configuration is fixed at construction: load it
//! once at process start and hand it to the components being built.
//!
//! # Usage
//!
//! ```no_run
//! use recall_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("database: {}", config.storage.database_path);
//! ```

pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{ContextConfig, MemoryConfig, RecallConfig, StorageConfig};

use recall_core::RecallError;

/// Load configuration from the XDG hierarchy and validate it.
///
/// Figment load errors and semantic validation errors are both folded
/// into [`RecallError::Config`] so construction has a single failure path.
pub fn load_and_validate() -> Result<RecallConfig, RecallError> {
    let config = loader::load_config().map_err(|e| RecallError::Config(e.to_string()))?;
    validate(&config)?;
    Ok(config)
}

/// Load configuration from a TOML string and validate it.
///
/// Useful for testing and explicit configuration.
pub fn load_and_validate_str(toml_content: &str) -> Result<RecallConfig, RecallError> {
    let config =
        loader::load_config_from_str(toml_content).map_err(|e| RecallError::Config(e.to_string()))?;
    validate(&config)?;
    Ok(config)
}

/// Run semantic validation, folding collected errors into one message.
pub fn validate(config: &RecallConfig) -> Result<(), RecallError> {
    validation::validate_config(config).map_err(|errors| RecallError::Config(errors.join("; ")))
}
