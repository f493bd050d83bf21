// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: positive limits, non-empty paths. Runs before any component
//! is constructed so bad configuration fails fast.

use crate::model::RecallConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<String>)` with
/// every collected validation error (does not stop at the first).
pub fn validate_config(config: &RecallConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push("storage.database_path must not be empty".to_string());
    }

    if config.memory.embedding_dimension == 0 {
        errors.push("memory.embedding_dimension must be positive".to_string());
    }

    if config.memory.embedding_cache_size == 0 {
        errors.push("memory.embedding_cache_size must be positive".to_string());
    }

    if config.memory.query_cache_size == 0 {
        errors.push("memory.query_cache_size must be positive".to_string());
    }

    if config.memory.optimization_interval == 0 {
        errors.push("memory.optimization_interval must be positive".to_string());
    }

    if config.memory.vector_scan_limit == 0 {
        errors.push("memory.vector_scan_limit must be positive".to_string());
    }

    if config.memory.maintenance_period_secs == 0 {
        errors.push("memory.maintenance_period_secs must be positive".to_string());
    }

    if config.memory.max_summary_tokens == 0 {
        errors.push("memory.max_summary_tokens must be positive".to_string());
    }

    if config.memory.prune_older_than_days <= 0 {
        errors.push(format!(
            "memory.prune_older_than_days must be positive, got {}",
            config.memory.prune_older_than_days
        ));
    }

    if config.context.max_context_tokens == 0 {
        errors.push("context.max_context_tokens must be positive".to_string());
    }

    if config.context.sliding_window_size == 0 {
        errors.push("context.sliding_window_size must be positive".to_string());
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&RecallConfig::default()).is_ok());
    }

    #[test]
    fn zero_dimension_fails_validation() {
        let mut config = RecallConfig::default();
        config.memory.embedding_dimension = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("embedding_dimension")));
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = RecallConfig::default();
        config.storage.database_path = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("database_path")));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = RecallConfig::default();
        config.memory.embedding_dimension = 0;
        config.memory.embedding_cache_size = 0;
        config.context.sliding_window_size = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn negative_prune_days_fails_validation() {
        let mut config = RecallConfig::default();
        config.memory.prune_older_than_days = -7;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("prune_older_than_days")));
    }
}
