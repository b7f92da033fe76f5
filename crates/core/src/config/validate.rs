use std::collections::HashSet;

use super::{types::Config, ConfigError};

/// Validate configuration values
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let harvester = &config.harvester;
    if harvester.keywords.iter().all(|k| k.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "harvester.keywords must contain at least one non-empty keyword".to_string(),
        ));
    }
    if harvester.year.len() != 4 || !harvester.year.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::ValidationError(format!(
            "harvester.year must be a four digit year, got '{}'",
            harvester.year
        )));
    }
    if harvester.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "harvester.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.resolver.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "resolver.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.resolver.listen_port == Some(u16::MAX) {
        return Err(ConfigError::ValidationError(format!(
            "resolver.listen_port must be below {}",
            u16::MAX
        )));
    }

    if config.lanes.is_empty() {
        return Err(ConfigError::ValidationError(
            "at least one [[lanes]] entry is required".to_string(),
        ));
    }

    let mut names = HashSet::new();
    let mut series = HashSet::new();
    for lane in &config.lanes {
        if lane.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "lane name cannot be empty".to_string(),
            ));
        }
        if !names.insert(lane.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate lane name '{}'",
                lane.name
            )));
        }
        if lane.series_id.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "lane '{}' has an empty series_id",
                lane.name
            )));
        }
        if !series.insert((lane.series_id.as_str(), lane.quality)) {
            return Err(ConfigError::ValidationError(format!(
                "series_id '{}' with quality {} is used by more than one lane",
                lane.series_id, lane.quality
            )));
        }
        if lane.retain_rounds == Some(0) {
            return Err(ConfigError::ValidationError(format!(
                "lane '{}': retain_rounds cannot be 0",
                lane.name
            )));
        }
    }

    Ok(())
}
