//! Default configuration file generation.
//!
//! Writes a commented `duskshift.toml` with aligned inline comments so the
//! generated file documents every setting it contains.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::common::constants::*;

/// Create a default config file, optionally seeded with coordinates.
///
/// `coords` is `(latitude, longitude, city)`. Without it the file gets
/// placeholder coordinates the user is expected to replace.
pub fn create_default_config(path: &Path, coords: Option<(f64, f64, String)>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let (lat, lon, city) =
        coords.unwrap_or((DEFAULT_LATITUDE, DEFAULT_LONGITUDE, "Chicago".to_string()));

    let config_content = ConfigBuilder::new()
        .add_section("profile")
        .add_setting(
            "name",
            "\"default\"",
            "Built-in (\"default\", \"reading\") or a name of your own",
        )
        .add_setting(
            "day_temp",
            &DEFAULT_DAY_TEMP.to_string(),
            &format!("Color temperature during day ({MINIMUM_TEMP}-{MAXIMUM_TEMP}) Kelvin"),
        )
        .add_setting(
            "night_temp",
            &DEFAULT_NIGHT_TEMP.to_string(),
            &format!("Color temperature during night ({MINIMUM_TEMP}-{MAXIMUM_TEMP}) Kelvin"),
        )
        .add_setting(
            "transition_duration",
            &DEFAULT_TRANSITION_MINUTES.to_string(),
            &format!(
                "Sunrise/sunset window in minutes ({MINIMUM_TRANSITION_MINUTES}-{MAXIMUM_TRANSITION_MINUTES})"
            ),
        )
        .add_setting("curve", "\"sigmoid\"", "Transition curve: \"linear\" or \"sigmoid\"")
        .add_setting(
            "brightness",
            &format!("{DEFAULT_BRIGHTNESS:.1}"),
            &format!("Output brightness ({MINIMUM_BRIGHTNESS:.1}-{MAXIMUM_BRIGHTNESS:.1})"),
        )
        .add_setting(
            "contrast",
            &format!("{DEFAULT_CONTRAST:.1}"),
            &format!("Output contrast ({MINIMUM_CONTRAST:.1}-{MAXIMUM_CONTRAST:.1})"),
        )
        .add_section("location")
        .add_setting("latitude", &format!("{lat:.6}"), "Geographic latitude (-90 to 90)")
        .add_setting(
            "longitude",
            &format!("{lon:.6}"),
            "Geographic longitude (-180 to 180)",
        )
        .add_setting("city", &format!("\"{city}\""), "Label shown in logs")
        .add_section("engine")
        .add_setting(
            "cache_capacity",
            &DEFAULT_CACHE_CAPACITY.to_string(),
            "Gamma ramps kept in memory",
        )
        .add_setting(
            "cache_ttl",
            &DEFAULT_CACHE_TTL_SECS.to_string(),
            "Seconds before a cached ramp expires",
        )
        .add_setting(
            "pool_max",
            "0",
            &format!(
                "Device contexts ({MINIMUM_POOL_SIZE}-{MAXIMUM_POOL_SIZE} | 0 = two per monitor)"
            ),
        )
        .add_setting(
            "write_timeout",
            &DEFAULT_WRITE_TIMEOUT_MS.to_string(),
            "Milliseconds before a gamma write counts as failed",
        )
        .add_setting(
            "max_write_attempts",
            &DEFAULT_MAX_WRITE_ATTEMPTS.to_string(),
            "Attempts per write before entering safe mode",
        )
        .add_setting(
            "health_check_interval",
            &DEFAULT_HEALTH_CHECK_INTERVAL_SECS.to_string(),
            &format!(
                "Seconds between health checks ({MINIMUM_HEALTH_CHECK_INTERVAL_SECS}-{MAXIMUM_HEALTH_CHECK_INTERVAL_SECS})"
            ),
        )
        .add_setting(
            "startup_duration",
            &format!("{DEFAULT_STARTUP_DURATION_SECS:.1}"),
            &format!(
                "Seconds to ease into the current temperature (0-{MAXIMUM_STARTUP_DURATION_SECS:.0} | 0 = instant)"
            ),
        )
        .build();

    fs::write(path, config_content).context("Failed to write default config file")?;
    Ok(())
}

/// Builder for TOML with column-aligned trailing comments.
struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

struct ConfigEntry {
    content: String,
    entry_type: EntryType,
}

enum EntryType {
    Section,
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry {
            content: format!("[{title}]"),
            entry_type: EntryType::Section,
        });
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        let line = format!("{key} = {value}");
        self.entries.push(ConfigEntry {
            content: line.clone(),
            entry_type: EntryType::Setting {
                line,
                comment: format!("# {comment}"),
            },
        });
        self
    }

    fn build(self) -> String {
        // One shared comment column across all sections
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match &entry.entry_type {
                EntryType::Setting { line, .. } => Some(line.len()),
                EntryType::Section => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut result = Vec::new();
        let mut first_section = true;

        for entry in self.entries {
            match entry.entry_type {
                EntryType::Section => {
                    if !first_section {
                        result.push(String::new());
                    }
                    result.push(entry.content);
                    first_section = false;
                }
                EntryType::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.len());
                    result.push(format!("{line}{padding}{comment}"));
                }
            }
        }

        let mut output = result.join("\n");
        output.push('\n');
        output
    }
}
