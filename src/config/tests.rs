use super::validation::{ProfileIssue, auto_correct, check_profile, validate_config};
use super::watcher::{affects_config, reload_commands};
use super::*;
use crate::core::SchedulerCommand;
use serial_test::serial;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn parse(toml_text: &str) -> Config {
    toml::from_str(toml_text).unwrap()
}

#[test]
#[serial]
fn test_config_load_default_creation() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("duskshift").join("duskshift.toml");

    // Save and restore XDG_CONFIG_HOME
    let original = std::env::var("XDG_CONFIG_HOME").ok();
    unsafe {
        std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());
    }

    let result = load();

    unsafe {
        match original {
            Some(val) => std::env::set_var("XDG_CONFIG_HOME", val),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }

    let config = result.unwrap();
    assert!(config_path.exists());
    assert_eq!(config.to_profile(), ColorProfile::default_profile());
}

#[test]
fn test_default_template_round_trips() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("duskshift.toml");
    create_default_config(&path, Some((40.71, -74.01, "New York".into()))).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("[profile]"));
    assert!(content.contains("city = \"New York\""));

    let config = load_from_path(&path).unwrap();
    let location = config.to_location().unwrap();
    assert!((location.latitude() - 40.71).abs() < 1e-9);
    assert_eq!(location.city(), Some("New York"));
    assert_eq!(config.to_engine_settings(), crate::core::EngineSettings::default());
}

#[test]
fn test_missing_file_is_an_error() {
    let temp_dir = tempdir().unwrap();
    let err = load_from_path(&temp_dir.path().join("nope.toml")).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_parse_error_names_file() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("duskshift.toml");
    fs::write(&path, "[profile\nday_temp = ").unwrap();
    let err = load_from_path(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config"));
}

#[test]
fn test_missing_location_gets_placeholder() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("duskshift.toml");
    fs::write(&path, "[profile]\nname = \"reading\"\n").unwrap();
    let config = load_from_path(&path).unwrap();
    assert_eq!(config.location.latitude, Some(crate::common::constants::DEFAULT_LATITUDE));
    assert_eq!(config.to_profile(), ColorProfile::reading());
}

#[test]
fn test_builtin_with_override_becomes_editable_copy() {
    let config = parse(
        r#"
        [profile]
        name = "reading"
        night_temp = 2500
        curve = "sigmoid"
        "#,
    );
    let profile = config.to_profile();
    assert_eq!(profile.name, "reading");
    assert!(!profile.built_in);
    assert_eq!(profile.night_kelvin, 2500);
    assert_eq!(profile.day_kelvin, 5500);
    assert_eq!(profile.curve, crate::profile::TransitionCurve::Sigmoid);
}

#[test]
fn test_custom_profile_starts_from_default() {
    let config = parse(
        r#"
        [profile]
        name = "evening"
        transition_duration = 20
        brightness = 0.8
        "#,
    );
    let profile = config.to_profile();
    assert_eq!(profile.name, "evening");
    assert!(!profile.built_in);
    assert_eq!(profile.day_kelvin, 6500);
    assert_eq!(profile.transition, std::time::Duration::from_secs(20 * 60));
    assert_eq!(profile.brightness, 0.8);
}

#[test]
fn test_engine_section_overrides() {
    let config = parse(
        r#"
        [engine]
        cache_capacity = 50
        pool_max = 4
        max_write_attempts = 5
        retry_delay = 10
        startup_duration = 0.0
        "#,
    );
    let settings = config.to_engine_settings();
    assert_eq!(settings.cache_capacity, 50);
    assert_eq!(settings.pool_max, Some(4));
    assert_eq!(settings.pool_size(1), 4);
    assert_eq!(settings.retry.max_attempts, 5);
    assert_eq!(settings.retry.base_delay, std::time::Duration::from_millis(10));
    assert!(settings.startup_duration.is_zero());

    let auto = parse("[engine]\npool_max = 0\n").to_engine_settings();
    assert_eq!(auto.pool_max, None);
    assert_eq!(auto.pool_size(3), 6);
}

#[test]
fn test_config_validation_ranges() {
    let cases = [
        ("[profile]\nday_temp = 900\n", "day_temp"),
        ("[profile]\nnight_temp = 12000\n", "night_temp"),
        ("[profile]\ntransition_duration = 0\n", "transition_duration"),
        ("[profile]\nbrightness = 1.5\n", "brightness"),
        ("[profile]\ncontrast = -0.1\n", "contrast"),
        ("[profile]\nname = \"  \"\n", "name"),
        ("[location]\nlatitude = 91.0\n", "latitude"),
        ("[location]\nlongitude = -181.0\n", "longitude"),
        ("[engine]\npool_max = 11\n", "pool_max"),
        ("[engine]\ncache_capacity = 0\n", "cache_capacity"),
        ("[engine]\nhealth_check_interval = 1\n", "health_check_interval"),
        ("[engine]\nmax_write_attempts = 0\n", "max_write_attempts"),
        ("[engine]\nstartup_duration = 61.0\n", "startup_duration"),
    ];
    for (text, field) in cases {
        let err = validate_config(&parse(text)).unwrap_err();
        assert!(err.to_string().contains(field), "{text}: {err}");
    }

    assert!(validate_config(&Config::default()).is_ok());
    // Swapped temperatures are repaired later, not rejected
    assert!(validate_config(&parse("[profile]\nday_temp = 3000\nnight_temp = 6000\n")).is_ok());
}

#[test]
fn test_check_profile_finds_every_issue() {
    assert!(check_profile(&ColorProfile::default_profile()).is_empty());
    assert!(check_profile(&ColorProfile::reading()).is_empty());

    let mut broken = ColorProfile::default_profile().save_as("broken");
    broken.day_kelvin = 3000;
    broken.night_kelvin = 12_000;
    broken.transition = std::time::Duration::ZERO;
    broken.brightness = f32::NAN;
    broken.contrast = 3.0;
    let issues = check_profile(&broken);
    assert!(issues.contains(&ProfileIssue::KelvinOutOfRange {
        field: "night temperature",
        kelvin: 12_000
    }));
    assert!(issues.contains(&ProfileIssue::DayNotAboveNight {
        day: 3000,
        night: 12_000
    }));
    assert!(issues.contains(&ProfileIssue::ZeroTransition));
    assert!(issues.contains(&ProfileIssue::ContrastOutOfRange(3.0)));
    assert!(
        issues
            .iter()
            .any(|i| matches!(i, ProfileIssue::BrightnessOutOfRange(_)))
    );
}

#[test]
fn test_auto_correct_yields_sound_profile() {
    let mut broken = ColorProfile::default_profile().save_as("broken");
    broken.day_kelvin = 3000;
    broken.night_kelvin = 12_000;
    broken.transition = std::time::Duration::from_secs(24 * 3600);
    broken.brightness = -1.0;

    let (fixed, issues) = auto_correct(&broken);
    assert!(!issues.is_empty());
    assert!(check_profile(&fixed).is_empty());
    assert_eq!(fixed.day_kelvin, 10_000);
    assert_eq!(fixed.night_kelvin, 3000);
    assert_eq!(fixed.brightness, 0.0);
    assert!(fixed.validate().is_ok());

    let mut equal = ColorProfile::default_profile().save_as("flat");
    equal.night_kelvin = equal.day_kelvin;
    let (fixed, _) = auto_correct(&equal);
    assert!(fixed.day_kelvin > fixed.night_kelvin);
}

#[test]
fn test_watcher_matches_config_and_editor_files() {
    let config_path = PathBuf::from("/home/user/.config/duskshift/duskshift.toml");
    let dir = config_path.parent().unwrap();

    assert!(affects_config(&[config_path.clone()], &config_path));
    assert!(affects_config(&[dir.join("duskshift.toml~")], &config_path));
    assert!(!affects_config(&[dir.join("other.toml")], &config_path));
    assert!(!affects_config(
        &[PathBuf::from("/tmp/duskshift.toml")],
        &config_path
    ));
}

#[test]
fn test_reload_sends_only_changes() {
    let before = parse("[profile]\nday_temp = 6500\n[location]\nlatitude = 10.0\nlongitude = 10.0\n");

    let same = reload_commands(&before, &before.clone());
    assert!(same.is_empty());

    let warmer = parse("[profile]\nday_temp = 6000\n[location]\nlatitude = 10.0\nlongitude = 10.0\n");
    let commands = reload_commands(&before, &warmer);
    assert_eq!(commands.len(), 1);
    assert!(matches!(
        &commands[0],
        SchedulerCommand::UpdateProfile(p) if p.day_kelvin == 6000
    ));

    let moved = parse("[profile]\nday_temp = 6500\n[location]\nlatitude = 20.0\nlongitude = 10.0\n");
    let commands = reload_commands(&before, &moved);
    assert!(matches!(
        commands.as_slice(),
        [SchedulerCommand::UpdateLocation(l)] if l.latitude() == 20.0
    ));
}
