//! Provider tests exercising files, environment, refresh and change events together.

use parking_lot::Mutex;
use serde::Deserialize;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use tiered_config::prelude::*;

#[derive(Debug, Clone, Deserialize, PartialEq)]
struct IntegrationConfig {
    server: ServerConfig,
    database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
struct ServerConfig {
    port: u16,
    host: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
struct DatabaseConfig {
    url: String,
    max_connections: u32,
}

fn write_defaults(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("default.yaml");
    fs::write(
        &path,
        r#"
server:
  port: 8080
  host: "localhost"

database:
  url: "postgresql://localhost/mydb"
  max_connections: 10
  timeout: 5s
"#,
    )
    .unwrap();
    path
}

#[test]
fn test_files_layer_in_order() {
    let dir = TempDir::new().unwrap();
    let defaults = write_defaults(&dir);
    let production = dir.path().join("production.toml");
    fs::write(
        &production,
        r#"
[server]
port = 9090

[database]
max_connections = 50
"#,
    )
    .unwrap();

    let provider = ConfigurationProvider::builder()
        .with_file(&defaults)
        .with_file(&production)
        .build();
    let config = provider.get_configuration();

    assert_eq!(config.get_as::<u16>("server.port").unwrap(), Some(9090));
    assert_eq!(config.get("server.host").as_deref(), Some("localhost"));
    assert_eq!(config.get_as::<u32>("database.max_connections").unwrap(), Some(50));
    assert!(config.origin("server.port").unwrap().ends_with("production.toml"));
    assert!(config.origin("server.host").unwrap().ends_with("default.yaml"));

    let timeout: Option<Duration> = config.convert("database.timeout").unwrap();
    assert_eq!(timeout, Some(Duration::from_secs(5)));

    let bound: IntegrationConfig = config.bind().unwrap();
    assert_eq!(
        bound,
        IntegrationConfig {
            server: ServerConfig {
                port: 9090,
                host: "localhost".to_string(),
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/mydb".to_string(),
                max_connections: 50,
            },
        }
    );
}

#[test]
#[allow(unsafe_code)]
fn test_env_overrides_files() {
    let dir = TempDir::new().unwrap();
    let defaults = write_defaults(&dir);

    // SAFETY: the variable name is unique to this test
    unsafe {
        std::env::set_var("TIEREDINT_SERVER__PORT", "7000");
    }

    let provider = ConfigurationProvider::builder()
        .with_file(&defaults)
        .with_env_overrides("TIEREDINT", "__")
        .build();
    let config = provider.get_configuration();

    assert_eq!(config.get_as::<u16>("server.port").unwrap(), Some(7000));
    assert_eq!(config.origin("server.port"), Some("env:TIEREDINT*"));
    assert_eq!(config.get("server.host").as_deref(), Some("localhost"));

    unsafe {
        std::env::remove_var("TIEREDINT_SERVER__PORT");
    }
}

#[test]
fn test_section_and_conversion_errors() {
    let dir = TempDir::new().unwrap();
    let defaults = write_defaults(&dir);
    let provider = ConfigurationProvider::builder().with_file(&defaults).build();
    let config = provider.get_configuration();

    let database = config.section("database");
    assert_eq!(database.get("url").map(String::as_str), Some("postgresql://localhost/mydb"));
    assert_eq!(database.len(), 3);

    let err = config.get_as::<u16>("server.host").unwrap_err();
    assert!(matches!(err, ConfigError::Conversion { .. }));
    assert_eq!(config.get_as_or::<u16>("server.missing", 1).unwrap(), 1);

    let err = config.convert::<Vec<u8>>("server.host").unwrap_err();
    assert!(matches!(err, ConfigError::ConverterMissing { .. }));
}

#[test]
fn test_refresh_picks_up_file_edits_and_notifies() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.json");
    fs::write(&path, r#"{ "feature": { "enabled": false, "legacy": "on" } }"#).unwrap();

    let bus = EventBus::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = Arc::clone(&events);
    let _watch = bus.subscribe(move |event: &ConfigurationChanged| {
        events_clone.lock().push(event.clone());
        Ok(())
    });

    let provider = ConfigurationProvider::builder()
        .with_file(&path)
        .with_event_bus(bus)
        .build();

    let before = provider.get_configuration();
    assert_eq!(before.get_as::<bool>("feature.enabled").unwrap(), Some(false));

    fs::write(&path, r#"{ "feature": { "enabled": true, "limit": 3 } }"#).unwrap();
    let changes = provider.refresh();

    assert_eq!(
        changes,
        vec![
            PropertyChange::Updated {
                key: "feature.enabled".to_string(),
                previous: "false".to_string(),
                value: "true".to_string(),
            },
            PropertyChange::Removed {
                key: "feature.legacy".to_string(),
                previous: "on".to_string(),
            },
            PropertyChange::Added {
                key: "feature.limit".to_string(),
                value: "3".to_string(),
            },
        ]
    );

    // Earlier views are unaffected
    assert_eq!(before.get("feature.legacy").as_deref(), Some("on"));

    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].version, 2);
    assert!(events[0].touches("feature.limit"));
    assert_eq!(events[0].configuration.get("feature.limit").as_deref(), Some("3"));
}

#[test]
fn test_broken_file_keeps_other_sources() {
    let dir = TempDir::new().unwrap();
    let defaults = write_defaults(&dir);
    let broken = dir.path().join("broken.yaml");
    fs::write(&broken, "server: [unclosed").unwrap();

    let provider = ConfigurationProvider::builder()
        .with_file(&defaults)
        .with_file(&broken)
        .build();
    let config = provider.get_configuration();

    assert_eq!(config.get("server.port").as_deref(), Some("8080"));
    let failures = config.snapshot().failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].source.ends_with("broken.yaml"));
}

#[test]
fn test_readers_never_see_partial_refresh() {
    let source = Arc::new(MapSource::from_entries("m", 0, [("a", "0"), ("b", "0")]));
    let provider = Arc::new(
        ConfigurationProvider::builder()
            .with_shared_source(Arc::clone(&source))
            .build(),
    );
    provider.get_configuration();

    let done = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(5));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let provider = Arc::clone(&provider);
            let done = Arc::clone(&done);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                while !done.load(Ordering::SeqCst) {
                    let config = provider.get_configuration();
                    // Both keys are always written together
                    assert_eq!(config.get("a"), config.get("b"));
                }
            })
        })
        .collect();

    barrier.wait();
    for generation in 1..=100 {
        let value = generation.to_string();
        source.set("a", value.clone());
        source.set("b", value);
        provider.refresh();
    }
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(provider.get_configuration().get("a").as_deref(), Some("100"));
}
