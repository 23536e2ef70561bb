//! Precedence and snapshot tests for the configuration resolver.

use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tiered_config::core::ConfigurationSnapshot;
use tiered_config::error::{ConfigError, Result};
use tiered_config::prelude::*;

fn merge(sources: Vec<Arc<dyn PropertySource>>) -> ConfigurationSnapshot {
    ConfigurationResolver::new().merge(&sources)
}

fn values(snapshot: &ConfigurationSnapshot) -> BTreeMap<String, String> {
    snapshot
        .iter()
        .map(|(key, property)| (key.to_string(), property.value().to_string()))
        .collect()
}

#[test]
fn test_higher_ordinal_overrides_shared_keys() {
    let a = MapSource::from_entries("A", 1, [("x", "1"), ("y", "2")]);
    let b = MapSource::from_entries("B", 5, [("y", "20"), ("z", "30")]);

    let snapshot = merge(vec![Arc::new(a), Arc::new(b)]);

    let expected: BTreeMap<String, String> = [("x", "1"), ("y", "20"), ("z", "30")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert_eq!(values(&snapshot), expected);
    assert_eq!(snapshot.get("x").unwrap().origin(), "A");
    assert_eq!(snapshot.get("y").unwrap().origin(), "B");
}

#[test]
fn test_registration_order_does_not_beat_ordinal() {
    let high = MapSource::from_entries("high", 5, [("k", "high")]);
    let low = MapSource::from_entries("low", 1, [("k", "low")]);

    let snapshot = merge(vec![Arc::new(high), Arc::new(low)]);
    assert_eq!(snapshot.get("k").unwrap().value(), "high");
}

#[test]
fn test_equal_ordinal_later_registration_wins() {
    let a = MapSource::from_entries("A", 7, [("shared", "from-a"), ("only_a", "a")]);
    let b = MapSource::from_entries("B", 7, [("shared", "from-b")]);

    let snapshot = merge(vec![Arc::new(a), Arc::new(b)]);
    assert_eq!(snapshot.get("shared").unwrap().value(), "from-b");
    assert_eq!(snapshot.get("only_a").unwrap().value(), "a");
}

#[test]
fn test_ordinal_override_entry() {
    let declared_high = MapSource::from_entries("declared", 50, [("k", "declared")]);
    let promoted =
        MapSource::from_entries("promoted", 1, [("k", "promoted"), ("config.ordinal", "99")]);

    let snapshot = merge(vec![Arc::new(promoted), Arc::new(declared_high)]);
    assert_eq!(snapshot.get("k").unwrap().value(), "promoted");
}

struct BrokenSource;

impl PropertySource for BrokenSource {
    fn name(&self) -> String {
        "broken".to_string()
    }

    fn ordinal(&self) -> i32 {
        1000
    }

    fn entries(&self) -> Result<BTreeMap<String, String>> {
        Err(ConfigError::source_read("broken", "connection refused"))
    }
}

#[test]
fn test_failing_source_is_skipped() {
    let ok = MapSource::from_entries("ok", 0, [("k", "v")]);
    let snapshot = merge(vec![Arc::new(BrokenSource), Arc::new(ok)]);

    assert_eq!(snapshot.get("k").unwrap().value(), "v");
    assert_eq!(snapshot.failures().len(), 1);
    assert_eq!(snapshot.failures()[0].source, "broken");
}

#[test]
fn test_properties_are_a_defensive_copy() {
    let provider = ConfigurationProvider::builder()
        .with_source(MapSource::from_entries("m", 0, [("a", "1")]))
        .build();
    let config = provider.get_configuration();

    let mut properties = config.get_properties();
    properties.insert("a".to_string(), "mutated".to_string());
    properties.insert("b".to_string(), "added".to_string());

    assert_eq!(config.get("a").as_deref(), Some("1"));
    assert_eq!(config.get("b"), None);
    assert_eq!(provider.get_configuration().get_properties().len(), 1);
}

#[test]
fn test_empty_value_is_not_absent() {
    let provider = ConfigurationProvider::builder()
        .with_source(MapSource::from_entries("m", 0, [("empty", "")]))
        .build();
    let config = provider.get_configuration();

    assert_eq!(config.get("empty").as_deref(), Some(""));
    assert_eq!(config.get("missing"), None);
    assert_eq!(config.get_or_default("empty", "fallback"), "");
    assert_eq!(config.get_or_default("missing", "fallback"), "fallback");
}

fn source_strategy() -> impl Strategy<Value = (i32, BTreeMap<String, String>)> {
    (
        -5i32..5,
        prop::collection::btree_map("[a-e]", "[a-z0-9]{0,4}", 0..5),
    )
}

proptest! {
    #[test]
    fn prop_winner_has_highest_ordinal(sources in prop::collection::vec(source_strategy(), 1..6)) {
        let registered: Vec<Arc<dyn PropertySource>> = sources
            .iter()
            .enumerate()
            .map(|(index, (ordinal, entries))| {
                Arc::new(MapSource::from_entries(
                    format!("s{}", index),
                    *ordinal,
                    entries.clone(),
                )) as Arc<dyn PropertySource>
            })
            .collect();

        let snapshot = merge(registered.clone());

        for (key, property) in snapshot.iter() {
            // Expected winner: max ordinal, ties go to the last registered
            let (winner, _) = sources
                .iter()
                .enumerate()
                .filter(|(_, (_, entries))| entries.contains_key(key))
                .max_by_key(|(index, (ordinal, _))| (*ordinal, *index))
                .unwrap();
            prop_assert_eq!(property.origin(), format!("s{}", winner));
            prop_assert_eq!(property.value(), sources[winner].1[key].as_str());
        }

        let all_keys: std::collections::BTreeSet<&String> =
            sources.iter().flat_map(|(_, entries)| entries.keys()).collect();
        prop_assert_eq!(snapshot.len(), all_keys.len());

        // Deterministic for identical inputs
        prop_assert_eq!(merge(registered), snapshot);
    }
}
