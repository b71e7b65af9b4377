//! Integration tests for versioned collections and their encoding

use vcow_immutable::{Registry, Timestamp, Value, VersionedMap};

// ============================================================================
// Helpers
// ============================================================================

/// Build one map version per timestamp, each adding or replacing a key.
fn versions(steps: Timestamp) -> Vec<VersionedMap> {
    let mut map = VersionedMap::new();
    let mut out = vec![map.clone()];
    for t in 1..=steps {
        let key = format!("k{}", t % 7);
        map = if t % 3 == 0 {
            map.set(&key, Value::Long(t), t).unwrap()
        } else {
            map.add(&key, Value::Long(t), t).unwrap()
        };
        out.push(map.clone());
    }
    out
}

fn dump(map: &VersionedMap, time: Timestamp) -> Vec<(String, Vec<Value>)> {
    map.iter(time)
        .map(|(key, view)| (key.to_owned(), view.to_vec()))
        .collect()
}

// ============================================================================
// Structural Sharing
// ============================================================================

#[test]
fn test_old_roots_are_unchanged_by_later_versions() {
    let versions = versions(40);
    let before: Vec<_> = versions.iter().map(|m| dump(m, Timestamp::MAX - 1)).collect();

    // Deriving more versions from every root must not disturb any of them.
    for map in &versions {
        let _ = map.clear_map(100);
        let _ = map.add("extra", Value::Int(0), 100).unwrap();
    }

    let after: Vec<_> = versions.iter().map(|m| dump(m, Timestamp::MAX - 1)).collect();
    assert_eq!(before, after);
}

#[test]
fn test_latest_root_answers_for_every_past_time() {
    let versions = versions(40);
    let latest = versions.last().unwrap();

    // Version `t` was built at time `t`, so querying the latest root at `t`
    // must match what version `t` saw at that time.
    for (t, version) in versions.iter().enumerate() {
        let t = t as Timestamp;
        assert_eq!(dump(latest, t), dump(version, t), "time {t}");
        assert_eq!(latest.snapshot_at(t), version.snapshot_at(t), "time {t}");
    }
}

// ============================================================================
// Encoding
// ============================================================================

#[test]
fn test_history_survives_round_trip() {
    let registry = Registry::standard();
    let latest = versions(60).pop().unwrap();

    let bytes = registry.to_bytes(&Value::Map(latest.clone())).unwrap();
    assert_eq!(bytes.len(), registry.durable_length(&Value::Map(latest.clone())).unwrap());

    let decoded = registry.from_bytes(&bytes).unwrap();
    let decoded = decoded.as_map().unwrap();
    for t in 0..=60 {
        assert_eq!(dump(decoded, t), dump(&latest, t));
    }
}

#[test]
fn test_nested_collections_round_trip() {
    let registry = Registry::standard();
    let inner = VersionedMap::new()
        .add("leaf", Value::from(vec![1u8, 2, 3]), 1)
        .unwrap();
    let outer = VersionedMap::new()
        .add("child", Value::Map(inner.clone()), 2)
        .unwrap();

    let bytes = registry.to_bytes(&Value::Map(outer.clone())).unwrap();
    let decoded = registry.from_bytes(&bytes).unwrap();

    let child = decoded.as_map().unwrap().value_at("child", 0, 2).unwrap();
    assert_eq!(child.as_map(), Some(&inner));
    assert_eq!(decoded, Value::Map(outer));
}
