//! Flattening of nested `config` values into dotted string keys.

use config::{Map, Value, ValueKind};
use std::collections::BTreeMap;

/// Flatten a nested table into `a.b.c` keys; array items become `a.b[0]`.
///
/// `nil` leaves are dropped so that "not configured" stays distinct from
/// "configured to empty".
pub(crate) fn flatten_table(table: Map<String, Value>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (key, value) in table {
        flatten_value(key, value, &mut out);
    }
    out
}

fn flatten_value(path: String, value: Value, out: &mut BTreeMap<String, String>) {
    match value.kind {
        ValueKind::Nil => {}
        ValueKind::Table(table) => {
            for (key, child) in table {
                flatten_value(format!("{}.{}", path, key), child, out);
            }
        }
        ValueKind::Array(items) => {
            for (index, item) in items.into_iter().enumerate() {
                flatten_value(format!("{}[{}]", path, index), item, out);
            }
        }
        leaf => {
            out.insert(path, leaf.to_string());
        }
    }
}
