/*
 * deep.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Deep merge of structured maps.
 */

//! Deep merge of structured maps.
//!
//! Merge semantics, with later layers taking precedence:
//! - both sides objects: merge recursively by key
//! - anything else (arrays, scalars, null, mismatched kinds): the later value
//!   replaces the earlier one wholesale
//!
//! Inputs are borrowed and never modified; the result is a fresh tree.

use serde_json::{Map, Value};

/// Merge `overlay` onto `base`; keys in `overlay` win.
pub fn merge_pair(base: &Map<String, Value>, overlay: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, overlay_value) in overlay {
        let value = match (merged.get(key), overlay_value) {
            (Some(Value::Object(base_map)), Value::Object(overlay_map)) => {
                Value::Object(merge_pair(base_map, overlay_map))
            }
            _ => overlay_value.clone(),
        };
        merged.insert(key.clone(), value);
    }
    merged
}

/// Merge layers in order: the first is the base, the last has the highest
/// precedence. An empty slice yields an empty map.
pub fn merge_objects(layers: &[Map<String, Value>]) -> Map<String, Value> {
    layers.iter().fold(Map::new(), |acc, layer| merge_pair(&acc, layer))
}
