use serde_json::{Map, Value};

/// Collapse nested objects into one level, joining parent and child keys
/// with `delimiter`. Arrays and scalars are kept as values.
pub fn flatten_map(map: &Map<String, Value>, delimiter: &str) -> Map<String, Value> {
    let mut out = Map::new();
    flatten_into(&mut out, map, "", delimiter);
    out
}

fn flatten_into(out: &mut Map<String, Value>, map: &Map<String, Value>, parent: &str, delimiter: &str) {
    for (key, value) in map {
        let new_key = if parent.is_empty() {
            key.clone()
        } else {
            format!("{parent}{delimiter}{key}")
        };
        match value {
            Value::Object(inner) => flatten_into(out, inner, &new_key, delimiter),
            other => {
                out.insert(new_key, other.clone());
            }
        }
    }
}

/// Flatten arbitrarily nested arrays into a single array, depth first.
pub fn flatten_list(values: &[Value]) -> Vec<Value> {
    let mut flat = Vec::with_capacity(values.len());
    for item in values {
        match item {
            Value::Array(inner) => flat.extend(flatten_list(inner)),
            other => flat.push(other.clone()),
        }
    }
    flat
}
