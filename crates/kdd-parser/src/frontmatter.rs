//! YAML front-matter extraction.

use serde_json::Value;
use std::collections::BTreeMap;

/// Split `content` into its front-matter mapping and the remaining body.
///
/// The front-matter block must start at byte 0 (after an optional BOM) with
/// a `---` line and end with the next `---` line. Returns an empty mapping
/// when the block is absent or not a YAML mapping.
#[must_use]
pub fn extract_front_matter(content: &str) -> (BTreeMap<String, Value>, String) {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let Some(rest) = content.strip_prefix("---") else {
        return (BTreeMap::new(), content.to_string());
    };
    let rest = rest.strip_prefix('\r').unwrap_or(rest);
    let Some(rest) = rest.strip_prefix('\n') else {
        return (BTreeMap::new(), content.to_string());
    };

    let Some(end) = find_closing_delimiter(rest) else {
        return (BTreeMap::new(), content.to_string());
    };

    let (yaml, body) = rest.split_at(end.block_end);
    let body = &body[end.delimiter_len..];

    match serde_yaml::from_str::<serde_yaml::Value>(yaml) {
        Ok(value) => match yaml_to_json(value) {
            Value::Object(map) => {
                let map = map.into_iter().collect();
                (map, body.to_string())
            }
            _ => (BTreeMap::new(), content.to_string()),
        },
        Err(err) => {
            log::debug!("invalid front-matter: {err}");
            (BTreeMap::new(), content.to_string())
        }
    }
}

struct Closing {
    block_end: usize,
    delimiter_len: usize,
}

fn find_closing_delimiter(rest: &str) -> Option<Closing> {
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some(Closing {
                block_end: offset,
                delimiter_len: line.len(),
            });
        }
        offset += line.len();
    }
    None
}

fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number)
            } else {
                Value::Null
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(seq) => {
            Value::Array(seq.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(map) => Value::Object(
            map.into_iter()
                .filter_map(|(k, v)| {
                    let key = match k {
                        serde_yaml::Value::String(s) => s,
                        other => serde_yaml::to_string(&other).ok()?.trim().to_string(),
                    };
                    Some((key, yaml_to_json(v)))
                })
                .collect(),
        ),
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_mapping_and_body() {
        let content = "---\nkind: entity\nid: Pedido\naliases: [Orden, Order]\n---\n\n# Pedido\n";
        let (fm, body) = extract_front_matter(content);
        assert_eq!(fm.get("kind").unwrap().as_str(), Some("entity"));
        assert_eq!(fm.get("id").unwrap().as_str(), Some("Pedido"));
        assert_eq!(
            fm.get("aliases").unwrap().as_array().unwrap().len(),
            2
        );
        assert!(body.starts_with("\n# Pedido"));
    }

    #[test]
    fn strips_bom_before_detection() {
        let content = "\u{feff}---\nkind: event\n---\nbody";
        let (fm, _) = extract_front_matter(content);
        assert_eq!(fm.get("kind").unwrap().as_str(), Some("event"));
    }

    #[test]
    fn missing_block_yields_empty_mapping() {
        let (fm, body) = extract_front_matter("# Just a heading\n");
        assert!(fm.is_empty());
        assert_eq!(body, "# Just a heading\n");
    }

    #[test]
    fn unterminated_block_yields_empty_mapping() {
        let (fm, _) = extract_front_matter("---\nkind: entity\nno closing");
        assert!(fm.is_empty());
    }

    #[test]
    fn delimiter_must_be_at_byte_zero() {
        let (fm, _) = extract_front_matter("\n---\nkind: entity\n---\n");
        assert!(fm.is_empty());
    }

    #[test]
    fn invalid_yaml_yields_empty_mapping() {
        let (fm, _) = extract_front_matter("---\n: : :\n---\nbody");
        assert!(fm.is_empty());
    }
}
