//! Fingerprinting: a stable hash of (phase name, canonicalized input,
//! config version) used both as the Cache key and to detect whether a
//! phase's inputs changed across restarts.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Recursively sorts object keys so that two semantically-identical JSON
/// values with differently-ordered keys hash the same.
fn canonicalize(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let entries: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", serde_json::to_string(k).unwrap(), canonicalize(&map[k])))
                .collect();
            format!("{{{}}}", entries.join(","))
        }
        Value::Array(items) => {
            let entries: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", entries.join(","))
        }
        other => other.to_string(),
    }
}

/// Compute the fingerprint for one phase input. `config_version` is an
/// opaque string (e.g. a prompt-template revision) so a deployed prompt
/// change invalidates the cache without touching stored data.
pub fn compute(phase_name: &str, input: &Value, config_version: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(phase_name.as_bytes());
    hasher.update(b"\0");
    hasher.update(canonicalize(input).as_bytes());
    hasher.update(b"\0");
    hasher.update(config_version.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fingerprint_stable_across_key_order() {
        let a = json!({"prompt": "x", "genre": "literary"});
        let b = json!({"genre": "literary", "prompt": "x"});
        assert_eq!(compute("concept", &a, "v1"), compute("concept", &b, "v1"));
    }

    #[test]
    fn test_fingerprint_changes_with_config_version() {
        let input = json!({"prompt": "x"});
        assert_ne!(compute("concept", &input, "v1"), compute("concept", &input, "v2"));
    }

    #[test]
    fn test_fingerprint_changes_with_phase_name() {
        let input = json!({"prompt": "x"});
        assert_ne!(compute("concept", &input, "v1"), compute("constitution", &input, "v1"));
    }

    #[test]
    fn test_fingerprint_changes_with_input() {
        let a = json!({"prompt": "x"});
        let b = json!({"prompt": "y"});
        assert_ne!(compute("concept", &a, "v1"), compute("concept", &b, "v1"));
    }
}
