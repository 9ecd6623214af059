//! # Canonical Form
//!
//! The byte string a signature covers: the spec as compact JSON with object
//! keys sorted lexicographically at every depth and the top-level
//! `signature`/`public_key` fields removed.

use serde_json::Value;
use shared_types::JobSpec;

const EXCLUDED_FIELDS: [&str; 2] = ["signature", "public_key"];

/// Canonical bytes of `spec`. Identical for a spec and its signed copy.
pub fn canonical_bytes(spec: &JobSpec) -> Result<Vec<u8>, serde_json::Error> {
    let mut value = serde_json::to_value(spec)?;
    if let Value::Object(map) = &mut value {
        for field in EXCLUDED_FIELDS {
            map.remove(field);
        }
    }

    let mut out = String::with_capacity(256);
    write_sorted(&value, &mut out)?;
    Ok(out.into_bytes())
}

fn write_sorted(value: &Value, out: &mut String) -> Result<(), serde_json::Error> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_sorted(item, out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_sorted(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{BenchmarkSpec, ContainerSpec, ExecutionConstraints};

    fn spec() -> JobSpec {
        JobSpec::new(
            "job-1",
            BenchmarkSpec {
                name: "b".into(),
                container: ContainerSpec {
                    image: "img".into(),
                    tag: None,
                },
                resources: Default::default(),
            },
            ExecutionConstraints::for_regions(["US", "EU"]),
        )
    }

    #[test]
    fn test_signature_fields_excluded() {
        let unsigned = spec();
        let mut signed = spec();
        signed.signature = "c2ln".into();
        signed.public_key = "a2V5".into();

        assert_eq!(
            canonical_bytes(&unsigned).unwrap(),
            canonical_bytes(&signed).unwrap()
        );
        let text = String::from_utf8(canonical_bytes(&signed).unwrap()).unwrap();
        assert!(!text.contains("signature"));
        assert!(!text.contains("public_key"));
    }

    #[test]
    fn test_keys_sorted_at_every_level() {
        let mut s = spec();
        s.metadata.extra.insert("zeta".into(), serde_json::json!({"b": 1, "a": 2}));
        let text = String::from_utf8(canonical_bytes(&s).unwrap()).unwrap();

        assert!(text.starts_with(r#"{"benchmark":"#));
        assert!(text.contains(r#"{"a":2,"b":1}"#));
        let c = text.find(r#""constraints""#).unwrap();
        let m = text.find(r#""metadata""#).unwrap();
        assert!(c < m);
    }

    #[test]
    fn test_region_order_is_stable() {
        let a = spec();
        let mut b = spec();
        b.constraints = ExecutionConstraints::for_regions(["EU", "US"]);
        assert_eq!(canonical_bytes(&a).unwrap(), canonical_bytes(&b).unwrap());
    }
}
