// ============================================================================
// GEOMETRY FINGERPRINT — canonical key for SDF cache lookups
// ============================================================================

use std::fmt;

use serde_json::Value;

use super::shape::Shape;

/// Numeric fields are rounded to this step before hashing.
const PRECISION: f64 = 1e-4;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic description of a region's shape list.  Two regions with
/// equal fingerprints rasterize to the same SDF.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GeometryFingerprint {
    pub key: String,
    pub hash: u64,
}

impl GeometryFingerprint {
    pub fn of(shapes: &[Shape]) -> Self {
        let key = shapes.iter().map(shape_key).collect::<Vec<_>>().join("|");
        let hash = fnv1a(key.as_bytes());
        Self { key, hash }
    }
}

impl fmt::Display for GeometryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.hash)
    }
}

/// `type,hole` followed by every other field in sorted key order.
fn shape_key(shape: &Shape) -> String {
    let mut out = format!("{},{}", shape.kind.type_name(), u8::from(shape.hole));
    if let Ok(Value::Object(map)) = serde_json::to_value(&shape.kind) {
        let mut keys: Vec<&String> = map.keys().filter(|k| *k != "type" && *k != "hole").collect();
        keys.sort();
        for k in keys {
            out.push(',');
            out.push_str(k);
            out.push('=');
            canonical(&map[k], &mut out);
        }
    }
    out
}

fn canonical(v: &Value, out: &mut String) {
    match v {
        Value::Number(n) => {
            let x = n.as_f64().unwrap_or(0.0);
            let r = (x / PRECISION).round() * PRECISION;
            // -0 and 0 must hash alike.
            let r = if r == 0.0 { 0.0 } else { r };
            out.push_str(&format!("{:.4}", r));
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(k);
                out.push(':');
                canonical(&map[k], out);
            }
            out.push('}');
        }
        Value::Bool(b) => out.push_str(if *b { "1" } else { "0" }),
        Value::String(s) => out.push_str(s),
        Value::Null => out.push_str("null"),
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |h, b| (h ^ *b as u64).wrapping_mul(FNV_PRIME))
}
