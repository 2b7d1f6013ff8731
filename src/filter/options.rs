// ============================================================================
// FILTER OPTIONS — the option bag attached to each region effect
// ============================================================================

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One effect attached to a region.  Only the options the mask engine
/// reads are typed; everything else rides along in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterInstance {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub options: FilterOptions,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    /// 0–100, or a 0–1 fraction.
    #[serde(default)]
    pub fade_percent: f32,
    #[serde(default, deserialize_with = "de_flag")]
    pub below_tokens: bool,
    #[serde(default = "default_strength")]
    pub strength: f32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_strength() -> f32 {
    1.0
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            fade_percent: 0.0,
            below_tokens: false,
            strength: 1.0,
            extra: Map::new(),
        }
    }
}

impl FilterOptions {
    /// Fade as a fraction in 0..=1.  Values above 1 are percentages.
    pub fn fade_fraction(&self) -> f32 {
        let raw = if self.fade_percent.is_finite() { self.fade_percent.max(0.0) } else { 0.0 };
        if raw > 1.0 { (raw / 100.0).min(1.0) } else { raw.min(1.0) }
    }
}

/// Accepts `true` or `{ "value": true }`.
fn de_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Plain(bool),
        Wrapped { value: bool },
    }
    Ok(match Flag::deserialize(d)? {
        Flag::Plain(b) | Flag::Wrapped { value: b } => b,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_percent_normalizes() {
        let f = |p: f32| FilterOptions { fade_percent: p, ..Default::default() }.fade_fraction();
        assert_eq!(f(50.0), 0.5);
        assert_eq!(f(0.25), 0.25);
        assert_eq!(f(1.0), 1.0);
        assert_eq!(f(250.0), 1.0);
        assert_eq!(f(-5.0), 0.0);
        assert_eq!(f(f32::NAN), 0.0);
    }

    #[test]
    fn below_tokens_accepts_wrapped_values() {
        let a: FilterOptions = serde_json::from_str(r#"{"belowTokens":{"value":true},"tint":"red"}"#).unwrap();
        assert!(a.below_tokens);
        assert_eq!(a.extra.get("tint"), Some(&Value::String("red".into())));
        assert_eq!(a.strength, 1.0);
        let b: FilterOptions = serde_json::from_str(r#"{"belowTokens":false,"fadePercent":20}"#).unwrap();
        assert!(!b.below_tokens);
        assert_eq!(b.fade_fraction(), 0.2);
    }
}
