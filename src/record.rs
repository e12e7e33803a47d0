//! Safe navigation over loosely typed upstream records.
//!
//! Upstream batches carry no fixed schema, so every lookup goes through [`Field`],
//! which remembers only whether the current position exists. Walking past a missing
//! level, or into something that is not an object, yields an absent field instead of
//! failing.
use serde_json::Value;

/// Rendered into keys for a position that does not exist at all.
pub const ABSENT_KEY_PART: &str = "undefined";

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

#[derive(Debug, Clone, Copy)]
pub struct Field<'a>(Option<&'a Value>);

impl<'a> Field<'a> {
    pub fn of(value: &'a Value) -> Self {
        Field(Some(value))
    }

    pub fn absent() -> Self {
        Field(None)
    }

    pub fn get(self, key: &str) -> Self {
        Field(self.0.and_then(|v| v.get(key)))
    }

    pub fn path(self, keys: &[&str]) -> Self {
        keys.iter().fold(self, |field, key| field.get(key))
    }

    /// Present and not JSON `null`.
    pub fn is_present(self) -> bool {
        matches!(self.0, Some(v) if !v.is_null())
    }

    pub fn is_object(self) -> bool {
        matches!(self.0, Some(Value::Object(_)))
    }

    pub fn value(self) -> Option<&'a Value> {
        self.0.filter(|v| !v.is_null())
    }

    /// Owned copy of a present value; absence and `null` both give `None`.
    pub fn cloned(self) -> Option<Value> {
        self.value().cloned()
    }

    pub fn as_str(self) -> Option<&'a str> {
        self.0.and_then(Value::as_str)
    }

    pub fn as_f64(self) -> Option<f64> {
        self.0.and_then(Value::as_f64)
    }

    pub fn as_array(self) -> &'a [Value] {
        self.0
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Text used when the field is interpolated into a dedup key. Whole-valued floats
    /// render like integers, so `1.0` and `1` name the same episode.
    pub fn key_part(self) -> String {
        match self.0 {
            None => ABSENT_KEY_PART.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => match n.as_f64() {
                Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER => {
                    (f as i64).to_string()
                }
                _ => n.to_string(),
            },
            Some(other) => other.to_string(),
        }
    }
}

impl<'a> From<&'a Value> for Field<'a> {
    fn from(value: &'a Value) -> Self {
        Field::of(value)
    }
}
