use serde_json::{Map, Value};

/// Key/value record used for node configuration, resolved inputs and
/// object-shaped results.
pub type Payload = Map<String, Value>;

/// Typed lookups over a [`Payload`].
pub trait PayloadExt {
    fn get_str(&self, key: &str) -> Option<&str>;
    fn get_f64(&self, key: &str) -> Option<f64>;
    fn get_u64(&self, key: &str) -> Option<u64>;
    fn get_object(&self, key: &str) -> Option<&Payload>;

    /// First non-empty string among `keys`, in order.
    fn first_non_empty_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.get_str(k))
            .find(|s| !s.is_empty())
    }
}

impl PayloadExt for Payload {
    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            // Editor forms frequently store numbers as strings.
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn get_u64(&self, key: &str) -> Option<u64> {
        let n = self.get_f64(key)?;
        (n >= 0.0 && n.is_finite()).then_some(n as u64)
    }

    fn get_object(&self, key: &str) -> Option<&Payload> {
        self.get(key).and_then(Value::as_object)
    }
}

/// Builds a payload from `(key, value)` pairs.
pub fn payload<K, V, I>(pairs: I) -> Payload
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_strings_are_read_as_numbers() {
        let p = payload([("timeout", json!("250")), ("duration", json!(2))]);
        assert_eq!(p.get_u64("timeout"), Some(250));
        assert_eq!(p.get_f64("duration"), Some(2.0));
        assert_eq!(p.get_u64("missing"), None);
    }

    #[test]
    fn first_non_empty_skips_blank_values() {
        let p = payload([("text", json!("")), ("input", json!("hello"))]);
        assert_eq!(p.first_non_empty_str(&["text", "input"]), Some("hello"));
        assert_eq!(p.first_non_empty_str(&["prompt"]), None);
    }
}
