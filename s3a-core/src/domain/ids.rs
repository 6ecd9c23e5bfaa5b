use serde::{Deserialize, Serialize};
use std::fmt;

/// Content hash of a configuration (BLAKE3 over its canonical JSON form).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHash(pub String);

impl ConfigHash {
    /// Hash a serializable value through its canonical JSON rendering.
    ///
    /// `serde_json::Value` objects keep keys sorted, so two configs that
    /// differ only in field declaration order hash identically.
    pub fn of<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let canonical = serde_json::to_value(value)?;
        Ok(Self(blake3::hash(canonical.to_string().as_bytes()).to_hex().to_string()))
    }

    /// First 12 hex chars, for log lines and directory names.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content hash of an input data file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataHash(pub String);

impl DataHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }
}

impl fmt::Display for DataHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn config_hash_is_deterministic() {
        let a = ConfigHash::of(&json!({"risk": 1.25, "lookback": 5})).unwrap();
        let b = ConfigHash::of(&json!({"lookback": 5, "risk": 1.25})).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.short().len(), 12);
    }

    #[test]
    fn config_hash_changes_with_values() {
        let a = ConfigHash::of(&json!({"lookback": 5})).unwrap();
        let b = ConfigHash::of(&json!({"lookback": 6})).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn data_hash_matches_blake3() {
        let h = DataHash::from_bytes(b"ts,open\n");
        assert_eq!(h.0, blake3::hash(b"ts,open\n").to_hex().to_string());
    }
}
