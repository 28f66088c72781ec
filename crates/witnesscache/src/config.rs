//! Cache configuration

use serde::{Deserialize, Deserializer};

/// Default number of hot-tier entries
pub const DEFAULT_CAPACITY: usize = 1000;

/// Configuration for [`PrecomputeCache`](crate::PrecomputeCache)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries in the hot tier, never zero
    #[serde(deserialize_with = "nonzero_capacity")]
    pub capacity: usize,
}

fn nonzero_capacity<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let capacity = usize::deserialize(deserializer)?;
    if capacity == 0 {
        return Err(serde::de::Error::custom("capacity must be greater than 0"));
    }
    Ok(capacity)
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Parse a JSON document, e.g. `{"capacity": 500}`
    pub fn from_json(input: &str) -> serde_json::Result<Self> {
        serde_json::from_str(input)
    }
}
