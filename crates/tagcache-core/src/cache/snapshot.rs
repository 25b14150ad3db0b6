use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A fetched value together with the moment it was captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub captured_at: DateTime<Utc>,
}

/// Last successfully fetched JSON document for a tag.
pub type Snapshot = CachedData<Value>;

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            captured_at: Utc::now(),
        }
    }

    /// Time since capture. Clock skew never yields a negative age.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.captured_at).max(Duration::zero())
    }

    /// True when `self` was captured strictly after `other`.
    pub fn is_newer_than<U>(&self, other: &CachedData<U>) -> bool {
        self.captured_at > other.captured_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn aged(minutes: i64) -> Snapshot {
        let mut cached = Snapshot::new(json!({}));
        cached.captured_at = Utc::now() - Duration::minutes(minutes);
        cached
    }

    #[test]
    fn test_age_clamps_future_timestamps() {
        let mut cached = Snapshot::new(json!(null));
        cached.captured_at = Utc::now() + Duration::minutes(10);
        assert_eq!(cached.age(), Duration::zero());
        assert!(aged(5).age() >= Duration::minutes(5));
    }

    #[test]
    fn test_serialized_shape() {
        let cached = Snapshot::new(json!({"tag": "2PP"}));
        let value = serde_json::to_value(&cached).unwrap();
        assert_eq!(value["data"]["tag"], "2PP");
        let captured_at = value["captured_at"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(captured_at).is_ok());
    }

    #[test]
    fn test_is_newer_than() {
        let older = aged(10);
        let newer = Snapshot::new(json!(2));
        assert!(newer.is_newer_than(&older));
        assert!(!older.is_newer_than(&newer));
        assert!(!newer.is_newer_than(&newer));
    }
}
