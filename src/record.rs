//! The cached value envelope and its tag metadata.

use serde::{Deserialize, Serialize};

use crate::utils::now_ms;

/// A `(name, version)` pair participating in grouped invalidation.
///
/// Versions are wall-clock milliseconds and only ever move forward;
/// advancing the version of a name invalidates every record that recorded
/// an older version of it. A tag that was never touched reads as version 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name, as supplied by the caller.
    pub name: String,
    /// Wall-clock milliseconds at the time the tag was stamped.
    pub version: i64,
}

impl Tag {
    /// Create a tag stamped with the current wall-clock version.
    pub fn new(name: impl Into<String>) -> Self {
        Tag {
            name: name.into(),
            version: now_ms(),
        }
    }
}

/// The cache envelope carrying a value, its tags, and lifetime metadata.
///
/// The `value` field holds the caller's value already encoded to text; the
/// envelope itself is encoded again when written, so the stored payload is
/// double-encoded (see the `serializer` module). Field names are serialized
/// in camelCase for wire compatibility with existing deployed stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Logical key, before prefixing and hashing.
    pub key: String,
    /// The caller's value, encoded to text. Absent values carry no tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Ordered set of tags, no duplicate names.
    pub tags: Vec<Tag>,
    /// True iff `expires_in == 0`; permanent records are never considered
    /// expired by time.
    pub permanent: bool,
    /// Lifetime in milliseconds; 0 means no time bound.
    pub expires_in: i64,
    /// Wall-clock milliseconds at construction.
    pub created_at: i64,
}

impl Record {
    /// Construct a new record.
    ///
    /// `permanent` is derived from `expires_in`; a record without a value
    /// drops its tags.
    pub fn new(
        key: impl Into<String>,
        value: Option<String>,
        tags: Vec<Tag>,
        expires_in: i64,
    ) -> Self {
        let tags = if value.is_none() { Vec::new() } else { tags };
        Record {
            key: key.into(),
            value,
            tags,
            permanent: expires_in == 0,
            expires_in,
            created_at: now_ms(),
        }
    }

    /// Whether the record is time-expired at `now` (milliseconds).
    ///
    /// Permanent records never expire by time; tag checks are a separate
    /// concern handled by storage.
    pub fn is_expired(&self, now: i64) -> bool {
        !self.permanent && now > self.created_at + self.expires_in
    }

    /// Names of the record's tags, in recorded order.
    pub fn tag_names(&self) -> Vec<String> {
        self.tags.iter().map(|tag| tag.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanent_iff_zero_expires_in() {
        let permanent = Record::new("k", Some("\"v\"".into()), Vec::new(), 0);
        assert!(permanent.permanent);

        let bounded = Record::new("k", Some("\"v\"".into()), Vec::new(), 500);
        assert!(!bounded.permanent);
    }

    #[test]
    fn test_permanent_record_never_time_expires() {
        let record = Record::new("k", Some("\"v\"".into()), Vec::new(), 0);
        assert!(!record.is_expired(record.created_at + i64::MAX / 2));
    }

    #[test]
    fn test_time_expiry_boundary() {
        let record = Record::new("k", Some("\"v\"".into()), Vec::new(), 500);
        assert!(!record.is_expired(record.created_at + 500));
        assert!(record.is_expired(record.created_at + 501));
    }

    #[test]
    fn test_absent_value_drops_tags() {
        let record = Record::new("k", None, vec![Tag::new("a")], 0);
        assert!(record.tags.is_empty());
    }

    #[test]
    fn test_envelope_field_names_are_camel_case() {
        let record = Record::new("test", Some("\"123\"".into()), Vec::new(), 0);
        let text = serde_json::to_string(&record).unwrap();
        assert!(text.contains("\"expiresIn\":0"));
        assert!(text.contains("\"createdAt\":"));
        assert!(text.contains("\"permanent\":true"));
        assert!(text.contains("\"value\":\"\\\"123\\\"\""));
    }

    #[test]
    fn test_envelope_round_trip() {
        let record = Record::new(
            "test",
            Some("\"123\"".into()),
            vec![Tag {
                name: "uuid".into(),
                version: 42,
            }],
            1000,
        );
        let text = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&text).unwrap();
        assert_eq!(back.key, "test");
        assert_eq!(back.value.as_deref(), Some("\"123\""));
        assert_eq!(back.tags, record.tags);
        assert_eq!(back.expires_in, 1000);
        assert!(!back.permanent);
    }
}
