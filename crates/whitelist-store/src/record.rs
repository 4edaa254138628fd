use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Name of the list field inside the persisted JSON object.
pub const WHITELIST_FIELD: &str = "whitelist_uid";

/// Indentation used when the record is written back to disk.
const INDENT: &[u8] = b"    ";

/// The persisted whitelist record: `{"whitelist_uid": [...]}`.
///
/// Any other top-level keys are carried along untouched so a rewrite never
/// drops data an operator put in the file by hand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhitelistRecord {
    pub whitelist_uid: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl WhitelistRecord {
    /// Parse a record from its JSON text.
    ///
    /// Fails when the text is not JSON, when `whitelist_uid` is missing, or
    /// when it is not a list of strings.
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Serialise the record as pretty-printed JSON with four-space indentation
    /// and a trailing newline.
    pub fn to_pretty_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        buf.push(b'\n');
        Ok(buf)
    }

    /// Whether an entry equal to `uid` after trimming is present.
    pub fn contains(&self, uid: &str) -> bool {
        let uid = uid.trim();
        self.whitelist_uid.iter().any(|u| u.trim() == uid)
    }

    /// Trim every entry, drop empty ones and collapse duplicates, keeping
    /// the first occurrence. Returns `true` if anything changed.
    pub fn normalize(&mut self) -> bool {
        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(self.whitelist_uid.len());

        for uid in &self.whitelist_uid {
            let trimmed = uid.trim();
            if trimmed.is_empty() || !seen.insert(trimmed.to_string()) {
                continue;
            }
            normalized.push(trimmed.to_string());
        }

        let changed = normalized != self.whitelist_uid;
        self.whitelist_uid = normalized;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_record() {
        let record = WhitelistRecord::parse(r#"{"whitelist_uid": ["1", "2"]}"#).unwrap();
        assert_eq!(record.whitelist_uid, vec!["1", "2"]);
        assert!(record.extra.is_empty());
    }

    #[test]
    fn reject_missing_list_field() {
        let err = WhitelistRecord::parse("{}").unwrap_err();
        assert!(
            err.to_string().contains(WHITELIST_FIELD),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn reject_non_list_field() {
        assert!(WhitelistRecord::parse(r#"{"whitelist_uid": "123"}"#).is_err());
    }

    #[test]
    fn reject_non_string_entries() {
        assert!(WhitelistRecord::parse(r#"{"whitelist_uid": [1, 2]}"#).is_err());
    }

    #[test]
    fn reject_non_json() {
        assert!(WhitelistRecord::parse("not json").is_err());
    }

    #[test]
    fn extra_keys_survive_rewrite() {
        let record =
            WhitelistRecord::parse(r#"{"whitelist_uid": ["7"], "owner": "ops"}"#).unwrap();
        let bytes = record.to_pretty_json().unwrap();
        let reparsed = WhitelistRecord::parse(std::str::from_utf8(&bytes).unwrap()).unwrap();
        assert_eq!(reparsed, record);
        assert_eq!(reparsed.extra["owner"], "ops");
    }

    #[test]
    fn pretty_json_uses_four_space_indent() {
        let record = WhitelistRecord {
            whitelist_uid: vec!["42".to_string()],
            extra: Default::default(),
        };
        let text = String::from_utf8(record.to_pretty_json().unwrap()).unwrap();
        assert_eq!(text, "{\n    \"whitelist_uid\": [\n        \"42\"\n    ]\n}\n");
    }

    #[test]
    fn contains_compares_trimmed() {
        let record = WhitelistRecord {
            whitelist_uid: vec![" 42 ".to_string()],
            extra: Default::default(),
        };
        assert!(record.contains("42"));
        assert!(record.contains("42\n"));
        assert!(!record.contains("4"));
    }

    #[test]
    fn normalize_trims_and_dedupes() {
        let mut record = WhitelistRecord {
            whitelist_uid: vec![
                " 1".to_string(),
                "2".to_string(),
                "1 ".to_string(),
                "  ".to_string(),
                "3".to_string(),
            ],
            extra: Default::default(),
        };
        assert!(record.normalize());
        assert_eq!(record.whitelist_uid, vec!["1", "2", "3"]);
        assert!(!record.normalize());
    }
}
