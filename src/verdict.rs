use serde::{Deserialize, Serialize};

use crate::error::NamePulseError;

/// A verdict for a content hash, as reported by the lookup service.
///
/// Verdicts arrive independently of `add_resource` and are matched to stored
/// resources by hash only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(alias = "resource")]
    pub sha256: String,
    pub infected: bool,
    #[serde(default)]
    pub positives: Option<u32>,
    #[serde(default)]
    pub total: Option<u32>,
    /// When the service scanned the resource (Unix seconds, UTC)
    #[serde(default)]
    pub scan_date: Option<i64>,
}

impl Verdict {
    pub fn new(sha256: &str, infected: bool) -> Self {
        Verdict {
            sha256: sha256.to_owned(),
            infected,
            positives: None,
            total: None,
            scan_date: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, NamePulseError> {
        let verdict: Verdict = serde_json::from_str(json)?;
        if verdict.sha256.trim().is_empty() {
            return Err(NamePulseError::Error("Verdict has an empty hash".into()));
        }
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_json_with_metadata() {
        let json = r#"{"sha256":"abc","infected":true,"positives":12,"total":60,"scan_date":1700000000}"#;
        let verdict = Verdict::from_json(json).unwrap();
        assert_eq!(
            verdict,
            Verdict {
                sha256: "abc".into(),
                infected: true,
                positives: Some(12),
                total: Some(60),
                scan_date: Some(1_700_000_000),
            }
        );
    }

    #[test]
    fn test_from_json_minimal_and_alias() {
        let verdict = Verdict::from_json(r#"{"resource":"abc","infected":false}"#).unwrap();
        assert_eq!(verdict, Verdict::new("abc", false));
    }

    #[test]
    fn test_from_json_rejects_empty_hash() {
        assert!(Verdict::from_json(r#"{"sha256":" ","infected":true}"#).is_err());
        assert!(Verdict::from_json("not json").is_err());
    }
}
