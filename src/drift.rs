//! Deployment drift: has the draft moved away from what was last deployed?

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque value derived from both serialized documents. Equal fingerprints
/// mean equal text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

/// Fingerprint the serialized subject and persona text.
///
/// Length prefixes keep the boundary between the two documents unambiguous.
pub fn fingerprint(subject: &str, persona: &str) -> Fingerprint {
    Fingerprint(format!("{}:{}|{}:{}", subject.len(), subject, persona.len(), persona))
}

/// What is known about the last deploy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub baseline_known: bool,
    pub fingerprint: Option<Fingerprint>,
    pub deployed_at: Option<DateTime<Utc>>,
}

impl DeploymentRecord {
    /// Record a baseline loaded from previously deployed text.
    pub fn loaded(fingerprint: Fingerprint) -> Self {
        Self {
            baseline_known: true,
            fingerprint: Some(fingerprint),
            deployed_at: None,
        }
    }

    /// Record a successful deploy.
    pub fn deployed(fingerprint: Fingerprint, at: DateTime<Utc>) -> Self {
        Self {
            baseline_known: true,
            fingerprint: Some(fingerprint),
            deployed_at: Some(at),
        }
    }

    /// Compare the current draft fingerprint against the baseline.
    pub fn status(&self, current: &Fingerprint) -> DriftStatus {
        match &self.fingerprint {
            Some(baseline) if self.baseline_known => {
                if baseline == current {
                    DriftStatus::InSync {
                        deployed_at: self.deployed_at,
                    }
                } else {
                    DriftStatus::Differs {
                        deployed_at: self.deployed_at,
                    }
                }
            }
            _ => DriftStatus::NoBaseline,
        }
    }
}

/// Drift between the draft and the deployed documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftStatus {
    NoBaseline,
    Differs { deployed_at: Option<DateTime<Utc>> },
    InSync { deployed_at: Option<DateTime<Utc>> },
}

impl DriftStatus {
    pub fn deployed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            DriftStatus::NoBaseline => None,
            DriftStatus::Differs { deployed_at } | DriftStatus::InSync { deployed_at } => *deployed_at,
        }
    }

    pub fn is_in_sync(&self) -> bool {
        matches!(self, DriftStatus::InSync { .. })
    }

    /// Human-readable explanation.
    pub fn explanation(&self) -> String {
        let when = self
            .deployed_at()
            .map(|at| format!(" (last deployed {})", at.format("%Y-%m-%d %H:%M UTC")))
            .unwrap_or_default();
        match self {
            DriftStatus::NoBaseline => "Nothing has been deployed yet".to_string(),
            DriftStatus::Differs { .. } => format!("Draft differs from the deployed documents{}", when),
            DriftStatus::InSync { .. } => format!("Draft matches the deployed documents{}", when),
        }
    }
}

impl fmt::Display for DriftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.explanation())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_fingerprint_boundary_is_unambiguous() {
        assert_ne!(fingerprint("ab", "c"), fingerprint("a", "bc"));
        assert_eq!(fingerprint("# A\n", "# B\n"), fingerprint("# A\n", "# B\n"));
    }

    #[test]
    fn test_status_transitions() {
        let record = DeploymentRecord::default();
        assert_eq!(record.status(&fingerprint("a", "b")), DriftStatus::NoBaseline);

        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let record = DeploymentRecord::deployed(fingerprint("a", "b"), at);
        assert!(record.status(&fingerprint("a", "b")).is_in_sync());
        let status = record.status(&fingerprint("a", "b!"));
        assert_eq!(status, DriftStatus::Differs { deployed_at: Some(at) });
        assert_eq!(
            status.explanation(),
            "Draft differs from the deployed documents (last deployed 2026-03-01 09:30 UTC)"
        );
    }

    #[test]
    fn test_loaded_baseline_has_no_timestamp() {
        let record = DeploymentRecord::loaded(fingerprint("x", "y"));
        let status = record.status(&fingerprint("x", "y"));
        assert_eq!(status, DriftStatus::InSync { deployed_at: None });
        assert_eq!(status.to_string(), "Draft matches the deployed documents");
    }
}
