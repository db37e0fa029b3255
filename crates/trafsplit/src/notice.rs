// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dismissible user-facing notifications.

use crate::error::Error;
use crate::sync::SyncReport;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    /// Summary of a completed sync.
    pub fn from_report(report: &SyncReport) -> Self {
        let created = report.created_ids().len();
        if report.is_empty() {
            Notice::info("Nothing to save")
        } else if report.is_clean() {
            Notice::success(format!(
                "Saved ({} operations, {} created)",
                report.len(),
                created
            ))
        } else {
            Notice::warning(format!(
                "Saved with problems: {} failed, {} skipped of {}",
                report.failed(),
                report.skipped(),
                report.len()
            ))
        }
    }
}

impl From<&Error> for Notice {
    fn from(err: &Error) -> Self {
        match err {
            Error::Validation(v) => Notice::error(v.to_string()),
            other => Notice::error(other.to_string()),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{Action, EntityKind, OpOutcome, OpStatus};
    use crate::validate::ValidationError;

    #[test]
    fn test_validation_notice() {
        let err = Error::from(ValidationError::DescriptionTooLong(51));
        let notice = Notice::from(&err);
        assert_eq!(notice.severity, Severity::Error);
        assert_eq!(
            notice.message,
            "Description may be at most 50 characters (got 51)"
        );
    }

    #[test]
    fn test_report_notice() {
        let mut report = SyncReport::default();
        assert_eq!(Notice::from_report(&report).severity, Severity::Info);

        report.outcomes.push(OpOutcome {
            kind: EntityKind::Variant,
            action: Action::Create,
            label: "create variant 'A'".into(),
            status: OpStatus::Created("v1".into()),
        });
        assert_eq!(
            Notice::from_report(&report),
            Notice::success("Saved (1 operations, 1 created)")
        );

        report.outcomes.push(OpOutcome {
            kind: EntityKind::Endpoint,
            action: Action::Create,
            label: "create endpoint http://a".into(),
            status: OpStatus::Skipped,
        });
        assert_eq!(Notice::from_report(&report).severity, Severity::Warning);
    }
}
