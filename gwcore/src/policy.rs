//! The `p, subject, object, action` policy line shape. Parsing lives here;
//! the in-memory set and the `allow()` decision function live in
//! `gwserver`, which is the only crate that needs to hold a loaded policy.

use std::fmt;

/// A single `(subject, object, action)` permission triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicyRule {
    pub subject: String,
    pub object: String,
    pub action: String,
}

impl PolicyRule {
    pub fn new(
        subject: impl Into<String>,
        object: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            action: action.into(),
        }
    }
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p, {}, {}, {}", self.subject, self.object, self.action)
    }
}

/// One non-comment, non-blank line from a policy file, before it's decided
/// whether it's a rule this gateway evaluates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyLine {
    /// `p, subject, object, action` -- evaluated.
    Permission(PolicyRule),
    /// `g, user, role` -- parsed but not evaluated. Casbin-style role
    /// grouping is out of scope for the core enforcer (spec §4.4); we keep
    /// the line around only so the loader can warn about it by name
    /// instead of silently dropping unrecognized input.
    Grouping { user: String, role: String },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolicyParseError {
    #[error("malformed policy line {line_no}: {text:?}")]
    Malformed { line_no: usize, text: String },
}

/// Parse one line of a policy file. Returns `Ok(None)` for blank lines and
/// `#`-comments.
pub fn parse_line(
    line_no: usize,
    line: &str,
) -> Result<Option<PolicyLine>, PolicyParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let fields: Vec<&str> = trimmed.split(',').map(str::trim).collect();
    let malformed = || PolicyParseError::Malformed {
        line_no,
        text: line.to_owned(),
    };

    match fields.as_slice() {
        ["p", subject, object, action] => {
            if subject.is_empty() || object.is_empty() || action.is_empty() {
                return Err(malformed());
            }
            Ok(Some(PolicyLine::Permission(PolicyRule::new(
                *subject, *object, *action,
            ))))
        }
        ["g", user, role] => {
            if user.is_empty() || role.is_empty() {
                return Err(malformed());
            }
            Ok(Some(PolicyLine::Grouping {
                user: (*user).to_owned(),
                role: (*role).to_owned(),
            }))
        }
        [kind, ..] if *kind != "p" && *kind != "g" => {
            // spec.md §4.4: an unrecognized rule form is ignored with a
            // warning, never treated as a malformed file or a wildcard
            // allow.
            tracing::warn!(
                line_no,
                kind,
                text = line,
                "policy file contains a line with an unrecognized rule \
                 kind; ignoring it"
            );
            Ok(None)
        }
        _ => Err(malformed()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_permission_line() {
        let line = parse_line(1, "p, tenant_a, backend_a, access")
            .unwrap()
            .unwrap();
        assert_eq!(
            line,
            PolicyLine::Permission(PolicyRule::new(
                "tenant_a",
                "backend_a",
                "access"
            ))
        );
    }

    #[test]
    fn parses_grouping_line() {
        let line = parse_line(1, "g, alice, admin").unwrap().unwrap();
        assert_eq!(
            line,
            PolicyLine::Grouping {
                user: "alice".to_owned(),
                role: "admin".to_owned(),
            }
        );
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        assert_eq!(parse_line(1, "").unwrap(), None);
        assert_eq!(parse_line(1, "   ").unwrap(), None);
        assert_eq!(parse_line(1, "# a comment").unwrap(), None);
    }

    #[test]
    fn ignores_unknown_rule_kind_instead_of_erroring() {
        assert_eq!(
            parse_line(3, "x, tenant_a, backend_a, access").unwrap(),
            None
        );
    }

    #[test]
    fn rejects_wrong_field_count() {
        let err = parse_line(2, "p, tenant_a, backend_a").unwrap_err();
        assert!(matches!(err, PolicyParseError::Malformed { line_no: 2, .. }));
    }

    #[test]
    fn rejects_empty_fields() {
        let err = parse_line(1, "p, , backend_a, access").unwrap_err();
        assert!(matches!(err, PolicyParseError::Malformed { .. }));
    }
}
