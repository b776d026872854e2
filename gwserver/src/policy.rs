//! In-memory policy set: loaded once at startup, O(1) membership checks,
//! default-deny. `gwcore::policy` owns line parsing; this module owns the
//! loaded set and the `allow()` decision.

use std::{collections::HashSet, path::Path};

use gwcore::policy::{parse_line, PolicyLine, PolicyParseError, PolicyRule};

#[derive(Debug, thiserror::Error)]
pub enum PolicyLoadError {
    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] PolicyParseError),
}

/// The loaded, in-memory policy set. Reload is not required -- restarting
/// the gateway is the supported change path (spec.md §4.4).
pub struct PolicySet {
    rules: HashSet<PolicyRule>,
}

impl PolicySet {
    pub fn load(path: &Path) -> Result<Self, PolicyLoadError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, PolicyLoadError> {
        let mut rules = HashSet::new();
        for (i, line) in text.lines().enumerate() {
            let line_no = i + 1;
            match parse_line(line_no, line)? {
                None => {}
                Some(PolicyLine::Permission(rule)) => {
                    // Duplicates are allowed and idempotent (spec.md §4.4).
                    rules.insert(rule);
                }
                Some(PolicyLine::Grouping { user, role }) => {
                    tracing::warn!(
                        user, role, line_no,
                        "policy file contains a role-grouping (`g,`) line; \
                         the core enforcer does not evaluate role grouping \
                         and this line has no effect"
                    );
                }
            }
        }
        Ok(Self { rules })
    }

    /// `allow(s, o, a) = true` iff `(s, o, a)` is present in the loaded
    /// set. Anything not in the set is denied.
    pub fn allow(&self, subject: &str, object: &str, action: &str) -> bool {
        self.rules.contains(&PolicyRule::new(subject, object, action))
    }
}
