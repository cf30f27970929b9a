//! Principal - the authenticated caller as seen by the authorization gate.

use serde::{Deserialize, Serialize};

/// An authenticated principal.
///
/// `subject` is the normalized email the session credentials were minted for;
/// role membership is resolved from the role repository at check time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub subject: String,
    pub name: Option<String>,
    pub branch_code: Option<String>,
}

impl Principal {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: super::normalize_email(&subject.into()),
            name: None,
            branch_code: None,
        }
    }
}
