//! Session identity resolution from bootstrap parameters
//!
//! Sessions are addressed by a `sid`/`iid` pair supplied via shareable
//! links. Both are opaque strings; any non-empty value is accepted
//! verbatim so study operators can invent their own naming schemes.

use std::collections::HashMap;

/// Query parameter carrying the session id
pub const SID_PARAM: &str = "sid";
/// Query parameter carrying the interview variant id
pub const IID_PARAM: &str = "iid";

/// Interview variant used when the link does not name one
pub const DEFAULT_INTERVIEW_ID: &str = "PART_TIME";

/// Resolved identifiers for one session, immutable for its lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub session_id: String,
    pub interview_id: String,
}

/// Fallback values used when a bootstrap parameter is absent or empty
#[derive(Debug, Clone)]
pub struct SessionDefaults {
    pub session_id: String,
    pub interview_id: String,
}

impl SessionDefaults {
    /// Fresh defaults: a random session id and the stock interview variant
    pub fn generate() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            interview_id: DEFAULT_INTERVIEW_ID.to_string(),
        }
    }
}

/// Resolve identifiers from external parameters, falling back to defaults.
///
/// A parameter wins only when present and non-empty; no format validation
/// is performed.
pub fn resolve(params: &HashMap<String, String>, defaults: &SessionDefaults) -> SessionIdentity {
    SessionIdentity {
        session_id: pick(params, SID_PARAM, &defaults.session_id),
        interview_id: pick(params, IID_PARAM, &defaults.interview_id),
    }
}

fn pick(params: &HashMap<String, String>, key: &str, default: &str) -> String {
    match params.get(key) {
        Some(value) if !value.is_empty() => value.clone(),
        _ => default.to_string(),
    }
}
