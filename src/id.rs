use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::IdentityRecord;
use crate::{Result, ViewError};

/// Source-independent user id. Two ids denote the same user exactly when
/// their strings are equal.
#[derive(Eq, PartialEq, Hash, Clone, Debug, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CanonicalId(String);

impl CanonicalId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for CanonicalId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for CanonicalId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Canonical id of a raw identity record.
///
/// The identity service names the field `id`, the profile service names it
/// `user_id`; ids arrive either as JSON strings or integers. `id` wins when
/// both are present. Blank strings, floats and other JSON shapes do not count.
pub fn normalize(record: &IdentityRecord) -> Result<CanonicalId> {
    record
        .id
        .as_ref()
        .and_then(id_text)
        .or_else(|| record.user_id.as_ref().and_then(id_text))
        .map(CanonicalId)
        .ok_or(ViewError::MalformedIdentity)
}

/// Canonical form of a user-supplied subject id (route parameter etc).
///
/// `.` and `..` are rejected: as a path segment they would address a
/// different resource than the one named.
pub fn from_input(raw: &str) -> Option<CanonicalId> {
    let trimmed = raw.trim();
    if matches!(trimmed, "" | "." | "..") {
        return None;
    }
    Some(CanonicalId(trimmed.to_owned()))
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        Value::Number(n) => n
            .as_u64()
            .map(|v| v.to_string())
            .or_else(|| n.as_i64().map(|v| v.to_string())),
        _ => None,
    }
}
