//! Closed/done detection, for client-side sorting and styling only.
//!
//! Never used for write decisions: not every backend version exposes a
//! reliable flag, so the vocabulary match below is an approximation.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use super::extract::raw_id;
use super::NameLookup;
use crate::model::LookupKind;

lazy_static! {
    static ref CLOSED_VOCABULARY: Regex =
        Regex::new(r"(?i)\b(closed|done|completed|resolved|archived|finished)\b")
            .expect("closed vocabulary pattern");
}

/// Whether a status name or slug reads as a terminal state
pub fn looks_closed(label: &str) -> bool {
    CLOSED_VOCABULARY.is_match(label)
}

/// Closed flag of a raw entity whose status belongs to `status_kind`.
///
/// Order: explicit boolean on the status sibling, explicit boolean on the
/// cached status entry, the entity's own `is_closed`, then the vocabulary
/// match on the status name/slug as a logged last resort.
pub fn is_closed(raw: &Value, status_kind: Option<LookupKind>, names: &dyn NameLookup) -> bool {
    let sibling = raw.get("status_extra_info").filter(|v| v.is_object());
    if let Some(flag) = sibling
        .and_then(|info| info.get("is_closed"))
        .and_then(Value::as_bool)
    {
        return flag;
    }

    let cached = status_kind
        .zip(raw_id(raw, "status"))
        .and_then(|(kind, id)| names.lookup(kind, id));
    if let Some(flag) = cached.as_ref().and_then(|entry| entry.is_closed) {
        return flag;
    }

    if let Some(flag) = raw.get("is_closed").and_then(Value::as_bool) {
        return flag;
    }

    let mut labels: Vec<String> = Vec::new();
    if let Some(info) = sibling {
        for key in ["name", "slug"] {
            if let Some(label) = info.get(key).and_then(Value::as_str) {
                labels.push(label.to_string());
            }
        }
    }
    if let Some(entry) = cached {
        labels.push(entry.name);
        labels.extend(entry.slug);
    }

    let closed = labels.iter().any(|label| looks_closed(label));
    if !labels.is_empty() {
        tracing::debug!(
            "no closed flag exposed; inferred closed={} from status labels {:?}",
            closed,
            labels
        );
    }
    closed
}
