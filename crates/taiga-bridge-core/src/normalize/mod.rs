//! Entity Normalizer
//!
//! Converts raw backend entities, whose shape varies between backend versions,
//! into stable views; and sanitizes caller-supplied write bodies before they
//! are sent back.

pub mod closed;
pub mod comments;
pub mod dates;
pub mod extract;
pub mod sanitize;
pub mod tags;
pub mod views;

pub use closed::is_closed;
pub use comments::{comments_from_history, comments_from_timeline};
pub use dates::{date_only, parse_date};
pub use extract::{display_name, raw_id, user_display, FieldSpec};
pub use sanitize::{is_read_only, sanitize, sanitized, READ_ONLY_FIELDS};
pub use tags::{decode_tags, encode_tags, tags_for_write};
pub use views::{project_view, sprint_view, work_item_view};

use crate::model::{LookupEntry, LookupKind, UserSummary};

/// Synchronous access to already-warmed lookup data.
///
/// The facade warms what it needs before normalizing; a miss here only means
/// the view shows the raw id without a label.
pub trait NameLookup {
    fn lookup(&self, kind: LookupKind, id: i64) -> Option<LookupEntry>;

    fn user(&self, id: i64) -> Option<UserSummary>;
}

/// Lookup that knows nothing; views fall back to denormalized siblings only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

impl NameLookup for NoLookup {
    fn lookup(&self, _kind: LookupKind, _id: i64) -> Option<LookupEntry> {
        None
    }

    fn user(&self, _id: i64) -> Option<UserSummary> {
        None
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use std::collections::HashMap;

    /// Fixed lookup table for normalizer tests
    #[derive(Default)]
    pub struct StaticLookup {
        pub entries: HashMap<(LookupKind, i64), LookupEntry>,
        pub users: HashMap<i64, UserSummary>,
    }

    impl StaticLookup {
        pub fn with(mut self, kind: LookupKind, id: i64, name: &str) -> Self {
            self.entries.insert(
                (kind, id),
                LookupEntry {
                    id,
                    name: name.to_string(),
                    slug: None,
                    is_closed: None,
                    value: None,
                },
            );
            self
        }

        pub fn with_closed(mut self, kind: LookupKind, id: i64, name: &str, closed: bool) -> Self {
            self = self.with(kind, id, name);
            if let Some(entry) = self.entries.get_mut(&(kind, id)) {
                entry.is_closed = Some(closed);
            }
            self
        }

        pub fn with_user(mut self, id: i64, username: &str) -> Self {
            self.users.insert(
                id,
                UserSummary {
                    id,
                    username: username.to_string(),
                    full_name: None,
                },
            );
            self
        }
    }

    impl NameLookup for StaticLookup {
        fn lookup(&self, kind: LookupKind, id: i64) -> Option<LookupEntry> {
            self.entries.get(&(kind, id)).cloned()
        }

        fn user(&self, id: i64) -> Option<UserSummary> {
            self.users.get(&id).cloned()
        }
    }
}
