//! Lookup taxonomies: statuses, severities, priorities, issue types, roles, points

use futures::FutureExt;
use serde_json::Value;
use std::sync::Arc;

use super::Resolver;
use crate::cache::Cache;
use crate::fallback::FallbackChain;
use crate::model::{LookupEntry, LookupKind, Token};
use crate::{BridgeError, Result};

fn parse_entries(raw: Option<&Value>) -> Option<Vec<LookupEntry>> {
    let entries: Vec<LookupEntry> = raw?
        .as_array()?
        .iter()
        .filter_map(LookupEntry::from_raw)
        .collect();
    if entries.is_empty() {
        None
    } else {
        Some(entries)
    }
}

impl Resolver {
    /// Entries of a lookup collection, warming the cache on first use.
    ///
    /// Tries the dedicated endpoint, then the array embedded in the project
    /// detail. When both come up empty nothing is cached and an empty list is
    /// returned.
    pub async fn lookup_entries(&self, kind: LookupKind) -> Arc<Vec<LookupEntry>> {
        if let Some(entries) = self.lookups.get(&kind) {
            return entries;
        }

        let path = self.listing_path(kind.endpoint());
        let chain = FallbackChain::new("lookup listing")
            .attempt("endpoint", move || {
                async move {
                    let raw = self.get(&path).await?;
                    Ok(parse_entries(Some(&raw)))
                }
                .boxed()
            })
            .attempt("project detail", move || {
                async move { Ok(parse_entries(self.project.get(kind.project_field()))) }.boxed()
            });

        match chain.run().await {
            Some((source, entries)) => {
                tracing::debug!("Warmed {} {} entries from {}", entries.len(), kind, source);
                let entries = Arc::new(entries);
                self.lookups.put(kind, Arc::clone(&entries));
                entries
            }
            None => {
                tracing::debug!("No {} entries available", kind);
                Arc::new(Vec::new())
            }
        }
    }

    /// Resolve a lookup label (case-insensitive, never fuzzy) to its id.
    ///
    /// Numeric tokens pass through unchanged.
    pub async fn resolve_lookup_name(&self, kind: LookupKind, token: &Token) -> Result<i64> {
        let name = match token {
            Token::Id(id) => return Ok(*id),
            Token::Name(name) => name,
        };
        let entries = self.lookup_entries(kind).await;
        find_by_name(&entries, name)
            .map(|entry| entry.id)
            .ok_or_else(|| BridgeError::UnknownLookupValue {
                kind,
                value: name.clone(),
            })
    }
}

/// Case-insensitive name match
pub(super) fn find_by_name<'a>(entries: &'a [LookupEntry], name: &str) -> Option<&'a LookupEntry> {
    let wanted = name.trim().to_lowercase();
    entries.iter().find(|entry| entry.name.to_lowercase() == wanted)
}
