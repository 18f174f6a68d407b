//! Username resolution

use futures::FutureExt;
use serde_json::Value;

use super::Resolver;
use crate::cache::Cache;
use crate::fallback::FallbackChain;
use crate::model::{Token, UserSummary};
use crate::transport::Query;
use crate::{BridgeError, Result};

impl Resolver {
    pub(super) fn seed_users_from_project(&self) {
        let project = self.project.as_ref();
        let owner = project.get("owner").filter(|o| o.is_object()).into_iter();
        let members = project
            .get("members")
            .and_then(Value::as_array)
            .into_iter()
            .flatten();
        for raw in owner.chain(members) {
            if let Some(user) = UserSummary::from_raw(raw) {
                self.remember_user(user);
            }
        }
    }

    fn remember_user(&self, user: UserSummary) -> i64 {
        let id = user.id;
        self.usernames.put(user.username.to_lowercase(), id);
        self.users.put(id, user);
        id
    }

    /// Populate the username cache from the project membership listing.
    ///
    /// Runs until one listing succeeds; failures leave the cache cold.
    pub async fn warm_users(&self) {
        if self.usernames.is_warm() {
            return;
        }
        let path = self.listing_path("memberships");
        match self.get(&path).await {
            Ok(Value::Array(memberships)) => {
                let users: Vec<UserSummary> =
                    memberships.iter().filter_map(UserSummary::from_raw).collect();
                tracing::debug!("Warmed {} project members", users.len());
                self.users
                    .warm(users.iter().map(|u| (u.id, u.clone())).collect());
                self.usernames.warm(
                    users
                        .into_iter()
                        .map(|u| (u.username.to_lowercase(), u.id))
                        .collect(),
                );
            }
            Ok(other) => tracing::debug!("Unexpected membership listing: {}", other),
            Err(e) => tracing::debug!("Membership listing failed: {}", e),
        }
    }

    /// Resolve a username (or pass a numeric id through) to a user id.
    ///
    /// Token parsing decides what is an id: a numeric string such as `"42"`
    /// arrives as [`Token::Id`] and is never looked up as a username. Pass
    /// [`Token::Name`] explicitly for usernames made only of digits.
    ///
    /// Tries the membership cache, then an exact-username query, then a
    /// free-text search preferring an exact case-insensitive match.
    pub async fn resolve_user_id(&self, token: &Token) -> Result<i64> {
        let name = match token {
            Token::Id(id) => return Ok(*id),
            Token::Name(name) => name.trim().to_string(),
        };
        if name.is_empty() {
            return Err(BridgeError::InvalidInput("empty username".into()));
        }
        let key = name.to_lowercase();

        let exact_path = Query::new("users")
            .param("project", self.project_id)
            .param("username", &name)
            .build();
        let search_path = Query::new("users")
            .param("project", self.project_id)
            .param("q", &name)
            .build();

        let chain = FallbackChain::new("resolve user")
            .attempt("membership cache", {
                let key = key.clone();
                move || {
                    async move {
                        self.warm_users().await;
                        Ok(self.usernames.get(&key))
                    }
                    .boxed()
                }
            })
            .attempt("exact username", {
                let key = key.clone();
                move || {
                    async move {
                        let found = self.get(&exact_path).await?;
                        Ok(pick_user(&found, &key, false).map(|u| self.remember_user(u)))
                    }
                    .boxed()
                }
            })
            .attempt("search", move || {
                async move {
                    let found = self.get(&search_path).await?;
                    Ok(pick_user(&found, &key, true).map(|u| self.remember_user(u)))
                }
                .boxed()
            });

        match chain.run().await {
            Some((_, id)) => Ok(id),
            None => Err(BridgeError::UnknownUser(name)),
        }
    }
}

/// Pick the user matching `key` from a listing; with `first_otherwise`, fall
/// back to the first result.
fn pick_user(listing: &Value, key: &str, first_otherwise: bool) -> Option<UserSummary> {
    let users: Vec<UserSummary> = listing
        .as_array()?
        .iter()
        .filter_map(UserSummary::from_raw)
        .collect();
    let exact = users.iter().position(|u| u.username.to_lowercase() == key);
    match exact {
        Some(index) => users.into_iter().nth(index),
        None if first_otherwise => users.into_iter().next(),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;
    use crate::normalize::NameLookup;
    use crate::transport::Method;
    use serde_json::json;

    #[tokio::test]
    async fn test_membership_cache_is_case_insensitive() {
        let (transport, resolver) = fixtures::resolver();
        transport.respond(
            Method::Get,
            "memberships?project=1",
            json!([{"id": 70, "user": 5, "username": "alice", "full_name": "Alice"}]),
        );

        assert_eq!(resolver.resolve_user_id(&Token::from("Alice")).await.unwrap(), 5);
        assert_eq!(resolver.resolve_user_id(&Token::from("alice")).await.unwrap(), 5);
        // warmed once
        assert_eq!(transport.calls_to(Method::Get, "memberships").len(), 1);
        assert_eq!(resolver.user(5).unwrap().full_name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (transport, resolver) = fixtures::resolver();
        transport.respond(
            Method::Get,
            "memberships?project=1",
            json!([{"user": 5, "username": "alice"}]),
        );

        let err = resolver.resolve_user_id(&Token::from("bob")).await.unwrap_err();
        assert!(matches!(err, BridgeError::UnknownUser(ref name) if name == "bob"));
        assert_eq!(transport.calls_to(Method::Get, "users?").len(), 2);
    }

    #[tokio::test]
    async fn test_numeric_passthrough_and_owner_seed() {
        let (transport, resolver) = fixtures::resolver();
        assert_eq!(resolver.resolve_user_id(&Token::Id(42)).await.unwrap(), 42);
        // digit-only strings are ids, not usernames
        assert_eq!(Token::from("42"), Token::Id(42));
        assert_eq!(resolver.resolve_user_id(&Token::from(" 42 ")).await.unwrap(), 42);
        assert!(transport.calls().is_empty());

        // memberships unavailable; owner comes from the project detail
        assert_eq!(resolver.resolve_user_id(&Token::from("OWNER")).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_digit_only_username_as_explicit_name() {
        let (transport, resolver) = fixtures::resolver();
        transport.respond(
            Method::Get,
            "users?project=1&username=1234",
            json!([{"id": 77, "username": "1234"}]),
        );

        let id = resolver
            .resolve_user_id(&Token::Name("1234".into()))
            .await
            .unwrap();
        assert_eq!(id, 77);
    }

    #[tokio::test]
    async fn test_query_fallbacks() {
        let (transport, resolver) = fixtures::resolver();
        transport
            .fail(Method::Get, "memberships?project=1", 500, "down")
            .respond(Method::Get, "users?project=1&username=carol", json!([]))
            .respond(
                Method::Get,
                "users?project=1&q=carol",
                json!([
                    {"id": 30, "username": "caroline"},
                    {"id": 31, "username": "Carol"}
                ]),
            )
            .respond(
                Method::Get,
                "users?project=1&q=dan",
                json!([{"id": 40, "username": "daniel"}]),
            );

        assert_eq!(resolver.resolve_user_id(&Token::from("carol")).await.unwrap(), 31);
        assert_eq!(resolver.resolve_user_id(&Token::from("dan")).await.unwrap(), 40);
        // remembered after the search
        assert_eq!(resolver.resolve_user_id(&Token::from("carol")).await.unwrap(), 31);
        assert_eq!(transport.calls_to(Method::Get, "users?project=1&q=carol").len(), 1);
    }

    #[test]
    fn test_pick_user() {
        let listing = json!([{"id": 1, "username": "ann"}, {"id": 2, "username": "Bob"}]);
        assert_eq!(pick_user(&listing, "bob", false).unwrap().id, 2);
        assert!(pick_user(&listing, "zed", false).is_none());
        assert_eq!(pick_user(&listing, "zed", true).unwrap().id, 1);
        assert!(pick_user(&json!({}), "ann", true).is_none());
    }
}
