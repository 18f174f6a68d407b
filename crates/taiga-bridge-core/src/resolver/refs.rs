//! Ref -> id resolution

use serde_json::Value;

use super::Resolver;
use crate::model::EntityKind;
use crate::{BridgeError, Result};

impl Resolver {
    /// Every raw entity of `kind` in the active project
    pub async fn list_raw(&self, kind: EntityKind) -> Result<Vec<Value>> {
        let path = self.listing_path(kind.endpoint());
        match self.get(&path).await? {
            Value::Array(items) => Ok(items),
            other => Err(BridgeError::UnexpectedResponse(format!(
                "{} listing is not an array: {}",
                kind, other
            ))),
        }
    }

    /// Listing entry of `kind` carrying `reference`, if any
    pub async fn find_by_ref(&self, kind: EntityKind, reference: i64) -> Result<Option<Value>> {
        if !kind.has_ref() {
            return Err(BridgeError::InvalidInput(format!("{}s have no ref", kind)));
        }
        Ok(self
            .list_raw(kind)
            .await?
            .into_iter()
            .find(|item| item.get("ref").and_then(Value::as_i64) == Some(reference)))
    }

    /// Id of the entity of `kind` with `reference`; `None` when absent.
    ///
    /// Linear scan over the project listing.
    pub async fn resolve_id_by_ref(&self, kind: EntityKind, reference: i64) -> Result<Option<i64>> {
        Ok(self
            .find_by_ref(kind, reference)
            .await?
            .and_then(|item| item.get("id").and_then(Value::as_i64)))
    }

    /// Like [`resolve_id_by_ref`](Self::resolve_id_by_ref), failing with
    /// [`BridgeError::UnknownReference`] when absent
    pub async fn require_id_by_ref(&self, kind: EntityKind, reference: i64) -> Result<i64> {
        self.resolve_id_by_ref(kind, reference)
            .await?
            .ok_or(BridgeError::UnknownReference { kind, reference })
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;
    use crate::transport::Method;
    use proptest::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_present_and_absent_refs() {
        let (transport, resolver) = fixtures::resolver();
        transport.respond(
            Method::Get,
            "tasks?project=1",
            json!([{"id": 500, "ref": 4}, {"id": 501, "ref": 9}]),
        );

        assert_eq!(resolver.resolve_id_by_ref(EntityKind::Task, 9).await.unwrap(), Some(501));
        assert_eq!(resolver.resolve_id_by_ref(EntityKind::Task, 5).await.unwrap(), None);

        let err = resolver.require_id_by_ref(EntityKind::Task, 5).await.unwrap_err();
        assert_eq!(err.to_string(), "task #5 not found in the active project");
    }

    #[tokio::test]
    async fn test_sprints_have_no_ref() {
        let (_transport, resolver) = fixtures::resolver();
        let err = resolver.resolve_id_by_ref(EntityKind::Sprint, 1).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let (transport, resolver) = fixtures::resolver();
        transport.fail(Method::Get, "epics?project=1", 503, "unavailable");
        let err = resolver.resolve_id_by_ref(EntityKind::Epic, 1).await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(ref e) if e.status == 503));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_every_listed_ref_resolves(
            refs in proptest::collection::btree_set(1i64..500, 0..20),
            wanted in 1i64..500,
        ) {
            let (transport, resolver) = fixtures::resolver();
            let listing: Vec<Value> = refs
                .iter()
                .map(|r| json!({"id": r * 10, "ref": r}))
                .collect();
            transport.respond(Method::Get, "issues?project=1", Value::Array(listing));

            for r in &refs {
                let found = tokio_test::block_on(resolver.resolve_id_by_ref(EntityKind::Issue, *r));
                prop_assert_eq!(found.unwrap(), Some(r * 10));
            }
            let found = tokio_test::block_on(resolver.resolve_id_by_ref(EntityKind::Issue, wanted));
            let expected = refs.contains(&wanted).then_some(wanted * 10);
            prop_assert_eq!(found.unwrap(), expected);
        }
    }
}
