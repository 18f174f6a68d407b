//! Best-effort fallback chains
//!
//! An ordered list of named attempts, run one after another until one
//! succeeds. Failures of intermediate attempts are logged and swallowed; only
//! exhausting the whole chain is reported to the caller.

use futures::future::BoxFuture;

type AttemptFn<'a, T> = Box<dyn FnOnce() -> BoxFuture<'a, crate::Result<Option<T>>> + Send + 'a>;

/// Ordered list of named attempts
pub struct FallbackChain<'a, T> {
    label: &'static str,
    attempts: Vec<(&'static str, AttemptFn<'a, T>)>,
}

impl<'a, T> std::fmt::Debug for FallbackChain<'a, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackChain")
            .field("label", &self.label)
            .field(
                "attempts",
                &self.attempts.iter().map(|(n, _)| *n).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<'a, T: Send + 'a> FallbackChain<'a, T> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            attempts: Vec::new(),
        }
    }

    /// Append an attempt. `Ok(None)` means "no answer here, keep going".
    pub fn attempt<F>(mut self, name: &'static str, f: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'a, crate::Result<Option<T>>> + Send + 'a,
    {
        self.attempts.push((name, Box::new(f)));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.attempts.iter().map(|(name, _)| *name).collect()
    }

    /// First `Some` answer, with the name of the attempt that produced it
    pub async fn run(self) -> Option<(&'static str, T)> {
        for (name, attempt) in self.attempts {
            match attempt().await {
                Ok(Some(value)) => {
                    tracing::debug!("{}: answered by {}", self.label, name);
                    return Some((name, value));
                }
                Ok(None) => tracing::debug!("{}: {} had no answer", self.label, name),
                Err(e) => tracing::debug!("{}: {} failed: {}", self.label, name, e),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BridgeError, HttpError};
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_first_success_wins() {
        let calls = AtomicUsize::new(0);
        let chain = FallbackChain::new("test")
            .attempt("broken", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(BridgeError::Transport(HttpError::new(500, "down"))) }.boxed()
            })
            .attempt("empty", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(None) }.boxed()
            })
            .attempt("good", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(Some(7)) }.boxed()
            })
            .attempt("never", || async { Ok(Some(8)) }.boxed());

        assert_eq!(chain.names(), vec!["broken", "empty", "good", "never"]);
        assert_eq!(chain.run().await, Some(("good", 7)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_exhausted_chain() {
        let chain: FallbackChain<'_, i32> = FallbackChain::new("test")
            .attempt("a", || async { Ok(None) }.boxed())
            .attempt("b", || {
                async { Err(BridgeError::InvalidInput("x".into())) }.boxed()
            });
        assert!(tokio_test::block_on(chain.run()).is_none());
    }
}
