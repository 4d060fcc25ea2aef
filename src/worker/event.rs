//! Lifecycle and fetch events dispatched by the host
//!
//! Handlers never block the host directly. They hand their asynchronous
//! work to the event ([`ExtendableEvent::wait_until`],
//! [`FetchEvent::respond_with`]) and the host awaits it before it treats
//! the event as handled.

use crate::error::{ShellError, ShellResult};
use crate::network::{Network, Request, Response};
use futures_util::future::{join_all, BoxFuture};
use std::fmt;
use std::future::Future;

/// Lifecycle events that can be extended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Install,
    Activate,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => write!(f, "install"),
            Self::Activate => write!(f, "activate"),
        }
    }
}

/// An install or activate event whose lifetime handlers can extend
pub struct ExtendableEvent {
    kind: LifecycleEvent,
    pending: Vec<BoxFuture<'static, ShellResult<()>>>,
}

impl ExtendableEvent {
    pub fn new(kind: LifecycleEvent) -> Self {
        Self {
            kind,
            pending: Vec::new(),
        }
    }

    pub fn kind(&self) -> LifecycleEvent {
        self.kind
    }

    /// Keep the event alive until `work` completes
    pub fn wait_until<F>(&mut self, work: F)
    where
        F: Future<Output = ShellResult<()>> + Send + 'static,
    {
        self.pending.push(Box::pin(work));
    }

    /// Number of outstanding extensions
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Drive every extension to completion
    ///
    /// All work runs to the end even if one piece fails, so no write is
    /// abandoned halfway. The first error (in registration order) is
    /// returned.
    pub async fn settle(self) -> ShellResult<()> {
        let results = join_all(self.pending).await;
        results.into_iter().collect::<ShellResult<Vec<()>>>()?;
        Ok(())
    }
}

/// Where a fetch response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Cache,
    Network,
}

impl fmt::Display for ServedFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// A response and its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub response: Response,
    pub source: ServedFrom,
}

impl Served {
    pub fn from_cache(response: Response) -> Self {
        Self {
            response,
            source: ServedFrom::Cache,
        }
    }

    pub fn from_network(response: Response) -> Self {
        Self {
            response,
            source: ServedFrom::Network,
        }
    }
}

/// An intercepted request awaiting a response
pub struct FetchEvent {
    request: Request,
    response: Option<BoxFuture<'static, ShellResult<Served>>>,
}

impl FetchEvent {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: None,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Supply the eventual response; may be called once
    pub fn respond_with<F>(&mut self, response: F) -> ShellResult<()>
    where
        F: Future<Output = ShellResult<Served>> + Send + 'static,
    {
        if self.response.is_some() {
            return Err(ShellError::AlreadyResponded);
        }
        self.response = Some(Box::pin(response));
        Ok(())
    }

    /// Whether a handler claimed the request
    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    /// Await the handler's response, or go to the network if none was given
    pub async fn into_response(self, network: &dyn Network) -> ShellResult<Served> {
        match self.response {
            Some(response) => response.await,
            None => network.fetch(&self.request).await.map(Served::from_network),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedNetwork;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn settle_runs_all_work() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut event = ExtendableEvent::new(LifecycleEvent::Install);

        for _ in 0..3 {
            let done = done.clone();
            event.wait_until(async move {
                tokio::task::yield_now().await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        assert_eq!(event.pending(), 3);
        event.settle().await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn settle_finishes_siblings_of_failed_work() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut event = ExtendableEvent::new(LifecycleEvent::Activate);

        event.wait_until(async { Err(ShellError::Internal("boom".to_string())) });
        let sibling = done.clone();
        event.wait_until(async move {
            tokio::task::yield_now().await;
            sibling.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(event.settle().await.is_err());
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn settle_with_no_work_succeeds() {
        ExtendableEvent::new(LifecycleEvent::Install).settle().await.unwrap();
    }

    #[tokio::test]
    async fn respond_with_only_once() {
        let mut event = FetchEvent::new(Request::get("/a"));
        event
            .respond_with(async { Ok(Served::from_cache(Response::new(200, "a"))) })
            .unwrap();

        let again = event.respond_with(async { Ok(Served::from_cache(Response::new(200, "b"))) });
        assert!(matches!(again, Err(ShellError::AlreadyResponded)));

        let network = ScriptedNetwork::new();
        let served = event.into_response(&network).await.unwrap();
        assert_eq!(served.source, ServedFrom::Cache);
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn unclaimed_fetch_goes_to_network() {
        let network = ScriptedNetwork::new().with("/a", 200, "from network");
        let event = FetchEvent::new(Request::get("/a"));

        assert!(!event.has_response());
        let served = event.into_response(&network).await.unwrap();

        assert_eq!(served.source, ServedFrom::Network);
        assert_eq!(served.response.body, b"from network");
        assert_eq!(network.calls(), 1);
    }
}
