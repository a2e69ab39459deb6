//! Session registry: one shared watch session per key, fanned out to any
//! number of subscribers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kube::Client;
use tracing::{debug, info};
use uuid::Uuid;

use super::backoff::RetryPolicy;
use super::directory::ApiDirectory;
use super::event::{ResourceEvent, WatchKey};
use super::session::{SessionState, WatchSession};

/// Shared-session watch multiplexer.
///
/// Subscribers on the same (kind, namespace) key share one upstream
/// list+watch; the first subscribe starts the session, the last detach tears
/// it down. Cheap to clone, all clones share the same session map.
#[derive(Clone)]
pub struct WatchRegistry {
    client: Client,
    directory: Arc<ApiDirectory>,
    policy: RetryPolicy,
    sessions: Arc<Mutex<HashMap<WatchKey, Arc<WatchSession>>>>,
}

impl WatchRegistry {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self::with_policy(client, RetryPolicy::default())
    }

    #[must_use]
    pub fn with_policy(client: Client, policy: RetryPolicy) -> Self {
        Self {
            directory: Arc::new(ApiDirectory::new(client.clone())),
            client,
            policy,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Subscribe to changes on a resource kind, optionally scoped to one
    /// namespace. The callback first receives the session's current cache as
    /// synthetic ADDED events, then live deltas in upstream arrival order.
    ///
    /// Joining an existing live session never touches the network. A session
    /// found in a terminal state is replaced by a fresh one.
    pub fn subscribe<F>(&self, kind: &str, namespace: Option<&str>, callback: F) -> Subscription
    where
        F: Fn(&ResourceEvent) + Send + Sync + 'static,
    {
        let key = WatchKey::new(kind, namespace);
        let mut sessions = lock(&self.sessions);

        let (session, created) = match sessions.get(&key) {
            Some(existing) if !existing.state().is_terminal() => (existing.clone(), false),
            _ => {
                let session = WatchSession::new(key.clone());
                sessions.insert(key.clone(), session.clone());
                (session, true)
            }
        };
        drop(sessions);

        // attach before the driver starts, so a session that fails
        // immediately still delivers its one ERROR to this subscriber
        let id = session.attach(Arc::new(callback));
        if created {
            self.spawn_driver(session.clone());
            info!(%key, "watch session created");
        }
        debug!(%key, subscriber = %id, "subscriber attached");
        Subscription {
            id,
            session,
            registry: self.clone(),
            active: true,
        }
    }

    fn spawn_driver(&self, session: Arc<WatchSession>) {
        let client = self.client.clone();
        let directory = self.directory.clone();
        let policy = self.policy;
        let sessions = self.sessions.clone();
        let handle = session.clone();
        tokio::spawn(async move {
            handle.clone().run(client, directory, policy).await;
            // only evict our own entry; the key may already host a
            // replacement session
            let mut sessions = lock(&sessions);
            if let Some(current) = sessions.get(handle.key())
                && Arc::ptr_eq(current, &handle)
            {
                sessions.remove(handle.key());
            }
        });
    }

    fn release(&self, session: &Arc<WatchSession>, id: Uuid) {
        let last = session.detach(id);
        debug!(key = %session.key(), subscriber = %id, "subscriber detached");
        if last {
            info!(key = %session.key(), "last subscriber gone, tearing down session");
            session.cancel();
            let mut sessions = lock(&self.sessions);
            if let Some(current) = sessions.get(session.key())
                && Arc::ptr_eq(current, session)
            {
                sessions.remove(session.key());
            }
        }
    }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }

    /// Current state of the session for a key, if one exists.
    #[must_use]
    pub fn session_state(&self, kind: &str, namespace: Option<&str>) -> Option<SessionState> {
        let key = WatchKey::new(kind, namespace);
        lock(&self.sessions).get(&key).map(|s| s.state())
    }

    /// Cancel every session. Subscriptions become inert; dropping them is
    /// still safe.
    pub fn shutdown(&self) {
        let sessions = {
            let mut map = lock(&self.sessions);
            map.drain().collect::<Vec<_>>()
        };
        info!(count = sessions.len(), "shutting down all watch sessions");
        for (_, session) in sessions {
            session.cancel();
        }
    }
}

/// Handle for one subscriber. Dropping it (or calling [`Self::detach`])
/// unregisters the callback; the last handle on a session tears the session
/// down.
pub struct Subscription {
    id: Uuid,
    session: Arc<WatchSession>,
    registry: WatchRegistry,
    active: bool,
}

impl Subscription {
    /// Key this subscription is attached to.
    #[must_use]
    pub fn key(&self) -> &WatchKey {
        self.session.key()
    }

    #[must_use]
    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Unregister the callback now. After this returns the callback is never
    /// invoked again.
    pub fn detach(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.active {
            self.active = false;
            self.registry.release(&self.session, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use hyper::http::{Request, Response};
    use kube::client::Body;
    use tower_test::mock::{self, Handle};

    use super::*;

    // The handle is never serviced, so sessions sit in their startup state;
    // these tests only exercise the synchronous registry surface.
    fn test_client() -> (Client, Handle<Request<Body>, Response<Body>>) {
        let (service, handle) = mock::pair::<Request<Body>, Response<Body>>();
        (Client::new(service, "default"), handle)
    }

    #[tokio::test]
    async fn test_subscribes_on_one_key_share_a_session() {
        let (client, _handle) = test_client();
        let registry = WatchRegistry::new(client);

        let a = registry.subscribe("pods", Some("default"), |_: &ResourceEvent| {});
        let b = registry.subscribe("PODS", Some("default"), |_: &ResourceEvent| {});
        assert_eq!(registry.session_count(), 1);

        // a different namespace is a different key
        let c = registry.subscribe("pods", None, |_: &ResourceEvent| {});
        assert_eq!(registry.session_count(), 2);

        drop(c);
        assert_eq!(registry.session_count(), 1);
        a.detach();
        assert_eq!(registry.session_count(), 1);
        b.detach();
        assert_eq!(registry.session_count(), 0);
    }

    #[tokio::test]
    async fn test_session_state_is_observable() {
        let (client, _handle) = test_client();
        let registry = WatchRegistry::new(client);
        assert!(registry.session_state("pods", None).is_none());

        let sub = registry.subscribe("pods", None, |_: &ResourceEvent| {});
        assert!(registry.session_state("pods", None).is_some());
        assert_eq!(sub.key().to_string(), "pods");
        assert!(!sub.session_state().is_terminal());

        drop(sub);
        assert!(registry.session_state("pods", None).is_none());
    }

    #[tokio::test]
    async fn test_shutdown_stops_every_session() {
        let (client, _handle) = test_client();
        let registry = WatchRegistry::new(client);

        let a = registry.subscribe("pods", Some("default"), |_: &ResourceEvent| {});
        let b = registry.subscribe("services", Some("default"), |_: &ResourceEvent| {});
        assert_eq!(registry.session_count(), 2);

        registry.shutdown();
        assert_eq!(registry.session_count(), 0);

        // stale handles are inert after shutdown
        drop(a);
        drop(b);
        assert_eq!(registry.session_count(), 0);
    }
}
