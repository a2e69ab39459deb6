//! One live list+watch session per watch key.
//!
//! A session owns the point-in-time cache for its collection, the resume
//! cursor, and the subscriber set. A background driver task keeps the
//! upstream connection alive: list seeds the cache, watch applies deltas in
//! arrival order, failures are classified and either retried with backoff,
//! resolved with a fresh list, or turned into a terminal ERROR event.
//!
//! Locking: `inner` guards {state, cache, cursor, subscriber set} and is
//! never held while a callback runs or across a network call. Delivery
//! takes a snapshot of the subscriber slots and invokes them under the
//! separate `delivery` mutex, which serializes batches (all subscribers see
//! the same order) and keeps replay-on-attach consistent with live deltas.
//! A callback may therefore detach any subscriber of its own session.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::{TryStreamExt, pin_mut};
use kube::Client;
use kube::api::{Api, DynamicObject, ListParams, WatchEvent, WatchParams};
use kube::error::ErrorResponse;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::backoff::{FailureKind, RetryPolicy};
use super::config;
use super::directory::{ApiDirectory, ApiResourceInfo};
use super::event::{ResourceEvent, WatchKey};
use crate::error::Error;

/// Lifecycle of one watch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Listing,
    Watching,
    Reconnecting,
    /// The cluster does not expose the kind. Terminal.
    NotFound,
    /// Torn down or gave up. Terminal.
    Stopped,
}

impl SessionState {
    /// A terminal session will never deliver another event; a fresh
    /// subscribe on its key starts a brand-new session.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::NotFound | Self::Stopped)
    }
}

type EventCallback = dyn Fn(&ResourceEvent) + Send + Sync;

/// One registered callback. Cloned into a snapshot per delivery batch so
/// callbacks never run under the session lock.
#[derive(Clone)]
struct SubscriberSlot {
    id: Uuid,
    active: Arc<AtomicBool>,
    callback: Arc<EventCallback>,
}

fn deliver(slots: &[SubscriberSlot], event: &ResourceEvent) {
    for slot in slots {
        // skips subscribers detached earlier in this same batch
        if slot.active.load(Ordering::Acquire) {
            (slot.callback)(event);
        }
    }
}

struct SessionInner {
    state: SessionState,
    /// Upstream documents keyed by uid. A `BTreeMap` keeps replay order
    /// deterministic per call.
    cache: BTreeMap<String, Arc<DynamicObject>>,
    /// Last observed resourceVersion, used to resume the watch.
    cursor: Option<String>,
    /// Fan-out targets in registration order.
    subscribers: Vec<SubscriberSlot>,
    /// Set once on terminal failure; replayed to a subscriber whose attach
    /// raced the failure, so it still sees exactly one ERROR.
    terminal_error: Option<Arc<Error>>,
}

impl SessionInner {
    /// Apply one upstream record to cursor and cache, returning the event to
    /// fan out (bookmarks carry no payload and are swallowed here).
    fn apply(&mut self, event: WatchEvent<DynamicObject>) -> Option<ResourceEvent> {
        match event {
            WatchEvent::Added(obj) => {
                self.advance_cursor(&obj);
                let uid = obj.metadata.uid.clone();
                let obj = Arc::new(obj);
                if let Some(uid) = uid {
                    self.cache.insert(uid, obj.clone());
                }
                Some(ResourceEvent::Added(obj))
            }
            WatchEvent::Modified(obj) => {
                self.advance_cursor(&obj);
                let uid = obj.metadata.uid.clone();
                let obj = Arc::new(obj);
                if let Some(uid) = uid {
                    // an update for a uid we no longer hold is a stale echo
                    // of a deleted object; the cache stays as-is but the
                    // event still flows to subscribers verbatim
                    if let Some(slot) = self.cache.get_mut(&uid) {
                        *slot = obj.clone();
                    }
                }
                Some(ResourceEvent::Modified(obj))
            }
            WatchEvent::Deleted(obj) => {
                self.advance_cursor(&obj);
                if let Some(uid) = &obj.metadata.uid {
                    self.cache.remove(uid);
                }
                Some(ResourceEvent::Deleted(Arc::new(obj)))
            }
            WatchEvent::Bookmark(bookmark) => {
                self.cursor = Some(bookmark.metadata.resource_version);
                None
            }
            // status records are classified by the driver before apply
            WatchEvent::Error(_) => None,
        }
    }

    fn advance_cursor(&mut self, obj: &DynamicObject) {
        if let Some(version) = &obj.metadata.resource_version {
            self.cursor = Some(version.clone());
        }
    }
}

/// What ended one open watch stream.
enum StreamOutcome {
    /// Clean end (server-side timeout); resume from the cursor.
    Ended,
    /// Cursor too stale; a fresh list is required.
    Expired,
    /// Session cancelled.
    Cancelled,
    /// The resource type itself is gone.
    Gone(ErrorResponse),
    /// Transient stream failure.
    Failed(kube::Error),
}

/// One upstream list+watch session, shared by all subscribers of its key.
pub struct WatchSession {
    key: WatchKey,
    inner: Mutex<SessionInner>,
    /// Serializes delivery batches and attach replay; never nested inside
    /// `inner`.
    delivery: Mutex<()>,
    cancel: CancellationToken,
}

impl WatchSession {
    pub(crate) fn new(key: WatchKey) -> Arc<Self> {
        Arc::new(Self {
            key,
            inner: Mutex::new(SessionInner {
                state: SessionState::Initializing,
                cache: BTreeMap::new(),
                cursor: None,
                subscribers: Vec::new(),
                terminal_error: None,
            }),
            delivery: Mutex::new(()),
            cancel: CancellationToken::new(),
        })
    }

    #[must_use]
    pub fn key(&self) -> &WatchKey {
        &self.key
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lock_inner().state
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock_inner().subscribers.len()
    }

    #[must_use]
    pub fn cached_objects(&self) -> usize {
        self.lock_inner().cache.len()
    }

    /// Attach a callback: synchronous replay of the current cache as
    /// synthetic ADDED events, then live deltas. Never touches the network.
    ///
    /// Replay and registration happen under the delivery lock, so the replay
    /// exactly matches the cache snapshot and no concurrent live delta is
    /// duplicated or skipped. On a session that already failed terminally
    /// the stored ERROR is replayed instead.
    pub(crate) fn attach(&self, callback: Arc<EventCallback>) -> Uuid {
        let _ordered = self.lock_delivery();
        let (snapshot, terminal_error) = {
            let inner = self.lock_inner();
            (
                inner.cache.values().cloned().collect::<Vec<_>>(),
                inner.terminal_error.clone(),
            )
        };
        if let Some(err) = terminal_error {
            callback(&ResourceEvent::Error(err));
        } else {
            for obj in snapshot {
                callback(&ResourceEvent::Added(obj));
            }
        }
        let id = Uuid::new_v4();
        self.lock_inner().subscribers.push(SubscriberSlot {
            id,
            active: Arc::new(AtomicBool::new(true)),
            callback,
        });
        id
    }

    /// Remove a subscriber; true when it was the last one. The active flag
    /// flips before the slot is dropped, so a delivery batch already
    /// snapshotted skips it. Safe to call from inside a callback.
    pub(crate) fn detach(&self, id: Uuid) -> bool {
        let mut inner = self.lock_inner();
        inner.subscribers.retain(|slot| {
            if slot.id == id {
                slot.active.store(false, Ordering::Release);
                false
            } else {
                true
            }
        });
        inner.subscribers.is_empty()
    }

    /// Ask the driver to stop; in-flight list/watch calls are abandoned at
    /// the next loop boundary.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    fn lock_inner(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SessionState) {
        self.lock_inner().state = state;
    }

    /// Enter a terminal state, dropping cache and cursor so a later
    /// subscribe on this key starts a fresh list, never a resumed watch.
    fn stop(&self, state: SessionState) {
        let mut inner = self.lock_inner();
        inner.state = state;
        inner.cache.clear();
        inner.cursor = None;
    }

    /// Terminal failure: flip state, discard cache and cursor, deliver
    /// exactly one ERROR, and keep the error for attaches racing this call.
    fn fail(&self, state: SessionState, err: Error) {
        let _ordered = self.lock_delivery();
        let err = Arc::new(err);
        let slots = {
            let mut inner = self.lock_inner();
            inner.state = state;
            inner.cache.clear();
            inner.cursor = None;
            inner.terminal_error = Some(err.clone());
            inner.subscribers.clone()
        };
        deliver(&slots, &ResourceEvent::Error(err));
    }

    /// Deliver one event to the current subscriber set, in registration
    /// order, without holding the session lock.
    fn fan_out(&self, event: &ResourceEvent) {
        let _ordered = self.lock_delivery();
        let slots = self.lock_inner().subscribers.clone();
        deliver(&slots, event);
    }

    fn emit_error(&self, err: Error) {
        self.fan_out(&ResourceEvent::Error(Arc::new(err)));
    }

    /// Apply one upstream record and fan out the resulting event. Cache
    /// mutation and delivery stay atomic with respect to attach replay.
    fn ingest(&self, raw: WatchEvent<DynamicObject>) {
        let _ordered = self.lock_delivery();
        let (event, slots) = {
            let mut inner = self.lock_inner();
            (inner.apply(raw), inner.subscribers.clone())
        };
        if let Some(event) = event {
            deliver(&slots, &event);
        }
    }

    /// Sleep unless cancelled first; false means the session must stop.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            () = self.cancel.cancelled() => false,
            () = sleep(delay) => true,
        }
    }

    /// Drive the session until it is cancelled or fails terminally.
    pub(crate) async fn run(
        self: Arc<Self>,
        client: Client,
        directory: Arc<ApiDirectory>,
        policy: RetryPolicy,
    ) {
        let key = self.key.clone();
        let mut attempt: u32 = 0;

        // Resolve the kind first. A kind the cluster does not expose is a
        // schema fact: one ERROR, then terminal, never retried. Discovery
        // failures on the other hand are transient and go through backoff.
        let info = loop {
            let resolved = tokio::select! {
                () = self.cancel.cancelled() => {
                    self.stop(SessionState::Stopped);
                    return;
                }
                resolved = directory.resolve(key.kind()) => resolved,
            };
            match resolved {
                Ok(Some(info)) => break info,
                Ok(None) => {
                    warn!(%key, "resource kind not exposed by the cluster");
                    self.fail(SessionState::NotFound, Error::UnknownKind(key.kind().to_owned()));
                    return;
                }
                Err(err) => {
                    attempt += 1;
                    if policy.is_exhausted(attempt) {
                        error!(%key, attempt, "giving up, discovery keeps failing: {err}");
                        self.fail(
                            SessionState::Stopped,
                            Error::RetriesExhausted {
                                key: key.clone(),
                                attempts: attempt,
                            },
                        );
                        return;
                    }
                    debug!(%key, attempt, "discovery failed, will retry: {err}");
                    if !self.pause(policy.delay(attempt)).await {
                        self.stop(SessionState::Stopped);
                        return;
                    }
                }
            }
        };

        let api = api_for(&client, &info, key.namespace());
        info!(%key, collection = %info.api_version(), "watch session starting");

        'relist: loop {
            // LISTING: a full snapshot seeds (or fully replaces) the cache
            // and captures the resume cursor.
            self.set_state(SessionState::Listing);
            let params = ListParams::default();
            let list = tokio::select! {
                () = self.cancel.cancelled() => {
                    self.stop(SessionState::Stopped);
                    return;
                }
                list = api.list(&params) => list,
            };
            let list = match list {
                Ok(list) => list,
                Err(err) => match FailureKind::classify(&err) {
                    FailureKind::Terminal => {
                        warn!(%key, "resource collection gone while listing: {err}");
                        self.fail(
                            SessionState::NotFound,
                            Error::UnknownKind(key.kind().to_owned()),
                        );
                        return;
                    }
                    FailureKind::Expired | FailureKind::Transient => {
                        attempt += 1;
                        if policy.is_exhausted(attempt) {
                            error!(%key, attempt, "giving up, list keeps failing: {err}");
                            self.fail(
                                SessionState::Stopped,
                                Error::RetriesExhausted {
                                    key: key.clone(),
                                    attempts: attempt,
                                },
                            );
                            return;
                        }
                        debug!(%key, attempt, "list failed, will retry: {err}");
                        if !self.pause(policy.delay(attempt)).await {
                            self.stop(SessionState::Stopped);
                            return;
                        }
                        continue 'relist;
                    }
                },
            };

            {
                let mut inner = self.lock_inner();
                inner.cursor = list.metadata.resource_version.clone();
                inner.cache = list
                    .items
                    .into_iter()
                    .filter_map(|obj| {
                        let uid = obj.metadata.uid.clone()?;
                        Some((uid, Arc::new(obj)))
                    })
                    .collect();
                inner.state = SessionState::Watching;
                debug!(%key, objects = inner.cache.len(), "cache seeded from list");
            }

            // WATCHING: drain the long-lived stream, reopening from the
            // cursor on clean ends and relisting on failures.
            loop {
                let cursor = self
                    .lock_inner()
                    .cursor
                    .clone()
                    .unwrap_or_else(|| "0".to_owned());
                let params = WatchParams::default().timeout(config::WATCH_TIMEOUT_SECONDS);
                let stream = tokio::select! {
                    () = self.cancel.cancelled() => {
                        self.stop(SessionState::Stopped);
                        return;
                    }
                    stream = api.watch(&params, &cursor) => stream,
                };
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(err) => match FailureKind::classify(&err) {
                        FailureKind::Terminal => {
                            warn!(%key, "resource collection gone: {err}");
                            self.fail(
                                SessionState::NotFound,
                                Error::UnknownKind(key.kind().to_owned()),
                            );
                            return;
                        }
                        FailureKind::Expired => {
                            debug!(%key, "resume cursor too stale, forcing a fresh list");
                            continue 'relist;
                        }
                        FailureKind::Transient => {
                            if !self.note_transient_failure(&mut attempt, &policy, err).await {
                                return;
                            }
                            continue 'relist;
                        }
                    },
                };
                self.set_state(SessionState::Watching);
                pin_mut!(stream);
                let opened = Instant::now();

                let outcome = loop {
                    let item = tokio::select! {
                        () = self.cancel.cancelled() => break StreamOutcome::Cancelled,
                        item = stream.try_next() => item,
                    };
                    match item {
                        Ok(Some(WatchEvent::Error(response))) => {
                            match FailureKind::classify_response(&response) {
                                FailureKind::Terminal => break StreamOutcome::Gone(response),
                                FailureKind::Expired => break StreamOutcome::Expired,
                                FailureKind::Transient => {
                                    break StreamOutcome::Failed(kube::Error::Api(response));
                                }
                            }
                        }
                        Ok(Some(event)) => self.ingest(event),
                        Ok(None) => break StreamOutcome::Ended,
                        Err(err) => break StreamOutcome::Failed(err),
                    }
                };

                // Instant failures are not recoveries: the failure budget
                // resets only after a watch that stayed open for a while.
                if opened.elapsed() >= Duration::from_secs(config::MIN_STABLE_WATCH_SECONDS) {
                    attempt = 0;
                }

                match outcome {
                    StreamOutcome::Cancelled => {
                        self.stop(SessionState::Stopped);
                        return;
                    }
                    StreamOutcome::Gone(response) => {
                        warn!(%key, "resource collection gone: {}", response.message);
                        self.fail(
                            SessionState::NotFound,
                            Error::UnknownKind(key.kind().to_owned()),
                        );
                        return;
                    }
                    StreamOutcome::Expired => {
                        debug!(%key, "resume cursor too stale, forcing a fresh list");
                        continue 'relist;
                    }
                    StreamOutcome::Ended => {
                        self.set_state(SessionState::Reconnecting);
                        if !self
                            .pause(Duration::from_secs(config::RESTART_DELAY_SECONDS))
                            .await
                        {
                            self.stop(SessionState::Stopped);
                            return;
                        }
                        // reopen from the cursor without relisting
                    }
                    StreamOutcome::Failed(err) => {
                        if !self.note_transient_failure(&mut attempt, &policy, err).await {
                            return;
                        }
                        continue 'relist;
                    }
                }
            }
        }
    }

    /// Record one transient failure: surface it, then back off. False means
    /// the session gave up (or was cancelled) and the driver must return.
    async fn note_transient_failure(
        &self,
        attempt: &mut u32,
        policy: &RetryPolicy,
        err: kube::Error,
    ) -> bool {
        *attempt += 1;
        if policy.is_exhausted(*attempt) {
            error!(key = %self.key, attempt, "watch retries exhausted: {err}");
            self.fail(
                SessionState::Stopped,
                Error::RetriesExhausted {
                    key: self.key.clone(),
                    attempts: *attempt,
                },
            );
            return false;
        }
        warn!(key = %self.key, attempt, "watch stream failed, will retry: {err}");
        self.emit_error(Error::TransientWatch {
            key: self.key.clone(),
            source: err,
        });
        self.set_state(SessionState::Reconnecting);
        if !self.pause(policy.delay(*attempt)).await {
            self.stop(SessionState::Stopped);
            return false;
        }
        true
    }
}

fn api_for(client: &Client, info: &ApiResourceInfo, namespace: Option<&str>) -> Api<DynamicObject> {
    let resource = info.to_api_resource();
    match namespace {
        Some(ns) if info.namespaced => Api::namespaced_with(client.clone(), ns, &resource),
        _ => Api::all_with(client.clone(), &resource),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use serde_json::json;

    use super::*;

    fn object(name: &str, uid: &str, version: &str) -> DynamicObject {
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": name,
                "namespace": "default",
                "uid": uid,
                "resourceVersion": version,
            },
        }))
        .expect("valid object")
    }

    fn bookmark(version: &str) -> WatchEvent<DynamicObject> {
        serde_json::from_value(json!({
            "type": "BOOKMARK",
            "object": {
                "apiVersion": "v1",
                "kind": "Pod",
                "metadata": {"resourceVersion": version},
            },
        }))
        .expect("valid bookmark")
    }

    fn empty_inner() -> SessionInner {
        SessionInner {
            state: SessionState::Watching,
            cache: BTreeMap::new(),
            cursor: None,
            subscribers: Vec::new(),
            terminal_error: None,
        }
    }

    #[test]
    fn test_apply_upserts_and_advances_cursor() {
        let mut inner = empty_inner();

        let event = inner.apply(WatchEvent::Added(object("web-0", "u1", "5")));
        assert!(matches!(event, Some(ResourceEvent::Added(_))));
        assert_eq!(inner.cache.len(), 1);
        assert_eq!(inner.cursor.as_deref(), Some("5"));

        let event = inner.apply(WatchEvent::Modified(object("web-0", "u1", "6")));
        assert!(matches!(event, Some(ResourceEvent::Modified(_))));
        assert_eq!(inner.cache.len(), 1);
        assert_eq!(inner.cursor.as_deref(), Some("6"));
        let cached = inner.cache.get("u1").expect("cached");
        assert_eq!(cached.metadata.resource_version.as_deref(), Some("6"));
    }

    #[test]
    fn test_deleted_wins_over_stale_updates() {
        let mut inner = empty_inner();
        inner.apply(WatchEvent::Added(object("web-0", "u1", "5")));

        inner.apply(WatchEvent::Deleted(object("web-0", "u1", "7")));
        assert!(inner.cache.is_empty());

        // a stale MODIFIED after the delete must not resurrect the object,
        // but the event itself still reaches subscribers
        let event = inner.apply(WatchEvent::Modified(object("web-0", "u1", "8")));
        assert!(matches!(event, Some(ResourceEvent::Modified(_))));
        assert!(inner.cache.is_empty());
        assert_eq!(inner.cursor.as_deref(), Some("8"));

        // a genuine re-create recovers the entry
        inner.apply(WatchEvent::Added(object("web-0", "u1", "9")));
        assert_eq!(inner.cache.len(), 1);
    }

    #[test]
    fn test_bookmark_advances_cursor_without_event() {
        let mut inner = empty_inner();
        inner.apply(WatchEvent::Added(object("web-0", "u1", "5")));

        let event = inner.apply(bookmark("17"));
        assert!(event.is_none());
        assert_eq!(inner.cursor.as_deref(), Some("17"));
        assert_eq!(inner.cache.len(), 1);
    }

    #[test]
    fn test_replay_matches_cache_snapshot() {
        let session = WatchSession::new(WatchKey::new("pods", None));
        {
            let mut inner = session.lock_inner();
            for (name, uid) in [("web-0", "u1"), ("web-1", "u2"), ("web-2", "u3")] {
                inner.apply(WatchEvent::Added(object(name, uid, "5")));
            }
        }

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        let id = session.attach(Arc::new(move |event: &ResourceEvent| {
            if let ResourceEvent::Added(obj) = event {
                sink.lock().expect("no panic").push(
                    obj.metadata.uid.clone().expect("uid"),
                );
            }
        }));

        let replayed = seen.lock().expect("no panic").clone();
        assert_eq!(replayed, vec!["u1", "u2", "u3"]);
        assert_eq!(session.subscriber_count(), 1);

        assert!(session.detach(id));
        assert_eq!(session.subscriber_count(), 0);
    }

    #[test]
    fn test_fan_out_preserves_registration_order() {
        let session = WatchSession::new(WatchKey::new("pods", None));
        let order = Arc::new(StdMutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let sink = order.clone();
            session.attach(Arc::new(move |_: &ResourceEvent| {
                sink.lock().expect("no panic").push(tag);
            }));
        }

        session.ingest(WatchEvent::Added(object("web-0", "u1", "5")));

        assert_eq!(
            order.lock().expect("no panic").clone(),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn test_detach_from_inside_a_callback() {
        let session = WatchSession::new(WatchKey::new("pods", None));

        // the first subscriber detaches the second as soon as any event
        // arrives; this must neither deadlock nor deliver to the victim
        let victim_id = Arc::new(StdMutex::new(None::<Uuid>));
        let detacher_session = session.clone();
        let detacher_target = victim_id.clone();
        session.attach(Arc::new(move |_: &ResourceEvent| {
            if let Some(id) = detacher_target.lock().expect("no panic").take() {
                detacher_session.detach(id);
            }
        }));

        let seen = Arc::new(StdMutex::new(0usize));
        let counter = seen.clone();
        let id = session.attach(Arc::new(move |_: &ResourceEvent| {
            *counter.lock().expect("no panic") += 1;
        }));
        *victim_id.lock().expect("no panic") = Some(id);

        session.ingest(WatchEvent::Added(object("web-0", "u1", "5")));
        // detached mid-batch, before its slot in the snapshot was reached
        assert_eq!(*seen.lock().expect("no panic"), 0);
        assert_eq!(session.subscriber_count(), 1);

        session.ingest(WatchEvent::Added(object("web-1", "u2", "6")));
        assert_eq!(*seen.lock().expect("no panic"), 0);
    }

    #[test]
    fn test_attach_after_terminal_failure_replays_the_error() {
        let session = WatchSession::new(WatchKey::new("gadgets", None));
        session.fail(
            SessionState::NotFound,
            Error::UnknownKind("gadgets".to_owned()),
        );

        let errors = Arc::new(StdMutex::new(Vec::new()));
        let sink = errors.clone();
        session.attach(Arc::new(move |event: &ResourceEvent| {
            if let ResourceEvent::Error(err) = event {
                sink.lock().expect("no panic").push(err.to_string());
            }
        }));

        let errors = errors.lock().expect("no panic");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("gadgets"));
    }

    #[test]
    fn test_stop_discards_cache_and_cursor() {
        let session = WatchSession::new(WatchKey::new("pods", None));
        {
            let mut inner = session.lock_inner();
            inner.apply(WatchEvent::Added(object("web-0", "u1", "5")));
        }
        assert_eq!(session.cached_objects(), 1);

        session.stop(SessionState::Stopped);
        assert_eq!(session.cached_objects(), 0);
        assert!(session.lock_inner().cursor.is_none());
        assert!(session.state().is_terminal());
    }
}
