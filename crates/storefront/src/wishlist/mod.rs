//! Wishlist store with optimistic membership updates.
//!
//! The store keeps two views of the signed-in user's wishlist:
//!
//! - the entity list, held in the shared [`MutationCache`] under
//!   [`WISHLIST_KEY`] so any subscriber (counters, like buttons) sees it,
//! - a membership set of product ids for constant-time lookups.
//!
//! At rest the membership set equals the ids of the entity list. While a
//! mutation is in flight the two may differ: membership reflects every
//! pending mutation's target, the list reflects whatever the last write was.
//!
//! # Mutations
//!
//! [`WishlistStore::toggle`] and [`WishlistStore::remove_item`] apply their
//! local edit before returning, then hand back a future that talks to the
//! backend. On failure the edit recorded for that request is undone and the
//! list is refetched; the error is logged and reported to observers, never
//! returned.

mod observer;
mod pending;

pub use observer::{SentryObserver, WishlistEvent, WishlistObserver, add_breadcrumb};
pub use pending::MutationKind;

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::Utc;
use dawa_core::{Product, ProductId, normalize_product};
use secrecy::SecretString;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::cache::{MutationCache, Snapshot};
use crate::config::WishlistConfig;
use crate::session::IdentityProvider;

use pending::PendingMutation;

/// Cache key holding the wishlist entity list.
pub const WISHLIST_KEY: &str = "getuserwishlist";

/// Backend operations the wishlist store depends on.
pub trait WishlistBackend: Send + Sync + 'static {
    /// Fetch the user's wishlist, normalized.
    fn fetch_wishlist(
        &self,
        token: &SecretString,
    ) -> impl Future<Output = Result<Vec<Product>, ApiError>> + Send;

    /// Flip membership of `item_id` on the backend.
    fn toggle_item(
        &self,
        token: &SecretString,
        item_id: &ProductId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Optimistic wishlist store.
///
/// Cheap to clone; clones share state.
pub struct WishlistStore<B> {
    inner: Arc<StoreInner<B>>,
}

impl<B> Clone for WishlistStore<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct StoreInner<B> {
    backend: B,
    identity: Arc<dyn IdentityProvider>,
    cache: MutationCache<Vec<Product>>,
    config: WishlistConfig,
    observers: RwLock<Vec<Arc<dyn WishlistObserver>>>,
    state: Mutex<WishlistState>,
}

#[derive(Default)]
struct WishlistState {
    membership: HashSet<ProductId>,
    /// Ordered by request id, so later mutations override earlier ones.
    pending: BTreeMap<u64, PendingMutation>,
    next_request_id: u64,
    /// Bumped by `reset`; completions from an older generation are ignored.
    generation: u64,
    /// The list holds the result of an applied fetch, plus confirmed
    /// mutations on top of it. False until the first fetch lands and again
    /// whenever a fetch result is discarded in favor of a local write.
    synced: bool,
    fetches_in_flight: usize,
    next_fetch_id: u64,
    /// Newest fetch whose result the cache applied.
    last_applied_fetch: u64,
}

/// A mutation whose local edit is applied and whose request is not yet sent.
struct Begun {
    request_id: u64,
    generation: u64,
    product_id: ProductId,
    token: SecretString,
}

impl<B: WishlistBackend> WishlistStore<B> {
    /// Create a store over `backend`, publishing the entity list into `cache`.
    pub fn new(
        backend: B,
        identity: Arc<dyn IdentityProvider>,
        cache: MutationCache<Vec<Product>>,
        config: WishlistConfig,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                backend,
                identity,
                cache,
                config,
                observers: RwLock::new(Vec::new()),
                state: Mutex::new(WishlistState::default()),
            }),
        }
    }

    /// Register an observer for every subsequent event.
    pub fn add_observer(&self, observer: Arc<dyn WishlistObserver>) {
        self.inner
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    fn state(&self) -> MutexGuard<'_, WishlistState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: &WishlistEvent) {
        let observers = self
            .inner
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            observer.on_event(event);
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[must_use]
    pub fn is_in_wishlist(&self, product_id: &ProductId) -> bool {
        self.state().membership.contains(product_id)
    }

    /// Current entity list, newest first.
    #[must_use]
    pub fn items(&self) -> Vec<Product> {
        self.inner.cache.data(WISHLIST_KEY).unwrap_or_default()
    }

    /// Number of products currently considered in the wishlist.
    #[must_use]
    pub fn count(&self) -> usize {
        self.state().membership.len()
    }

    #[must_use]
    pub fn membership(&self) -> HashSet<ProductId> {
        self.state().membership.clone()
    }

    /// Returns true while any mutation awaits the backend.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.state().pending.is_empty()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.cache.is_loading(WISHLIST_KEY)
    }

    /// Subscribe to changes of the entity list.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<Vec<Product>>> {
        self.inner.cache.subscribe(WISHLIST_KEY)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Flip membership of `product_id`.
    ///
    /// The local edit is visible as soon as this returns. `product_data`, a
    /// raw item payload, fills the optimistic entry when adding; without it a
    /// placeholder is inserted until the next fetch. Await (or spawn) the
    /// returned future to send the request and settle the outcome.
    ///
    /// Without a signed-in user this does nothing and sends nothing.
    pub fn toggle(
        &self,
        product_id: ProductId,
        product_data: Option<&Value>,
    ) -> impl Future<Output = ()> + Send + use<B> {
        let begun = self.begin(product_id, MutationKind::Toggle, product_data);
        self.settle_later(begun)
    }

    /// Remove `product_id` if it is a member; otherwise do nothing.
    pub fn remove_item(&self, product_id: ProductId) -> impl Future<Output = ()> + Send + use<B> {
        let begun = self.begin(product_id, MutationKind::Remove, None);
        self.settle_later(begun)
    }

    /// Refetch the wishlist and rebuild membership from it.
    ///
    /// Does nothing without a signed-in user.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; local state is left as it was.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let Some(identity) = self.inner.identity.current_user() else {
            debug!("No signed-in user; skipping wishlist refresh");
            return Ok(());
        };
        self.revalidate_with(identity.token).await
    }

    /// Drop all wishlist state, e.g. on sign-out.
    ///
    /// Mutations and fetches still in flight complete against the backend
    /// but no longer touch local state.
    pub fn reset(&self) {
        {
            let mut state = self.state();
            *state = WishlistState {
                generation: state.generation + 1,
                next_request_id: state.next_request_id,
                next_fetch_id: state.next_fetch_id,
                ..WishlistState::default()
            };
        }
        self.inner.cache.invalidate(WISHLIST_KEY);
        debug!("Wishlist state reset");
    }

    /// Apply the optimistic edit and record it as pending.
    fn begin(
        &self,
        product_id: ProductId,
        kind: MutationKind,
        product_data: Option<&Value>,
    ) -> Option<Begun> {
        let Some(identity) = self.inner.identity.current_user() else {
            debug!(product_id = %product_id, "No signed-in user; ignoring wishlist mutation");
            return None;
        };

        let mut state = self.state();
        let was_present = state.membership.contains(&product_id);
        if kind == MutationKind::Remove && !was_present {
            debug!(product_id = %product_id, "Not in wishlist; nothing to remove");
            return None;
        }

        let mut pending = PendingMutation {
            product_id: product_id.clone(),
            kind,
            was_present,
            removed: None,
            inserted: None,
        };

        if was_present {
            state.membership.remove(&product_id);
            let mut removed = None;
            self.inner.cache.update(WISHLIST_KEY, |current| {
                let mut items = current.cloned().unwrap_or_default();
                if let Some(index) = items.iter().position(|item| item.id == product_id) {
                    removed = Some((index, items.remove(index)));
                }
                items
            });
            pending.removed = removed;
        } else {
            state.membership.insert(product_id.clone());
            let entity = optimistic_entity(&product_id, product_data);
            self.inner.cache.update(WISHLIST_KEY, |current| {
                let mut items = current.cloned().unwrap_or_default();
                items.retain(|item| item.id != product_id);
                items.insert(0, entity.clone());
                items
            });
            pending.inserted = Some(entity);
        }

        state.next_request_id += 1;
        let request_id = state.next_request_id;
        let generation = state.generation;
        state.pending.insert(request_id, pending);
        drop(state);

        self.notify(&WishlistEvent::Toggled {
            product_id: product_id.clone(),
            present: !was_present,
        });

        Some(Begun {
            request_id,
            generation,
            product_id,
            token: identity.token,
        })
    }

    fn settle_later(&self, begun: Option<Begun>) -> impl Future<Output = ()> + Send + use<B> {
        let store = self.clone();
        async move {
            if let Some(begun) = begun {
                store.complete(begun).await;
            }
        }
    }

    async fn complete(&self, begun: Begun) {
        let result = self
            .inner
            .backend
            .toggle_item(&begun.token, &begun.product_id)
            .await;

        match result {
            Ok(()) => {
                let Some(pending) = self.finish(begun.request_id, begun.generation) else {
                    return;
                };
                self.notify(&WishlistEvent::Committed {
                    product_id: begun.product_id,
                });
                if self.inner.config.revalidate_on_success {
                    self.revalidate_quietly(begun.token).await;
                } else {
                    self.commit_locally(&pending);
                    if self.needs_sync(begun.generation) {
                        self.revalidate_quietly(begun.token).await;
                    }
                }
            }
            Err(error) => {
                let Some(pending) = self.rollback(begun.request_id, begun.generation) else {
                    return;
                };
                warn!(
                    product_id = %pending.product_id,
                    kind = ?pending.kind,
                    error = %error,
                    "Wishlist mutation failed; rolled back"
                );
                self.notify(&WishlistEvent::RolledBack {
                    product_id: begun.product_id,
                    error: error.to_string(),
                });
                self.revalidate_quietly(begun.token).await;
            }
        }
    }

    /// Take the pending record for a confirmed request.
    fn finish(&self, request_id: u64, generation: u64) -> Option<PendingMutation> {
        let mut state = self.state();
        if state.generation != generation {
            return None;
        }
        state.pending.remove(&request_id)
    }

    /// Undo the edit recorded for a rejected request.
    fn rollback(&self, request_id: u64, generation: u64) -> Option<PendingMutation> {
        let mut state = self.state();
        if state.generation != generation {
            return None;
        }
        let pending = state.pending.remove(&request_id)?;

        if pending.was_present {
            state.membership.insert(pending.product_id.clone());
        } else {
            state.membership.remove(&pending.product_id);
        }
        self.inner.cache.update(WISHLIST_KEY, |current| {
            let mut items = current.cloned().unwrap_or_default();
            pending.restore(&mut items);
            items
        });

        Some(pending)
    }

    /// Settle a confirmed mutation without refetching.
    ///
    /// Skipped when a later mutation of the same product is still pending;
    /// that one decides the final state.
    fn commit_locally(&self, pending: &PendingMutation) {
        let mut state = self.state();
        if state
            .pending
            .values()
            .any(|other| other.product_id == pending.product_id)
        {
            return;
        }

        if pending.target() {
            state.membership.insert(pending.product_id.clone());
        } else {
            state.membership.remove(&pending.product_id);
        }
        self.inner.cache.update(WISHLIST_KEY, |current| {
            let mut items = current.cloned().unwrap_or_default();
            pending.apply_target(&mut items);
            items
        });
    }

    /// True when nothing is pending or loading and the list has not been
    /// brought in line with the backend.
    fn needs_sync(&self, generation: u64) -> bool {
        let state = self.state();
        state.generation == generation
            && !state.synced
            && state.pending.is_empty()
            && state.fetches_in_flight == 0
    }

    /// Revalidate after a mutation settled.
    async fn revalidate_quietly(&self, token: SecretString) {
        if let Err(error) = self.revalidate_with(token).await {
            // Already logged and reported to observers.
            debug!(error = %error, "Post-mutation revalidation failed");
        }
    }

    /// Fetch the list until a result sticks.
    ///
    /// A fetch whose result is discarded because a local write landed
    /// meanwhile is repeated once nothing else is pending or loading, so the
    /// list never stays detached from the backend.
    async fn revalidate_with(&self, token: SecretString) -> Result<(), ApiError> {
        loop {
            let (generation, fetch_id) = self.start_fetch();
            let inner = Arc::clone(&self.inner);
            let fetch_token = token.clone();
            let fetch = async move { inner.backend.fetch_wishlist(&fetch_token).await };

            let (result, applied) = self
                .inner
                .cache
                .revalidate_tracked(WISHLIST_KEY, fetch)
                .await;
            let refetch = self.finish_fetch(generation, fetch_id, applied && result.is_ok());

            match result {
                Ok(items) => {
                    debug!(count = items.len(), applied, "Wishlist revalidated");
                    self.notify(&WishlistEvent::Revalidated { count: items.len() });
                }
                Err(error) => {
                    warn!(error = %error, "Wishlist revalidation failed");
                    self.notify(&WishlistEvent::RevalidateFailed {
                        error: error.to_string(),
                    });
                    return Err(error);
                }
            }

            if !refetch {
                return Ok(());
            }
            debug!("Wishlist fetch was superseded by a local write; fetching again");
        }
    }

    fn start_fetch(&self) -> (u64, u64) {
        let mut state = self.state();
        state.next_fetch_id += 1;
        state.fetches_in_flight += 1;
        (state.generation, state.next_fetch_id)
    }

    /// Record the outcome of a fetch and reconcile membership.
    ///
    /// Returns true when the list needs another fetch.
    fn finish_fetch(&self, generation: u64, fetch_id: u64, applied: bool) -> bool {
        let mut state = self.state();
        if state.generation != generation {
            return false;
        }

        state.fetches_in_flight = state.fetches_in_flight.saturating_sub(1);
        if applied {
            state.synced = true;
            state.last_applied_fetch = state.last_applied_fetch.max(fetch_id);
        } else if fetch_id > state.last_applied_fetch {
            state.synced = false;
        }

        self.reconcile_membership(&mut state);

        !state.synced && state.pending.is_empty() && state.fetches_in_flight == 0
    }

    /// Rebuild membership from the cached list, then re-apply the targets of
    /// mutations still in flight.
    fn reconcile_membership(&self, state: &mut WishlistState) {
        let mut membership: HashSet<ProductId> = self
            .inner
            .cache
            .data(WISHLIST_KEY)
            .unwrap_or_default()
            .into_iter()
            .map(|item| item.id)
            .collect();

        for pending in state.pending.values() {
            if pending.target() {
                membership.insert(pending.product_id.clone());
            } else {
                membership.remove(&pending.product_id);
            }
        }

        state.membership = membership;
    }
}

/// Entity shown for an optimistic insert.
fn optimistic_entity(product_id: &ProductId, product_data: Option<&Value>) -> Product {
    let placeholder = Product::placeholder(product_id.clone(), Utc::now());
    let Some(data) = product_data else {
        return placeholder;
    };

    let mut entity = normalize_product(data);
    entity.id = product_id.clone();
    if entity.date_added.is_empty() {
        entity.date_added = placeholder.date_added;
    }
    entity
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use dawa_core::UserId;
    use serde_json::json;
    use tokio::sync::oneshot;

    use super::*;
    use crate::config::CacheConfig;
    use crate::session::{Identity, SessionGate};

    #[derive(Default)]
    struct FakeBackend {
        server: Mutex<Vec<Product>>,
        fail_toggles: AtomicBool,
        toggle_calls: AtomicUsize,
        fetch_calls: AtomicUsize,
        /// Each fetch waits for the next gate, if any, before reading `server`.
        fetch_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
        /// Each toggle waits for the next gate, if any; `false` fails it.
        toggle_gates: Mutex<VecDeque<oneshot::Receiver<bool>>>,
    }

    impl FakeBackend {
        fn with_items(ids: &[&str]) -> Self {
            let backend = Self::default();
            *backend.server.lock().unwrap() = ids
                .iter()
                .map(|id| Product {
                    id: ProductId::from(*id),
                    name: format!("server {id}"),
                    ..Product::default()
                })
                .collect();
            backend
        }

        fn gate_fetch(&self) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            self.fetch_gates.lock().unwrap().push_back(rx);
            tx
        }

        fn gate_toggle(&self) -> oneshot::Sender<bool> {
            let (tx, rx) = oneshot::channel();
            self.toggle_gates.lock().unwrap().push_back(rx);
            tx
        }

        fn server_ids(&self) -> HashSet<ProductId> {
            self.server.lock().unwrap().iter().map(|item| item.id.clone()).collect()
        }

        fn toggles(&self) -> usize {
            self.toggle_calls.load(Ordering::SeqCst)
        }

        fn fetches(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }
    }

    impl WishlistBackend for FakeBackend {
        async fn fetch_wishlist(&self, _token: &SecretString) -> Result<Vec<Product>, ApiError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.fetch_gates.lock().unwrap().pop_front();
            if let Some(gate) = gate {
                gate.await.unwrap();
            }
            Ok(self.server.lock().unwrap().clone())
        }

        async fn toggle_item(
            &self,
            _token: &SecretString,
            item_id: &ProductId,
        ) -> Result<(), ApiError> {
            self.toggle_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.toggle_gates.lock().unwrap().pop_front();
            let succeed = match gate {
                Some(gate) => gate.await.unwrap(),
                None => !self.fail_toggles.load(Ordering::SeqCst),
            };
            if !succeed {
                return Err(ApiError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            let mut server = self.server.lock().unwrap();
            if let Some(index) = server.iter().position(|item| &item.id == item_id) {
                server.remove(index);
            } else {
                server.insert(0, Product::placeholder(item_id.clone(), Utc::now()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<WishlistEvent>>,
    }

    impl WishlistObserver for RecordingObserver {
        fn on_event(&self, event: &WishlistEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn store_with(
        backend: FakeBackend,
        config: WishlistConfig,
    ) -> (WishlistStore<FakeBackend>, SessionGate) {
        let session = SessionGate::new();
        session.sign_in(Identity::new(UserId::new(1), "token"));
        let store = WishlistStore::new(
            backend,
            Arc::new(session.clone()),
            MutationCache::new(&CacheConfig::default()),
            config,
        );
        (store, session)
    }

    fn assert_consistent(store: &WishlistStore<FakeBackend>) {
        assert!(!store.has_pending());
        let ids: HashSet<ProductId> = store.items().into_iter().map(|item| item.id).collect();
        assert_eq!(store.membership(), ids);
    }

    fn no_revalidation() -> WishlistConfig {
        WishlistConfig {
            revalidate_on_success: false,
        }
    }

    fn id(raw: &str) -> ProductId {
        ProductId::from(raw)
    }

    #[tokio::test]
    async fn test_refresh_populates_membership() {
        let (store, _session) =
            store_with(FakeBackend::with_items(&["1", "2"]), WishlistConfig::default());

        store.refresh().await.unwrap();

        assert!(store.is_in_wishlist(&id("1")));
        assert!(store.is_in_wishlist(&id("2")));
        assert_eq!(store.count(), 2);
        assert_consistent(&store);
    }

    #[tokio::test]
    async fn test_toggle_is_visible_before_awaiting() {
        let (store, _session) = store_with(FakeBackend::default(), WishlistConfig::default());

        let settle = store.toggle(id("42"), Some(&json!({"id": 42, "item_name": "Lamp"})));

        assert!(store.is_in_wishlist(&id("42")));
        let items = store.items();
        assert_eq!(items.first().map(|item| item.name.as_str()), Some("Lamp"));
        assert_eq!(store.backend().toggles(), 0);

        settle.await;

        assert!(store.is_in_wishlist(&id("42")));
        assert_eq!(store.backend().toggles(), 1);
        assert_consistent(&store);
    }

    #[tokio::test]
    async fn test_toggle_without_data_inserts_placeholder() {
        let (store, _session) = store_with(FakeBackend::default(), WishlistConfig::default());

        let _settle = store.toggle(id("9"), None);

        let items = store.items();
        let first = items.first().unwrap();
        assert_eq!(first.id, id("9"));
        assert!(first.name.is_empty());
        assert!(!first.date_added.is_empty());
    }

    #[tokio::test]
    async fn test_failed_toggle_rolls_back_and_revalidates() {
        let (store, _session) =
            store_with(FakeBackend::with_items(&["1"]), WishlistConfig::default());
        let observer = Arc::new(RecordingObserver::default());
        store.add_observer(observer.clone());
        store.refresh().await.unwrap();
        store.backend().fail_toggles.store(true, Ordering::SeqCst);

        let settle = store.toggle(id("1"), None);
        assert!(!store.is_in_wishlist(&id("1")));
        assert!(store.items().is_empty());

        settle.await;

        assert!(store.is_in_wishlist(&id("1")));
        assert_eq!(store.items().first().map(|item| item.id.clone()), Some(id("1")));
        assert_eq!(store.backend().fetches(), 2);
        assert_consistent(&store);

        let events = observer.events.lock().unwrap();
        assert!(events.iter().any(|event| matches!(
            event,
            WishlistEvent::RolledBack { product_id, .. } if *product_id == id("1")
        )));
    }

    #[tokio::test]
    async fn test_double_toggle_nets_out() {
        let (store, _session) = store_with(FakeBackend::default(), WishlistConfig::default());

        let first = store.toggle(id("42"), None);
        assert!(store.is_in_wishlist(&id("42")));
        let second = store.toggle(id("42"), None);
        assert!(!store.is_in_wishlist(&id("42")));

        tokio::join!(first, second);

        assert!(!store.is_in_wishlist(&id("42")));
        assert!(store.items().iter().all(|item| item.id != id("42")));
        assert_eq!(store.backend().toggles(), 2);
        assert_consistent(&store);
    }

    #[tokio::test]
    async fn test_toggle_without_identity_is_noop() {
        let (store, session) =
            store_with(FakeBackend::with_items(&["5"]), WishlistConfig::default());
        store.refresh().await.unwrap();
        session.sign_out();
        let before = store.items();

        store.toggle(id("7"), None).await;

        assert!(!store.is_in_wishlist(&id("7")));
        assert_eq!(store.items(), before);
        assert_eq!(store.backend().toggles(), 0);
        assert_eq!(store.backend().fetches(), 1);
    }

    #[tokio::test]
    async fn test_remove_item_requires_membership() {
        let (store, _session) =
            store_with(FakeBackend::with_items(&["3"]), WishlistConfig::default());
        store.refresh().await.unwrap();

        store.remove_item(id("99")).await;
        assert_eq!(store.backend().toggles(), 0);

        let settle = store.remove_item(id("3"));
        assert!(!store.is_in_wishlist(&id("3")));
        settle.await;

        assert!(!store.is_in_wishlist(&id("3")));
        assert_eq!(store.backend().toggles(), 1);
        assert_consistent(&store);
    }

    #[tokio::test]
    async fn test_success_without_revalidation_keeps_optimistic_state() {
        let (store, _session) = store_with(FakeBackend::with_items(&["1"]), no_revalidation());
        store.refresh().await.unwrap();

        store.toggle(id("8"), None).await;

        assert!(store.is_in_wishlist(&id("8")));
        assert!(store.is_in_wishlist(&id("1")));
        assert_eq!(store.backend().fetches(), 1);
        assert_consistent(&store);
    }

    #[tokio::test]
    async fn test_success_without_revalidation_loads_unfetched_list() {
        let (store, _session) = store_with(FakeBackend::with_items(&["1"]), no_revalidation());

        store.toggle(id("8"), None).await;

        assert_eq!(store.membership(), store.backend().server_ids());
        assert!(store.is_in_wishlist(&id("1")));
        assert_eq!(store.backend().fetches(), 1);
        assert_consistent(&store);
    }

    #[tokio::test]
    async fn test_toggle_during_initial_load_keeps_server_items() {
        let (store, _session) =
            store_with(FakeBackend::with_items(&["1", "2"]), WishlistConfig::default());
        let release = store.backend().gate_fetch();

        let (refreshed, ()) = tokio::join!(store.refresh(), async {
            store.toggle(id("9"), None).await;
            release.send(()).unwrap();
        });

        refreshed.unwrap();
        assert_eq!(store.membership(), store.backend().server_ids());
        assert_eq!(store.count(), 3);
        assert_eq!(store.backend().fetches(), 2);
        assert_consistent(&store);
    }

    #[tokio::test]
    async fn test_toggle_during_initial_load_without_revalidation_refetches() {
        let (store, _session) =
            store_with(FakeBackend::with_items(&["1", "2"]), no_revalidation());
        let release = store.backend().gate_fetch();

        let (refreshed, ()) = tokio::join!(store.refresh(), async {
            store.toggle(id("9"), None).await;
            release.send(()).unwrap();
        });

        refreshed.unwrap();
        // The first load was discarded for the optimistic write, so it is repeated.
        assert!(store.is_in_wishlist(&id("1")));
        assert!(store.is_in_wishlist(&id("2")));
        assert!(store.is_in_wishlist(&id("9")));
        assert_eq!(store.items().len(), 3);
        assert_eq!(store.backend().fetches(), 2);
        assert_consistent(&store);
    }

    #[tokio::test]
    async fn test_failed_toggle_keeps_later_pending_target() {
        let (store, _session) = store_with(FakeBackend::default(), WishlistConfig::default());
        let first_gate = store.backend().gate_toggle();
        let second_gate = store.backend().gate_toggle();

        let first = store.toggle(id("7"), None);
        let second = store.toggle(id("7"), None);
        assert!(!store.is_in_wishlist(&id("7")));
        let (first_done_tx, first_done_rx) = oneshot::channel();

        tokio::join!(
            async move {
                first.await;
                first_done_tx.send(()).unwrap();
            },
            second,
            async {
                first_gate.send(false).unwrap();
                first_done_rx.await.unwrap();

                // The rollback and its refetch must not undo the second toggle.
                assert!(!store.is_in_wishlist(&id("7")));
                assert!(store.items().iter().all(|item| item.id != id("7")));
                assert!(store.has_pending());

                second_gate.send(true).unwrap();
            },
        );

        // The failed request changed nothing; the second one flipped 7 in.
        assert_eq!(store.backend().toggles(), 2);
        assert_eq!(store.membership(), store.backend().server_ids());
        assert!(store.is_in_wishlist(&id("7")));
        assert_consistent(&store);
    }

    #[tokio::test]
    async fn test_confirmed_toggle_defers_to_later_pending_toggle() {
        let (store, _session) = store_with(FakeBackend::default(), no_revalidation());
        store.refresh().await.unwrap();
        let first_gate = store.backend().gate_toggle();
        let second_gate = store.backend().gate_toggle();

        let first = store.toggle(id("8"), None);
        let second = store.toggle(id("8"), None);
        let (first_done_tx, first_done_rx) = oneshot::channel();

        tokio::join!(
            async move {
                first.await;
                first_done_tx.send(()).unwrap();
            },
            second,
            async {
                first_gate.send(true).unwrap();
                first_done_rx.await.unwrap();

                // The confirmed add must not resurrect 8 while its removal is pending.
                assert!(!store.is_in_wishlist(&id("8")));
                assert!(store.items().is_empty());
                assert!(store.has_pending());

                second_gate.send(true).unwrap();
            },
        );

        assert!(!store.is_in_wishlist(&id("8")));
        assert_eq!(store.backend().toggles(), 2);
        assert_eq!(store.backend().fetches(), 1);
        assert_consistent(&store);
    }

    #[tokio::test]
    async fn test_reset_ignores_in_flight_completion() {
        let (store, _session) = store_with(FakeBackend::default(), WishlistConfig::default());

        let settle = store.toggle(id("4"), None);
        store.reset();
        settle.await;

        assert!(!store.is_in_wishlist(&id("4")));
        assert!(store.items().is_empty());
        assert_eq!(store.backend().toggles(), 1);
        assert_eq!(store.backend().fetches(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_see_optimistic_insert() {
        let (store, _session) = store_with(FakeBackend::default(), WishlistConfig::default());
        let mut rx = store.subscribe();

        let _settle = store.toggle(id("11"), None);

        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.data.map(|items| items.len()), Some(1));
    }
}
