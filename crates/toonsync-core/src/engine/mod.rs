// ── Sync engine ──
//
// Orchestrates the listing view: list and search requests go through the
// gateway, results are merged into the per-owner cache, confirmed mutations
// are applied locally, and superseded requests are cancelled. Consumers
// observe a `watch` snapshot of `ListingState`.

mod mutations;
mod state;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use toonsync_api::{ApiClient, AuthState, ListQuery, Page, Webtoon};

use crate::config::SyncConfig;
use crate::debounce::Debouncer;
use crate::error::{CoreError, SESSION_EXPIRED_MESSAGE};
use crate::model::OwnerId;
use crate::notify::{Notification, NotificationBus, NotificationKind};
use crate::store::{CachePatch, ResourceCache, merge_lists};

pub use state::{ListingState, LoadOutcome, LoadRequest};

const LOAD_FAILED_MESSAGE: &str = "Unable to fetch webtoons from the server.";
const ACCESS_DENIED_MESSAGE: &str = "Access denied for webtoon management.";
const SESSION_EXPIRED_TITLE: &str = "Session expired";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── In-flight bookkeeping ───────────────────────────────────────────

#[derive(Clone)]
struct ActiveQuery {
    id: u64,
    token: CancellationToken,
    background: bool,
    /// Search term the query was issued with.
    term: String,
}

/// At most one page load and one "load more" are tracked at a time.
#[derive(Default)]
struct QuerySlots {
    next_id: u64,
    page: Option<ActiveQuery>,
    more: Option<ActiveQuery>,
}

impl QuerySlots {
    fn loading(&self) -> bool {
        self.page.as_ref().is_some_and(|q| !q.background)
    }

    fn loading_more(&self) -> bool {
        self.more.as_ref().is_some_and(|q| !q.background)
    }
}

// ── SyncEngine ──────────────────────────────────────────────────────

/// Listing orchestrator. Cheaply cloneable via `Arc<EngineInner>`.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    api: ApiClient,
    cache: Arc<ResourceCache<Webtoon>>,
    bus: NotificationBus,
    config: SyncConfig,
    state: watch::Sender<ListingState>,
    queries: Mutex<QuerySlots>,
    search: Debouncer<String>,
    search_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    cancel: CancellationToken,
    /// Child of `cancel`, replaced whenever the owner changes.
    owner_cancel: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncEngine {
    /// Create an engine. Does not spawn anything; call
    /// [`start()`](Self::start) for debounced search and session tracking.
    pub fn new(
        api: ApiClient,
        cache: Arc<ResourceCache<Webtoon>>,
        bus: NotificationBus,
        config: SyncConfig,
    ) -> Self {
        let (state, _) = watch::channel(ListingState::default());
        let (search, search_rx) = Debouncer::new(config.search_debounce);
        let cancel = CancellationToken::new();
        let owner_cancel = cancel.child_token();

        Self {
            inner: Arc::new(EngineInner {
                api,
                cache,
                bus,
                config,
                state,
                queries: Mutex::new(QuerySlots::default()),
                search,
                search_rx: Mutex::new(Some(search_rx)),
                cancel,
                owner_cancel: Mutex::new(owner_cancel),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub fn cache(&self) -> &Arc<ResourceCache<Webtoon>> {
        &self.inner.cache
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.inner.bus
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    // ── Observation ──────────────────────────────────────────────

    pub fn subscribe(&self) -> watch::Receiver<ListingState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> ListingState {
        self.inner.state.borrow().clone()
    }

    /// Owner the listing currently belongs to.
    pub fn current_owner(&self) -> Option<OwnerId> {
        self.inner.state.borrow().owner
    }

    /// Owner allowed to list: authenticated and holding the management
    /// feature.
    fn authorized_owner(&self) -> Option<OwnerId> {
        let session = self.inner.api.session();
        if !session.is_authenticated() || !session.has_feature(&self.inner.config.management_feature)
        {
            return None;
        }
        session.owner_id()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the debounced-search and session-watch tasks. Idempotent.
    pub fn start(&self) {
        let Some(search_rx) = lock(&self.inner.search_rx).take() else {
            return;
        };
        let cancel = self.inner.cancel.clone();
        let auth = self.inner.api.session().subscribe();

        let mut handles = lock(&self.inner.task_handles);
        handles.push(tokio::spawn(search_task(
            self.clone(),
            search_rx,
            cancel.clone(),
        )));
        handles.push(tokio::spawn(session_watch_task(self.clone(), auth, cancel)));
        debug!("sync engine started");
    }

    /// Cancel every in-flight request and background task, then wait for
    /// the tasks to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.search.cancel();

        let handles: Vec<JoinHandle<()>> = lock(&self.inner.task_handles).drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        debug!("sync engine stopped");
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut handles = lock(&self.inner.task_handles);
        handles.retain(|h| !h.is_finished());
        handles.push(tokio::spawn(task));
    }

    /// Run `req` in the background; failures are already reported through
    /// the listing state and the bus.
    fn spawn_load(&self, req: LoadRequest) {
        let engine = self.clone();
        self.spawn(async move {
            if let Err(e) = engine.load(req).await {
                debug!(error = %e, page = req.page, "background load failed");
            }
        });
    }

    fn owner_token(&self) -> CancellationToken {
        lock(&self.inner.owner_cancel).clone()
    }

    // ── Owner tracking ───────────────────────────────────────────

    /// Align the listing with the session's authorized owner.
    ///
    /// On change, cancels all in-flight work, invalidates the previous
    /// owner's cache entry (every entry when signed out) and resets the
    /// listing. Returns whether the owner changed.
    pub fn sync_owner(&self) -> bool {
        let owner = self.authorized_owner();

        let mut previous = None;
        self.inner.state.send_if_modified(|s| {
            if s.owner == owner {
                return false;
            }
            previous = Some(s.owner);
            s.reset_for(owner);
            if owner.is_some() {
                s.error = None;
                s.auth_required = false;
            }
            true
        });
        let Some(previous) = previous else {
            return false;
        };

        info!(?previous, ?owner, "listing owner changed");
        {
            let mut token = lock(&self.inner.owner_cancel);
            token.cancel();
            *token = self.inner.cancel.child_token();
        }
        {
            let mut slots = lock(&self.inner.queries);
            slots.page = None;
            slots.more = None;
        }
        self.inner.search.cancel();

        match self.inner.api.session().owner_id() {
            None => self.inner.cache.invalidate(None),
            Some(user) => {
                if let Some(previous) = previous {
                    self.inner.cache.invalidate(Some(&previous));
                }
                if owner.is_none() {
                    self.inner.cache.invalidate(Some(&user));
                }
            }
        }
        true
    }

    // ── Loading ──────────────────────────────────────────────────

    /// Show the owner's listing: the cached entry immediately when there is
    /// one (refreshed in the background once stale), otherwise a foreground
    /// load of page 1.
    pub async fn open(&self) -> Result<LoadOutcome, CoreError> {
        self.sync_owner();
        let Some(owner) = self.current_owner() else {
            return Ok(LoadOutcome::Skipped);
        };

        let Some(lookup) = self.inner.cache.get(&owner) else {
            return self.load(LoadRequest::page(1)).await;
        };

        let fresh = lookup.is_fresh();
        let entry = lookup.entry;
        let page = entry.current_page;
        self.inner.state.send_modify(|s| {
            s.items = entry.items;
            s.total_count = entry.total_count;
            s.has_more = entry.has_more;
            s.current_page = entry.current_page;
        });

        if !fresh {
            debug!(owner, page, "cached listing is stale, refreshing in background");
            self.spawn_load(LoadRequest::background(page));
        }
        Ok(LoadOutcome::Cached)
    }

    /// Fetch one page and apply it.
    ///
    /// A non-append load cancels the previous page load. A "load more" in
    /// flight survives it unless it was issued for another search term.
    /// Cancelled loads never touch the listing.
    pub async fn load(&self, req: LoadRequest) -> Result<LoadOutcome, CoreError> {
        self.sync_owner();
        let Some(owner) = self.current_owner() else {
            return Ok(LoadOutcome::Skipped);
        };

        let search = self.inner.state.borrow().search_term.clone();
        let query = self.begin_query(req, &search);
        let mut list_query = ListQuery::page(req.page).with_search(search);
        list_query.ordering.clone_from(&self.inner.config.ordering);

        debug!(
            page = req.page,
            append = req.append,
            background = req.background,
            "loading webtoons"
        );
        let result = self
            .inner
            .api
            .list_webtoons(&list_query, &query.token)
            .await;

        let outcome = match result {
            Ok(page) => {
                if self.apply_page(owner, req, &query, page) {
                    Ok(LoadOutcome::Applied)
                } else {
                    debug!(page = req.page, "load superseded, result discarded");
                    Ok(LoadOutcome::Cancelled)
                }
            }
            Err(e) => {
                let err = CoreError::from(e);
                if err.is_cancelled() || query.token.is_cancelled() {
                    Ok(LoadOutcome::Cancelled)
                } else {
                    self.report_load_error(req, &err);
                    Err(err)
                }
            }
        };

        self.finish_query(query.id);
        outcome
    }

    /// Append the next page, unless one is already loading or there is
    /// nothing more.
    pub async fn load_more(&self) -> Result<LoadOutcome, CoreError> {
        let (busy, has_more, page) = {
            let s = self.inner.state.borrow();
            (s.loading_more, s.has_more, s.current_page)
        };
        if busy || !has_more {
            return Ok(LoadOutcome::Skipped);
        }
        self.load(LoadRequest::append(page.saturating_add(1))).await
    }

    /// Replace the listing with page `page` (clamped to 1).
    pub async fn go_to_page(&self, page: u32) -> Result<LoadOutcome, CoreError> {
        self.load(LoadRequest::page(page.max(1))).await
    }

    /// Drop the cached entry and load page 1 from scratch.
    pub async fn reload(&self) -> Result<LoadOutcome, CoreError> {
        self.sync_owner();
        let Some(owner) = self.current_owner() else {
            return Ok(LoadOutcome::Skipped);
        };
        self.inner.cache.invalidate(Some(&owner));
        self.load(LoadRequest::page(1)).await
    }

    // ── Search ───────────────────────────────────────────────────

    /// Record raw search input and schedule the debounced server query.
    ///
    /// The input filters the visible items at once; the server query runs
    /// once typing pauses (requires [`start()`](Self::start)).
    pub fn set_search(&self, text: &str) {
        self.inner
            .state
            .send_modify(|s| text.clone_into(&mut s.search_input));
        self.inner.search.schedule(text.trim().to_owned());
    }

    /// Apply a settled search term: a replacing page-1 load when the term
    /// changed, nothing otherwise.
    pub async fn apply_search(&self, term: &str) -> Result<LoadOutcome, CoreError> {
        let term = term.trim();
        if !self.record_search_term(term) {
            return Ok(LoadOutcome::Skipped);
        }
        debug!(term, "search term settled");
        self.load(LoadRequest::page(1)).await
    }

    /// Load `page` of the results for `term` in one request.
    pub async fn search_page(&self, term: &str, page: u32) -> Result<LoadOutcome, CoreError> {
        self.record_search_term(term.trim());
        self.load(LoadRequest::page(page.max(1))).await
    }

    /// Whether `term` differs from the active search term.
    fn record_search_term(&self, term: &str) -> bool {
        self.inner.state.send_if_modified(|s| {
            if s.search_term == term {
                false
            } else {
                term.clone_into(&mut s.search_term);
                true
            }
        })
    }

    // ── Query bookkeeping ────────────────────────────────────────

    fn begin_query(&self, req: LoadRequest, term: &str) -> ActiveQuery {
        let token = self.owner_token().child_token();
        let mut slots = lock(&self.inner.queries);
        slots.next_id += 1;
        let query = ActiveQuery {
            id: slots.next_id,
            token,
            background: req.background,
            term: term.to_owned(),
        };

        if req.append {
            if let Some(previous) = slots.more.replace(query.clone()) {
                previous.token.cancel();
            }
        } else {
            if let Some(previous) = slots.page.replace(query.clone()) {
                previous.token.cancel();
            }
            // A "load more" issued for another search term appends foreign rows.
            if let Some(previous) = slots.more.take_if(|q| q.term != term) {
                previous.token.cancel();
            }
        }

        let (loading, loading_more) = (slots.loading(), slots.loading_more());
        self.inner.state.send_modify(|s| {
            s.error = None;
            s.loading = loading;
            s.loading_more = loading_more;
        });
        query
    }

    fn finish_query(&self, id: u64) {
        let mut slots = lock(&self.inner.queries);
        if slots.page.as_ref().is_some_and(|q| q.id == id) {
            slots.page = None;
        }
        if slots.more.as_ref().is_some_and(|q| q.id == id) {
            slots.more = None;
        }

        let (loading, loading_more) = (slots.loading(), slots.loading_more());
        self.inner.state.send_if_modified(|s| {
            let changed = s.loading != loading || s.loading_more != loading_more;
            s.loading = loading;
            s.loading_more = loading_more;
            changed
        });
    }

    /// Apply a fetched page unless the query was superseded meanwhile.
    /// Returns whether the listing changed.
    fn apply_page(
        &self,
        owner: OwnerId,
        req: LoadRequest,
        query: &ActiveQuery,
        page: Page<Webtoon>,
    ) -> bool {
        let _slots = lock(&self.inner.queries);
        if query.token.is_cancelled() {
            return false;
        }

        let has_more = page.has_more();
        let mut patch = None;
        self.inner.state.send_if_modified(|s| {
            if s.owner != Some(owner) {
                return false;
            }
            let items = if req.append || req.merge {
                merge_lists(&s.items, page.results)
            } else {
                page.results
            };
            s.items = Arc::new(items);
            s.total_count = page.count;
            s.has_more = has_more;
            s.auth_required = false;

            let mut update = CachePatch::new()
                .items(Arc::clone(&s.items))
                .total_count(page.count)
                .has_more(has_more);
            if req.moves_page() {
                s.current_page = req.page;
                update = update.current_page(req.page);
            }
            patch = Some(update);
            true
        });

        match patch {
            Some(update) => {
                self.inner.cache.put(owner, update);
                true
            }
            None => false,
        }
    }

    fn report_load_error(&self, req: LoadRequest, err: &CoreError) {
        let message = match err {
            CoreError::SessionExpired | CoreError::NotAuthenticated => {
                SESSION_EXPIRED_MESSAGE.to_owned()
            }
            CoreError::PermissionDenied { .. } => ACCESS_DENIED_MESSAGE.to_owned(),
            CoreError::NetworkUnreachable { .. }
            | CoreError::ValidationFailed { .. }
            | CoreError::NotFound { .. }
            | CoreError::Api { .. } => err.user_message(),
            _ => LOAD_FAILED_MESSAGE.to_owned(),
        };

        warn!(error = %err, page = req.page, "listing load failed");
        let auth_required = err.requires_reauth();
        self.inner.state.send_modify(|s| {
            s.error = Some(message.clone());
            s.auth_required |= auth_required;
        });
        self.publish_failure(message, auth_required);
    }

    /// Post a failure notice. One that needs a new sign-in stays up until
    /// dismissed.
    fn publish_failure(&self, message: String, auth_required: bool) {
        if auth_required {
            self.inner.bus.notify(
                Notification::new(NotificationKind::Error, message)
                    .with_title(SESSION_EXPIRED_TITLE)
                    .with_duration(Duration::ZERO),
            );
        } else {
            self.inner.bus.error(message);
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("owner", &self.current_owner())
            .field("cache", &self.inner.cache)
            .finish_non_exhaustive()
    }
}

// ── Background tasks ────────────────────────────────────────────────

/// Turn settled search terms into loads. Each term runs in its own task so
/// a newer term can cancel an older load.
async fn search_task(
    engine: SyncEngine,
    mut terms: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            term = terms.recv() => {
                let Some(term) = term else { break };
                let runner = engine.clone();
                engine.spawn(async move {
                    if let Err(e) = runner.apply_search(&term).await {
                        debug!(error = %e, "search load failed");
                    }
                });
            }
        }
    }
}

/// Follow session changes: reset on sign-out, open the new owner's listing
/// on sign-in.
async fn session_watch_task(
    engine: SyncEngine,
    mut auth: watch::Receiver<AuthState>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = auth.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *auth.borrow_and_update();
                let settled = matches!(state, AuthState::Anonymous | AuthState::Authenticated);
                if settled && engine.sync_owner() && engine.current_owner().is_some() {
                    let runner = engine.clone();
                    engine.spawn(async move {
                        if let Err(e) = runner.open().await {
                            debug!(error = %e, "opening listing after sign-in failed");
                        }
                    });
                }
            }
        }
    }
}
