use std::{future::Future, sync::Arc, time::Duration};

use shared::domain::{CollectionName, OrderedItem, OrderedSnapshot};
use tokio::{
    sync::{broadcast, Mutex},
    time::{self, Instant},
};
use tracing::{debug, info, warn};

use crate::{
    error::{ReorderError, StoreError},
    gesture::Gesture,
    view::CollectionView,
    OrderStore,
};

const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(3);
const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);
const SUCCESS_MESSAGE: &str = "Order updated successfully!";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConcurrencyPolicy {
    /// Submissions overwrite whatever order is stored.
    #[default]
    LastWriterWins,
    /// Submissions carry the version they were computed from and are rejected
    /// when the collection moved on.
    Versioned,
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub policy: ConcurrencyPolicy,
    pub notice_ttl: Duration,
    /// Upper bound on a single store round trip; exceeding it counts as a
    /// transport failure.
    pub store_timeout: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            policy: ConcurrencyPolicy::default(),
            notice_ttl: DEFAULT_NOTICE_TTL,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderPhase {
    Idle,
    OptimisticallyApplied { seq: u64 },
    Committed { seq: u64 },
    RolledBack { seq: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    ConcurrentOverwrite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub shown_at: Instant,
}

#[derive(Debug, Clone)]
pub enum ControllerEvent {
    ViewChanged(CollectionView),
    PhaseChanged(ReorderPhase),
    Notice(Notice),
    /// The notice expired or was dismissed.
    NoticeCleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderOutcome {
    /// The gesture did not change the order; nothing was sent.
    Unchanged,
    Committed { version: i64 },
}

struct ControllerState {
    view: CollectionView,
    /// Last order the store confirmed.
    confirmed: CollectionView,
    phase: ReorderPhase,
    filter: Option<String>,
    notice: Option<Notice>,
    next_seq: u64,
}

impl ControllerState {
    fn take_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// Owns the view of one collection and drives optimistic reorders against an
/// [`OrderStore`].
///
/// Submissions are serialized by `in_flight`, so each store answer belongs to
/// the newest submission and is applied as-is. Sequence numbers tag the phase
/// transitions of each submission.
pub struct ReorderController {
    store: Arc<dyn OrderStore>,
    collection: CollectionName,
    options: ControllerOptions,
    state: Arc<Mutex<ControllerState>>,
    in_flight: Mutex<()>,
    events: broadcast::Sender<ControllerEvent>,
}

impl ReorderController {
    pub fn new(
        store: Arc<dyn OrderStore>,
        snapshot: OrderedSnapshot,
        options: ControllerOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        let view = CollectionView::from_snapshot(snapshot);
        Self {
            store,
            collection: view.collection().clone(),
            options,
            state: Arc::new(Mutex::new(ControllerState {
                confirmed: view.clone(),
                view,
                phase: ReorderPhase::Idle,
                filter: None,
                notice: None,
                next_seq: 0,
            })),
            in_flight: Mutex::new(()),
            events,
        }
    }

    /// Fetches the current order and builds a controller around it.
    pub async fn load(
        store: Arc<dyn OrderStore>,
        collection: &CollectionName,
        options: ControllerOptions,
    ) -> Result<Self, StoreError> {
        let snapshot = store.list_ordered(collection).await?;
        Ok(Self::new(store, snapshot, options))
    }

    pub fn collection(&self) -> &CollectionName {
        &self.collection
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn view(&self) -> CollectionView {
        self.state.lock().await.view.clone()
    }

    pub async fn phase(&self) -> ReorderPhase {
        self.state.lock().await.phase
    }

    /// Items to display, narrowed by the active filter if any.
    pub async fn visible_items(&self) -> Vec<OrderedItem> {
        let state = self.state.lock().await;
        match &state.filter {
            Some(term) => state.view.matching(term).into_iter().cloned().collect(),
            None => state.view.items().to_vec(),
        }
    }

    pub async fn set_filter(&self, term: impl Into<String>) {
        let term = term.into();
        let mut state = self.state.lock().await;
        state.filter = if term.trim().is_empty() {
            None
        } else {
            Some(term)
        };
    }

    pub async fn clear_filter(&self) {
        self.state.lock().await.filter = None;
    }

    pub async fn filter(&self) -> Option<String> {
        self.state.lock().await.filter.clone()
    }

    /// Switches the screen into reorder mode, which always shows the full list.
    pub async fn enter_reorder_mode(&self) {
        self.clear_filter().await;
    }

    pub async fn move_up_enabled(&self, index: usize) -> bool {
        let state = self.state.lock().await;
        state.filter.is_none() && index > 0 && index < state.view.len()
    }

    pub async fn move_down_enabled(&self, index: usize) -> bool {
        let state = self.state.lock().await;
        state.filter.is_none() && index + 1 < state.view.len()
    }

    /// The current notice, unless it has expired. Expiry is also announced
    /// with [`ControllerEvent::NoticeCleared`].
    pub async fn current_notice(&self) -> Option<Notice> {
        let mut state = self.state.lock().await;
        if state
            .notice
            .as_ref()
            .is_some_and(|notice| notice.shown_at.elapsed() >= self.options.notice_ttl)
        {
            state.notice = None;
            self.emit(ControllerEvent::NoticeCleared);
        }
        state.notice.clone()
    }

    pub async fn dismiss_notice(&self) {
        if self.state.lock().await.notice.take().is_some() {
            self.emit(ControllerEvent::NoticeCleared);
        }
    }

    /// Applies `gesture` locally, submits the resulting order and commits or
    /// rolls back depending on the store's answer.
    pub async fn apply_gesture(&self, gesture: Gesture) -> Result<ReorderOutcome, ReorderError> {
        let _submission = self
            .in_flight
            .try_lock()
            .map_err(|_| ReorderError::Busy)?;

        let (seq, base_version, optimistic) = {
            let mut state = self.state.lock().await;
            if state.filter.is_some() {
                return Err(ReorderError::FilterActive);
            }
            let Some(next) = state.view.after(gesture)? else {
                debug!(collection = %self.collection, ?gesture, "gesture left order unchanged");
                return Ok(ReorderOutcome::Unchanged);
            };
            let seq = state.take_seq();
            let base_version = state.view.version();
            state.view = next.clone();
            self.emit(ControllerEvent::ViewChanged(next.clone()));
            self.set_phase(&mut state, ReorderPhase::OptimisticallyApplied { seq });
            (seq, base_version, next)
        };

        let expected_version = match self.options.policy {
            ConcurrencyPolicy::LastWriterWins => None,
            ConcurrencyPolicy::Versioned => Some(base_version),
        };
        let ids = optimistic.ids();
        let result = self
            .bounded(
                self.store
                    .reassign_ranks(&self.collection, &ids, expected_version),
            )
            .await;

        match result {
            Ok(version) => {
                self.commit(seq, base_version, optimistic, version).await;
                Ok(ReorderOutcome::Committed { version })
            }
            Err(err) => {
                warn!(collection = %self.collection, seq, %err, "reorder rejected; rolling back");
                self.roll_back(seq, &err).await;
                Err(err.into())
            }
        }
    }

    /// Replaces the view with the store's current order. Waits for any
    /// in-flight submission to settle first.
    pub async fn refresh(&self) -> Result<CollectionView, StoreError> {
        let _submission = self.in_flight.lock().await;
        let snapshot = self
            .bounded(self.store.list_ordered(&self.collection))
            .await?;

        let mut state = self.state.lock().await;
        let view = CollectionView::from_snapshot(snapshot);
        state.view = view.clone();
        state.confirmed = view.clone();
        self.emit(ControllerEvent::ViewChanged(view.clone()));
        Ok(view)
    }

    async fn commit(
        &self,
        seq: u64,
        base_version: i64,
        optimistic: CollectionView,
        version: i64,
    ) {
        let mut state = self.state.lock().await;

        let view = optimistic.with_version(version);
        state.view = view.clone();
        state.confirmed = view.clone();
        self.emit(ControllerEvent::ViewChanged(view));

        let overwritten = self.options.policy == ConcurrencyPolicy::LastWriterWins
            && version > base_version + 1;
        let notice = if overwritten {
            warn!(
                collection = %self.collection,
                base_version,
                version,
                "reorder applied over a concurrent change"
            );
            Notice {
                kind: NoticeKind::ConcurrentOverwrite,
                message: "Order updated, replacing changes made by someone else.".to_string(),
                shown_at: Instant::now(),
            }
        } else {
            info!(collection = %self.collection, seq, version, "reorder committed");
            Notice {
                kind: NoticeKind::Success,
                message: SUCCESS_MESSAGE.to_string(),
                shown_at: Instant::now(),
            }
        };
        self.show_notice(&mut state, notice);
        self.set_phase(&mut state, ReorderPhase::Committed { seq });
        self.set_phase(&mut state, ReorderPhase::Idle);
    }

    async fn roll_back(&self, seq: u64, cause: &StoreError) {
        let refetched = self
            .bounded(self.store.list_ordered(&self.collection))
            .await;

        let mut state = self.state.lock().await;

        let view = match refetched {
            Ok(snapshot) => {
                let view = CollectionView::from_snapshot(snapshot);
                state.confirmed = view.clone();
                view
            }
            Err(err) => {
                warn!(
                    collection = %self.collection,
                    %err,
                    "refetch after failed reorder also failed; restoring last confirmed order"
                );
                state.confirmed.clone()
            }
        };
        state.view = view.clone();
        self.emit(ControllerEvent::ViewChanged(view));

        self.show_notice(
            &mut state,
            Notice {
                kind: NoticeKind::Error,
                message: format!("Failed to update order: {cause}"),
                shown_at: Instant::now(),
            },
        );
        self.set_phase(&mut state, ReorderPhase::RolledBack { seq });
        self.set_phase(&mut state, ReorderPhase::Idle);
    }

    fn set_phase(&self, state: &mut ControllerState, phase: ReorderPhase) {
        state.phase = phase;
        self.emit(ControllerEvent::PhaseChanged(phase));
    }

    fn show_notice(&self, state: &mut ControllerState, notice: Notice) {
        let shown_at = notice.shown_at;
        state.notice = Some(notice.clone());
        self.emit(ControllerEvent::Notice(notice));

        let state = self.state.clone();
        let events = self.events.clone();
        let expires_at = shown_at + self.options.notice_ttl;
        tokio::spawn(async move {
            time::sleep_until(expires_at).await;
            let mut state = state.lock().await;
            // A newer notice keeps its own timer.
            if state
                .notice
                .as_ref()
                .is_some_and(|notice| notice.shown_at == shown_at)
            {
                state.notice = None;
                let _ = events.send(ControllerEvent::NoticeCleared);
            }
        });
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let limit = self.options.store_timeout;
        time::timeout(limit, call).await.unwrap_or_else(|_| {
            Err(StoreError::Transport(format!(
                "no answer from order store within {limit:?}"
            )))
        })
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }
}
