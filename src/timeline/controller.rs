//! Owns one timeline: applies diff batches, computes grouping and pagination state, and
//! publishes the result to readers.

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, Weak,
    atomic::{AtomicBool, Ordering},
};

use eyeball::{SharedObservable, Subscriber};
use eyeball_im::Vector;
use futures::{
    FutureExt, StreamExt,
    future::{BoxFuture, Shared},
    stream::BoxStream,
};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, error, info, info_span, trace, warn};

use super::{
    collapse::StateEventCollapser,
    diff::{TimelineDiff, TimelineItems, apply_batch, describe_batch},
    envelope::{
        TimelineEnvelope,
        item_id::UniqueId,
        virtual_item::{IndicatorPosition, VirtualItem},
    },
    gate::InitialItemsGate,
    grouping::{DefaultGroupingPolicy, GroupingPolicy, NeverGroup, classify_all},
    pagination::{
        BeginOutcome, DirectionMode, LiveBackPaginationStatus, PaginationDirection,
        PaginationError, PaginationMachine, PaginationState, PaginationStatus, TimelineKind,
        bounded_request_size,
    },
    snapshot::{TimelineItem, TimelineSnapshot, TimelineUpdate, item_updates},
    source::{DiffBatchStream, TimelineEventSource},
};
use crate::models::{
    config::TimelineConfig,
    event_bridge::EventBridge,
    events::TimelineEvent,
    state_updater::TimelineStateUpdater,
};

type PaginationRequest = Shared<BoxFuture<'static, Result<(), PaginationError>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
enum Command {
    /// Pagination state changed outside the worker.
    Republish,
}

struct PaginationTracker {
    machine: PaginationMachine,
    backward_request: Option<PaginationRequest>,
    forward_request: Option<PaginationRequest>,
}

impl PaginationTracker {
    fn request(&mut self, direction: PaginationDirection) -> &mut Option<PaginationRequest> {
        match direction {
            PaginationDirection::Backwards => &mut self.backward_request,
            PaginationDirection::Forwards => &mut self.forward_request,
        }
    }
}

/// State shared between the controller handle, its worker and pagination tasks.
struct TimelineShared {
    source: Arc<dyn TimelineEventSource>,
    config: TimelineConfig,
    policy: Box<dyn GroupingPolicy>,
    state_updater: Option<Arc<dyn TimelineStateUpdater>>,
    snapshot: SharedObservable<TimelineSnapshot>,
    pagination: Mutex<PaginationTracker>,
    gate: InitialItemsGate,
    commands: mpsc::UnboundedSender<Command>,
    update_sender: Mutex<Option<crossbeam_channel::Sender<TimelineUpdate>>>,
    bridge: EventBridge,
}

impl TimelineShared {
    fn pagination_state(&self) -> PaginationState {
        lock(&self.pagination).machine.state()
    }

    fn request_republish(&self) {
        if self.commands.send(Command::Republish).is_err() {
            trace!("Timeline worker is gone, not republishing");
        }
    }

    fn send_update(&self, update: TimelineUpdate) {
        let mut sender = lock(&self.update_sender);
        let Some(channel) = sender.as_ref() else {
            return;
        };
        if channel.send(update).is_err() {
            debug!("Timeline update receiver was dropped");
            *sender = None;
        }
    }

    fn finish_pagination(
        &self,
        direction: PaginationDirection,
        result: &Result<bool, PaginationError>,
    ) {
        let changed = {
            let mut pagination = lock(&self.pagination);
            *pagination.request(direction) = None;
            pagination.machine.finish(direction, result)
        };
        if let Err(error) = result {
            self.send_update(TimelineUpdate::PaginationError {
                direction,
                error: error.to_string(),
            });
        }
        if changed {
            self.request_republish();
        }
    }
}

/// Builds a [`TimelineController`] with optional collaborators.
pub struct TimelineControllerBuilder {
    source: Arc<dyn TimelineEventSource>,
    config: TimelineConfig,
    policy: Option<Box<dyn GroupingPolicy>>,
    state_updater: Option<Arc<dyn TimelineStateUpdater>>,
}

impl TimelineControllerBuilder {
    /// Replaces the default grouping rules. Ignored for pinned timelines, which never group.
    pub fn grouping_policy(mut self, policy: impl GroupingPolicy + 'static) -> Self {
        self.policy = Some(Box::new(policy));
        self
    }

    pub fn state_updater(mut self, state_updater: Arc<dyn TimelineStateUpdater>) -> Self {
        self.state_updater = Some(state_updater);
        self
    }

    pub fn build(self) -> TimelineController {
        let Self {
            source,
            config,
            policy,
            state_updater,
        } = self;

        let policy: Box<dyn GroupingPolicy> = if config.kind.is_pinned() {
            Box::new(NeverGroup)
        } else {
            policy.unwrap_or_else(|| {
                Box::new(DefaultGroupingPolicy::new(config.grouping_max_gap()))
            })
        };
        let machine = PaginationMachine::new(&config.kind);
        let snapshot = SharedObservable::new(TimelineSnapshot {
            items: Vector::new(),
            pagination: machine.state(),
        });
        let (commands, command_receiver) = mpsc::unbounded_channel();
        let bridge = EventBridge::new(config.bridge_capacity);

        TimelineController {
            shared: Arc::new(TimelineShared {
                source,
                config,
                policy,
                state_updater,
                snapshot,
                pagination: Mutex::new(PaginationTracker {
                    machine,
                    backward_request: None,
                    forward_request: None,
                }),
                gate: InitialItemsGate::new(),
                commands,
                update_sender: Mutex::new(None),
                bridge,
            }),
            subscribed: AtomicBool::new(false),
            command_receiver: Mutex::new(Some(command_receiver)),
            worker: Mutex::new(None),
            update_receiver_taken: AtomicBool::new(false),
        }
    }
}

/// Reconciles one timeline's diff stream into grouped, paginatable snapshots.
///
/// Dropping the controller stops its worker; pagination requests still running
/// finish on their own and their results are discarded.
pub struct TimelineController {
    shared: Arc<TimelineShared>,
    subscribed: AtomicBool,
    command_receiver: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    update_receiver_taken: AtomicBool,
}

impl TimelineController {
    pub fn new(source: Arc<dyn TimelineEventSource>, config: TimelineConfig) -> Self {
        Self::builder(source, config).build()
    }

    pub fn builder(
        source: Arc<dyn TimelineEventSource>,
        config: TimelineConfig,
    ) -> TimelineControllerBuilder {
        TimelineControllerBuilder {
            source,
            config,
            policy: None,
            state_updater: None,
        }
    }

    pub fn kind(&self) -> &TimelineKind {
        &self.shared.config.kind
    }

    /// Starts listening to the source and waits until the first batch has been processed.
    ///
    /// Calling this again only waits for the initial items.
    pub async fn subscribe(&self) {
        if self.subscribed.swap(true, Ordering::SeqCst) {
            warn!("Timeline {} is already subscribed", self.kind());
        } else if !self.start_worker() {
            return;
        }

        self.shared.gate.wait().await;
    }

    /// Spawns the worker. Subscribing to the source happens inside the task so a
    /// cancelled `subscribe` can't leave the timeline without one.
    fn start_worker(&self) -> bool {
        let backward_mode = lock(&self.shared.pagination)
            .machine
            .mode(PaginationDirection::Backwards);
        let statuses = if backward_mode == DirectionMode::PushDriven {
            self.shared.source.back_pagination_status()
        } else {
            None
        };
        let Some(commands) = lock(&self.command_receiver).take() else {
            error!("Timeline command receiver is missing, can't start the worker");
            return false;
        };

        let shared = self.shared.clone();
        let handle = tokio::spawn(async move {
            let diffs = shared.source.subscribe_to_diffs().await;
            Reconciler::new(shared).run(diffs, statuses, commands).await;
        });
        *lock(&self.worker) = Some(handle);
        debug!("Subscribed to timeline {}", self.kind());
        true
    }

    /// Returns once the collection reflects at least the source's initial batch.
    pub async fn wait_for_initial_items(&self) {
        if !self.shared.snapshot.get().is_empty() {
            return;
        }
        self.shared.gate.wait().await;
    }

    pub async fn paginate_backwards(&self, request_size: u16) -> Result<(), PaginationError> {
        self.paginate(PaginationDirection::Backwards, request_size).await
    }

    pub async fn paginate_forwards(&self, request_size: u16) -> Result<(), PaginationError> {
        self.paginate(PaginationDirection::Forwards, request_size).await
    }

    /// Requests more items in `direction`. Calls made while a request is running share
    /// its outcome instead of issuing another fetch.
    async fn paginate(
        &self,
        direction: PaginationDirection,
        request_size: u16,
    ) -> Result<(), PaginationError> {
        let request = {
            let mut pagination = lock(&self.shared.pagination);
            if let Some(request) = pagination.request(direction).clone() {
                debug!("Already paginating {direction}, joining the running request");
                request
            } else {
                match pagination.machine.begin(direction) {
                    BeginOutcome::EndReached => {
                        debug!("Not paginating {direction}, the end was already reached");
                        return Ok(());
                    }
                    BeginOutcome::InFlight => {
                        debug!("The source is already paginating {direction}");
                        return Ok(());
                    }
                    BeginOutcome::Started => {
                        let request = spawn_pagination_request(
                            Arc::downgrade(&self.shared),
                            self.shared.source.clone(),
                            direction,
                            bounded_request_size(request_size),
                        );
                        *pagination.request(direction) = Some(request.clone());
                        drop(pagination);
                        self.shared.request_republish();
                        request
                    }
                }
            }
        };

        request.await
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> TimelineSnapshot {
        self.shared.snapshot.get()
    }

    pub fn subscribe_to_snapshots(&self) -> Subscriber<TimelineSnapshot> {
        self.shared.snapshot.subscribe()
    }

    /// The current pagination state. May be ahead of the latest snapshot by one publication.
    pub fn pagination_state(&self) -> PaginationState {
        self.shared.pagination_state()
    }

    /// Takes the receiver for fine-grained updates. Only the first call gets it.
    pub fn take_update_receiver(&self) -> Option<crossbeam_channel::Receiver<TimelineUpdate>> {
        if self.update_receiver_taken.swap(true, Ordering::SeqCst) {
            warn!("Timeline update receiver was already taken");
            return None;
        }
        let (sender, receiver) = crossbeam_channel::unbounded();
        *lock(&self.shared.update_sender) = Some(sender);
        Some(receiver)
    }

    pub fn subscribe_to_events(&self) -> broadcast::Receiver<TimelineEvent> {
        self.shared.bridge.subscribe()
    }
}

impl Drop for TimelineController {
    fn drop(&mut self) {
        debug!("Dropping timeline controller for {}", self.kind());
        if let Some(worker) = lock(&self.worker).take() {
            worker.abort();
        }
    }
}

fn spawn_pagination_request(
    shared: Weak<TimelineShared>,
    source: Arc<dyn TimelineEventSource>,
    direction: PaginationDirection,
    num_events: u16,
) -> PaginationRequest {
    let task = tokio::spawn(async move {
        info!("Starting {direction} pagination request for {num_events} events");
        let result = match direction {
            PaginationDirection::Backwards => source.paginate_backwards(num_events).await,
            PaginationDirection::Forwards => source.paginate_forwards(num_events).await,
        }
        .map_err(|error| PaginationError::Transport {
            direction,
            reason: error.to_string(),
        });

        match &result {
            Ok(hit_end) => info!("Finished paginating {direction}, reached the end: {hit_end}"),
            Err(error) => warn!("{error}"),
        }

        match shared.upgrade() {
            Some(shared) => shared.finish_pagination(direction, &result),
            None => debug!("Timeline was dropped while paginating {direction}, discarding result"),
        }
        result.map(|_| ())
    });

    async move {
        task.await.unwrap_or_else(|_| Err(PaginationError::Aborted))
    }
    .boxed()
    .shared()
}

/// The single writer of a timeline's collection.
struct Reconciler {
    shared: Arc<TimelineShared>,
    items: TimelineItems,
    collapser: StateEventCollapser,
    start_indicator: Arc<TimelineEnvelope>,
    end_indicator: Arc<TimelineEnvelope>,
}

impl Reconciler {
    fn new(shared: Arc<TimelineShared>) -> Self {
        let indicator = |id: &str, position| {
            Arc::new(TimelineEnvelope::synthesized(
                UniqueId::from(id),
                VirtualItem::PaginationIndicator { position },
            ))
        };
        Self {
            shared,
            items: Vector::new(),
            collapser: StateEventCollapser::default(),
            start_indicator: indicator("pagination-indicator-start", IndicatorPosition::Start),
            end_indicator: indicator("pagination-indicator-end", IndicatorPosition::End),
        }
    }

    async fn run(
        mut self,
        diffs: DiffBatchStream,
        mut statuses: Option<BoxStream<'static, LiveBackPaginationStatus>>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let mut diffs = Some(diffs);
        loop {
            tokio::select! {
                batch = next_or_pending(&mut diffs) => match batch {
                    Some(batch) => self.process_batch(batch),
                    None => {
                        debug!("Timeline diff stream ended");
                        diffs = None;
                        // Never leave subscribers waiting on a source that went away.
                        if !self.shared.gate.is_open() {
                            self.shared.gate.open();
                        }
                    }
                },
                status = next_or_pending(&mut statuses) => match status {
                    Some(status) => self.apply_live_status(status),
                    None => {
                        debug!("Back pagination status stream ended");
                        statuses = None;
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::Republish) => self.publish(),
                    None => break,
                },
            }
        }
    }

    fn process_batch(&mut self, batch: Vec<TimelineDiff>) {
        let span = info_span!("process_timeline_diffs", kind = %self.shared.config.kind);
        let _enter = span.enter();

        if self.shared.config.log_diffs {
            debug!("Received timeline diffs: {}", describe_batch(&batch));
        }

        match apply_batch(&self.items, batch) {
            Ok(outcome) => {
                self.items = outcome.items;
                if outcome.did_reset && lock(&self.shared.pagination).machine.reset() {
                    debug!("Timeline reset, pagination can resume");
                }
                self.publish();
                for unique_id in outcome.membership_changes {
                    self.shared
                        .bridge
                        .emit(TimelineEvent::MembershipChanged { unique_id });
                }
            }
            Err(error) => error!("Dropping malformed timeline diff batch: {error}"),
        }

        if !self.shared.gate.is_open() {
            self.shared.gate.open();
        }
    }

    fn apply_live_status(&mut self, status: LiveBackPaginationStatus) {
        let changed = lock(&self.shared.pagination).machine.apply_live_status(status);
        if changed {
            trace!("Back pagination status is now {status:?}");
            self.publish();
        }
    }

    fn render(&mut self, pagination: PaginationState) -> Vector<TimelineItem> {
        let config = &self.shared.config;
        let mut entries: Vec<Arc<TimelineEnvelope>> =
            Vec::with_capacity(self.items.len() + 2);

        let show_indicator = |direction: PaginationDirection| {
            config.show_pagination_indicators
                && pagination.get(direction) == PaginationStatus::Paginating
        };

        if show_indicator(PaginationDirection::Backwards) {
            entries.push(self.start_indicator.clone());
        }
        if config.collapse_state_events {
            entries.extend(self.collapser.collapse(self.items.iter().cloned()));
        } else {
            entries.extend(self.items.iter().cloned());
        }
        if config.hide_trailing_read_marker
            && entries
                .last()
                .is_some_and(|entry| entry.as_virtual() == Some(&VirtualItem::ReadMarker))
        {
            entries.pop();
        }
        if show_indicator(PaginationDirection::Forwards) {
            entries.push(self.end_indicator.clone());
        }

        let groups = classify_all(&entries, self.shared.policy.as_ref());
        entries
            .into_iter()
            .zip(groups)
            .map(|(envelope, group)| TimelineItem::new(envelope, group))
            .collect()
    }

    fn publish(&mut self) {
        let pagination = self.shared.pagination_state();
        let snapshot = TimelineSnapshot {
            items: self.render(pagination),
            pagination,
        };
        let previous = self.shared.snapshot.set(snapshot.clone());

        let mut updates = item_updates(&previous.items, &snapshot.items);
        if !updates.is_empty() {
            updates.push(TimelineUpdate::ItemsUpdated {
                len: snapshot.len(),
            });
        }
        if previous.pagination != pagination {
            updates.push(TimelineUpdate::PaginationChanged(pagination));
        }
        for update in updates {
            self.shared.send_update(update);
        }

        if let Some(state_updater) = &self.shared.state_updater {
            if let Err(error) = state_updater.update_timeline(&snapshot) {
                warn!("Failed to update the timeline state: {error}");
            }
        }
    }
}

/// The next item of `stream`, or never once it has ended.
async fn next_or_pending<T>(stream: &mut Option<BoxStream<'static, T>>) -> Option<T> {
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}
