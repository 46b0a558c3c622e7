#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use eyeball_im::{Vector, VectorDiff};
use futures::{StreamExt, channel::mpsc, stream::BoxStream};
use matrix_timeline_reconciler::{
    DiffBatchStream, EventOrTransactionId, LiveBackPaginationStatus, RawItemKind,
    RawTimelineItem, TimelineController, TimelineDiff, TimelineEventSource, TimelineSnapshot,
    UniqueId, VirtualItem,
    envelope::content::{ContentVariant, MembershipChangeKind, MessageContent, Sender},
};
use tokio::{
    sync::Notify,
    time::{Duration, sleep, timeout},
};

pub const ALICE: &str = "@alice:example.org";
pub const BOB: &str = "@bob:example.org";

/// An in-memory event source driven by the test.
pub struct ScriptedSource {
    diff_sender: Mutex<Option<mpsc::UnboundedSender<Vec<TimelineDiff>>>>,
    diffs: Mutex<Option<mpsc::UnboundedReceiver<Vec<TimelineDiff>>>>,
    status_sender: mpsc::UnboundedSender<LiveBackPaginationStatus>,
    statuses: Mutex<Option<mpsc::UnboundedReceiver<LiveBackPaginationStatus>>>,
    subscribe_delay: Mutex<Option<Duration>>,
    pub subscriptions: AtomicUsize,
    pub backward_fetches: AtomicUsize,
    pub forward_fetches: AtomicUsize,
    pub requested_sizes: Mutex<Vec<u16>>,
    outcomes: Mutex<VecDeque<Result<bool, String>>>,
    hold_fetches: AtomicBool,
    release: Notify,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        let (diff_sender, diffs) = mpsc::unbounded();
        let (status_sender, statuses) = mpsc::unbounded();
        Arc::new(Self {
            diff_sender: Mutex::new(Some(diff_sender)),
            diffs: Mutex::new(Some(diffs)),
            status_sender,
            statuses: Mutex::new(Some(statuses)),
            subscribe_delay: Mutex::new(None),
            subscriptions: AtomicUsize::new(0),
            backward_fetches: AtomicUsize::new(0),
            forward_fetches: AtomicUsize::new(0),
            requested_sizes: Mutex::new(Vec::new()),
            outcomes: Mutex::new(VecDeque::new()),
            hold_fetches: AtomicBool::new(false),
            release: Notify::new(),
        })
    }

    pub fn send(&self, batch: Vec<TimelineDiff>) {
        self.diff_sender
            .lock()
            .unwrap()
            .as_ref()
            .expect("diff stream is open")
            .unbounded_send(batch)
            .expect("controller listens to diffs");
    }

    /// Ends the diff stream, as a source does when its room goes away.
    pub fn end_diffs(&self) {
        self.diff_sender.lock().unwrap().take();
    }

    /// Makes `subscribe_to_diffs` take `delay` before returning the stream.
    pub fn delay_subscription(&self, delay: Duration) {
        *self.subscribe_delay.lock().unwrap() = Some(delay);
    }

    pub fn push_status(&self, status: LiveBackPaginationStatus) {
        self.status_sender
            .unbounded_send(status)
            .expect("controller listens to statuses");
    }

    /// Queues the result of the next fetch. Fetches without a queued result succeed
    /// without reaching the end.
    pub fn queue_outcome(&self, outcome: Result<bool, &str>) {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(outcome.map_err(str::to_owned));
    }

    /// Makes fetches wait for [`ScriptedSource::release_fetch`].
    pub fn hold_fetches(&self) {
        self.hold_fetches.store(true, Ordering::SeqCst);
    }

    pub fn release_fetch(&self) {
        self.release.notify_one();
    }

    pub fn fetches(&self) -> usize {
        self.backward_fetches.load(Ordering::SeqCst) + self.forward_fetches.load(Ordering::SeqCst)
    }

    async fn fetch(&self, counter: &AtomicUsize, num_events: u16) -> anyhow::Result<bool> {
        counter.fetch_add(1, Ordering::SeqCst);
        self.requested_sizes.lock().unwrap().push(num_events);
        if self.hold_fetches.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        let outcome = self.outcomes.lock().unwrap().pop_front();
        match outcome {
            Some(Ok(hit_end)) => Ok(hit_end),
            Some(Err(reason)) => Err(anyhow::anyhow!(reason)),
            None => Ok(false),
        }
    }
}

#[async_trait]
impl TimelineEventSource for ScriptedSource {
    async fn subscribe_to_diffs(&self) -> DiffBatchStream {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let delay = *self.subscribe_delay.lock().unwrap();
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        match self.diffs.lock().unwrap().take() {
            Some(diffs) => diffs.boxed(),
            None => futures::stream::empty().boxed(),
        }
    }

    fn back_pagination_status(&self) -> Option<BoxStream<'static, LiveBackPaginationStatus>> {
        self.statuses
            .lock()
            .unwrap()
            .take()
            .map(|statuses| statuses.boxed())
    }

    async fn paginate_backwards(&self, num_events: u16) -> anyhow::Result<bool> {
        self.fetch(&self.backward_fetches, num_events).await
    }

    async fn paginate_forwards(&self, num_events: u16) -> anyhow::Result<bool> {
        self.fetch(&self.forward_fetches, num_events).await
    }
}

#[derive(Debug, Clone)]
pub struct Item {
    unique_id: UniqueId,
    id: Option<EventOrTransactionId>,
    kind: RawItemKind,
}

impl RawTimelineItem for Item {
    fn unique_id(&self) -> UniqueId {
        self.unique_id.clone()
    }

    fn event_or_transaction_id(&self) -> Option<EventOrTransactionId> {
        self.id.clone()
    }

    fn kind(&self) -> RawItemKind {
        self.kind.clone()
    }
}

fn event(
    unique_id: &str,
    id: EventOrTransactionId,
    sender: &str,
    content: ContentVariant,
) -> Arc<dyn RawTimelineItem> {
    Arc::new(Item {
        unique_id: UniqueId::from(unique_id),
        id: Some(id),
        kind: RawItemKind::Event {
            timestamp_ms: 1_731_000_000_000,
            sender: Sender::new(sender),
            content,
        },
    })
}

pub fn message(unique_id: &str, sender: &str) -> Arc<dyn RawTimelineItem> {
    confirmed(unique_id, sender, &format!("${unique_id}"))
}

pub fn confirmed(unique_id: &str, sender: &str, event_id: &str) -> Arc<dyn RawTimelineItem> {
    event(
        unique_id,
        EventOrTransactionId::EventId(event_id.to_owned()),
        sender,
        ContentVariant::Message(MessageContent::text(unique_id)),
    )
}

pub fn local_echo(
    unique_id: &str,
    sender: &str,
    transaction_id: &str,
) -> Arc<dyn RawTimelineItem> {
    event(
        unique_id,
        EventOrTransactionId::TransactionId(transaction_id.to_owned()),
        sender,
        ContentVariant::Message(MessageContent::text(unique_id)),
    )
}

pub fn membership(unique_id: &str, user_id: &str) -> Arc<dyn RawTimelineItem> {
    event(
        unique_id,
        EventOrTransactionId::EventId(format!("${unique_id}")),
        user_id,
        ContentVariant::MembershipChange {
            user_id: user_id.to_owned(),
            change: MembershipChangeKind::Joined,
        },
    )
}

pub fn read_marker(unique_id: &str) -> Arc<dyn RawTimelineItem> {
    Arc::new(Item {
        unique_id: UniqueId::from(unique_id),
        id: None,
        kind: RawItemKind::Virtual(VirtualItem::ReadMarker),
    })
}

pub fn reset(items: Vec<Arc<dyn RawTimelineItem>>) -> TimelineDiff {
    VectorDiff::Reset {
        values: Vector::from(items),
    }
}

pub fn append(items: Vec<Arc<dyn RawTimelineItem>>) -> TimelineDiff {
    VectorDiff::Append {
        values: Vector::from(items),
    }
}

pub fn ids(snapshot: &TimelineSnapshot) -> Vec<String> {
    snapshot
        .unique_ids()
        .into_iter()
        .map(|id| id.to_string())
        .collect()
}

/// Waits until the published snapshot satisfies `predicate`.
pub async fn wait_for_snapshot(
    controller: &TimelineController,
    predicate: impl Fn(&TimelineSnapshot) -> bool,
) -> TimelineSnapshot {
    let mut subscriber = controller.subscribe_to_snapshots();
    timeout(Duration::from_secs(2), async {
        loop {
            let snapshot = subscriber.get();
            if predicate(&snapshot) {
                return snapshot;
            }
            subscriber.next().await.expect("controller is alive");
        }
    })
    .await
    .expect("timed out waiting for snapshot")
}

/// Subscribes and feeds the initial batch.
pub async fn subscribed(
    controller: &TimelineController,
    source: &ScriptedSource,
    initial: Vec<Arc<dyn RawTimelineItem>>,
) {
    source.send(vec![reset(initial)]);
    timeout(Duration::from_secs(2), controller.subscribe())
        .await
        .expect("subscribe returns after the first batch");
}
