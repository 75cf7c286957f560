//! Sample buffer - bounded per-channel storage shared by sources and the scheduler.
//!
//! Every channel owns a fixed-capacity ring, so memory use is bounded by
//! `channels × capacity` no matter how long a stream runs. The channel map sits
//! behind a `RwLock` and each channel behind its own `Mutex`; all critical
//! sections are a push or a copy-out, never a downsample or a draw.

mod ring;

pub use ring::Ring;

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// Channel identifier.
pub type ChannelId = u32;

/// One timestamped reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Monotonic timestamp in seconds (or the source's x unit).
    pub timestamp: f64,
    /// Channel the reading belongs to.
    pub channel: ChannelId,
    /// Measured value.
    pub value: f64,
}

impl Sample {
    /// Create a sample.
    pub fn new(timestamp: f64, channel: ChannelId, value: f64) -> Self {
        Self {
            timestamp,
            channel,
            value,
        }
    }
}

/// What happens to a sample whose timestamp goes backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderPolicy {
    /// Store it and flag it; jittery adapters keep working.
    #[default]
    Accept,
    /// Drop it and report it as rejected.
    Reject,
}

/// What happens to a sample for a channel that does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelPolicy {
    /// Create the channel on its first sample (named `ch<id>`).
    #[default]
    AutoCreate,
    /// Only accept samples for channels created with `create_channel`.
    Reject,
}

/// Why a push was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Timestamp earlier than the channel's newest one under `OrderPolicy::Reject`.
    OutOfOrder,
    /// Channel unknown under `ChannelPolicy::Reject`.
    UnknownChannel,
}

/// Result of a single push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Stored in an existing channel.
    Appended,
    /// Stored in a channel created for it.
    CreatedChannel,
    /// Stored, but its timestamp is earlier than the channel's newest.
    OutOfOrder,
    /// Not stored.
    Rejected(RejectReason),
}

/// Aggregated outcome of `push_batch`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Samples stored (including flagged and channel-creating ones).
    pub appended: usize,
    /// Channels created during the batch.
    pub created: usize,
    /// Samples stored with a backwards timestamp.
    pub out_of_order: usize,
    /// Samples refused.
    pub rejected: usize,
}

impl BatchStats {
    fn record(&mut self, outcome: PushOutcome) {
        match outcome {
            PushOutcome::Appended => self.appended += 1,
            PushOutcome::CreatedChannel => {
                self.appended += 1;
                self.created += 1;
            },
            PushOutcome::OutOfOrder => {
                self.appended += 1;
                self.out_of_order += 1;
            },
            PushOutcome::Rejected(_) => self.rejected += 1,
        }
    }
}

/// Which part of a channel a snapshot copies.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SnapshotWindow {
    /// Every retained sample.
    #[default]
    All,
    /// The `n` most recently pushed samples.
    Latest(usize),
    /// Samples no older than this many seconds before the newest timestamp.
    MaxAge(f64),
}

/// Read-only description of a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    /// Channel identifier.
    pub id: ChannelId,
    /// Display name.
    pub name: String,
    /// Whether the channel is rendered.
    pub enabled: bool,
    /// Samples currently retained.
    pub len: usize,
    /// Samples ever stored.
    pub total_pushed: u64,
    /// Stored samples that arrived with a backwards timestamp.
    pub out_of_order: u64,
}

#[derive(Debug)]
struct Channel {
    id: ChannelId,
    name: String,
    enabled: bool,
    ring: Ring<Sample>,
    newest: Option<f64>,
    total_pushed: u64,
    out_of_order: u64,
}

impl Channel {
    fn new(id: ChannelId, name: String, capacity: usize) -> Self {
        Self {
            id,
            name,
            enabled: true,
            ring: Ring::new(capacity),
            newest: None,
            total_pushed: 0,
            out_of_order: 0,
        }
    }

    fn push(&mut self, sample: Sample, policy: OrderPolicy) -> PushOutcome {
        let backwards = self.newest.is_some_and(|newest| sample.timestamp < newest);
        if backwards && policy == OrderPolicy::Reject {
            return PushOutcome::Rejected(RejectReason::OutOfOrder);
        }

        self.ring.push(sample);
        self.total_pushed += 1;
        if backwards {
            self.out_of_order += 1;
            PushOutcome::OutOfOrder
        } else {
            self.newest = Some(sample.timestamp);
            PushOutcome::Appended
        }
    }

    fn copy_window(&self, window: SnapshotWindow) -> Vec<Sample> {
        match window {
            SnapshotWindow::All => self.ring.iter().copied().collect(),
            SnapshotWindow::Latest(n) => {
                let skip = self.ring.len().saturating_sub(n);
                self.ring.iter().skip(skip).copied().collect()
            },
            SnapshotWindow::MaxAge(age) => match self.newest {
                Some(newest) => {
                    let oldest_allowed = newest - age;
                    self.ring
                        .iter()
                        .filter(|s| s.timestamp >= oldest_allowed)
                        .copied()
                        .collect()
                },
                None => Vec::new(),
            },
        }
    }

    fn info(&self) -> ChannelInfo {
        ChannelInfo {
            id: self.id,
            name: self.name.clone(),
            enabled: self.enabled,
            len: self.ring.len(),
            total_pushed: self.total_pushed,
            out_of_order: self.out_of_order,
        }
    }
}

/// Default display name for a channel created without one.
pub fn default_channel_name(id: ChannelId) -> String {
    format!("ch{}", id)
}

/// Bounded per-channel sample store.
#[derive(Debug)]
pub struct SampleBuffer {
    capacity: usize,
    order_policy: OrderPolicy,
    channel_policy: ChannelPolicy,
    channels: RwLock<BTreeMap<ChannelId, Arc<Mutex<Channel>>>>,
}

impl SampleBuffer {
    /// Create a buffer with the default policies.
    pub fn new(capacity: usize) -> Self {
        Self::with_policies(capacity, OrderPolicy::default(), ChannelPolicy::default())
    }

    /// Create a buffer with explicit ordering and channel-creation policies.
    pub fn with_policies(
        capacity: usize,
        order_policy: OrderPolicy,
        channel_policy: ChannelPolicy,
    ) -> Self {
        Self {
            capacity: capacity.max(1),
            order_policy,
            channel_policy,
            channels: RwLock::new(BTreeMap::new()),
        }
    }

    /// Per-channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ordering policy in effect.
    pub fn order_policy(&self) -> OrderPolicy {
        self.order_policy
    }

    /// Channel-creation policy in effect.
    pub fn channel_policy(&self) -> ChannelPolicy {
        self.channel_policy
    }

    fn channel(&self, id: ChannelId) -> Option<Arc<Mutex<Channel>>> {
        self.channels.read().get(&id).cloned()
    }

    /// Create a channel, or rename it if it already exists.
    ///
    /// Returns `true` when a new channel was created.
    pub fn create_channel(&self, id: ChannelId, name: impl Into<String>) -> bool {
        let name = name.into();
        let mut channels = self.channels.write();
        if let Some(existing) = channels.get(&id) {
            existing.lock().name = name;
            return false;
        }
        channels.insert(id, Arc::new(Mutex::new(Channel::new(id, name, self.capacity))));
        true
    }

    /// Store one sample in its channel, evicting the oldest on overflow.
    pub fn push(&self, sample: Sample) -> PushOutcome {
        if let Some(channel) = self.channel(sample.channel) {
            return channel.lock().push(sample, self.order_policy);
        }

        if self.channel_policy == ChannelPolicy::Reject {
            return PushOutcome::Rejected(RejectReason::UnknownChannel);
        }

        // Another writer may have created the channel between the two locks.
        let (channel, created) = {
            let mut channels = self.channels.write();
            let mut created = false;
            let channel = channels
                .entry(sample.channel)
                .or_insert_with(|| {
                    created = true;
                    Arc::new(Mutex::new(Channel::new(
                        sample.channel,
                        default_channel_name(sample.channel),
                        self.capacity,
                    )))
                })
                .clone();
            (channel, created)
        };

        if created {
            tracing::debug!("Auto-created channel {}", sample.channel);
        }

        let outcome = channel.lock().push(sample, self.order_policy);
        match outcome {
            PushOutcome::Appended if created => PushOutcome::CreatedChannel,
            other => other,
        }
    }

    /// Store a batch of samples in order.
    pub fn push_batch(&self, samples: &[Sample]) -> BatchStats {
        let mut stats = BatchStats::default();
        for &sample in samples {
            stats.record(self.push(sample));
        }
        stats
    }

    /// Copy a channel's samples in arrival order.
    ///
    /// Returns `None` for an unknown channel.
    pub fn snapshot(&self, id: ChannelId, window: SnapshotWindow) -> Option<Vec<Sample>> {
        let channel = self.channel(id)?;
        let samples = channel.lock().copy_window(window);
        Some(samples)
    }

    /// Remove all samples of a channel, keeping the channel itself.
    pub fn clear(&self, id: ChannelId) -> bool {
        match self.channel(id) {
            Some(channel) => {
                let mut channel = channel.lock();
                channel.ring.clear();
                channel.newest = None;
                true
            },
            None => false,
        }
    }

    /// Remove all samples of every channel.
    pub fn clear_all(&self) {
        let channels: Vec<_> = self.channels.read().values().cloned().collect();
        for channel in channels {
            let mut channel = channel.lock();
            channel.ring.clear();
            channel.newest = None;
        }
    }

    /// Destroy a channel.
    pub fn remove_channel(&self, id: ChannelId) -> bool {
        self.channels.write().remove(&id).is_some()
    }

    /// Rename a channel.
    pub fn set_name(&self, id: ChannelId, name: impl Into<String>) -> bool {
        match self.channel(id) {
            Some(channel) => {
                channel.lock().name = name.into();
                true
            },
            None => false,
        }
    }

    /// Show or hide a channel.
    pub fn set_enabled(&self, id: ChannelId, enabled: bool) -> bool {
        match self.channel(id) {
            Some(channel) => {
                channel.lock().enabled = enabled;
                true
            },
            None => false,
        }
    }

    /// Describe one channel.
    pub fn channel_info(&self, id: ChannelId) -> Option<ChannelInfo> {
        self.channel(id).map(|channel| channel.lock().info())
    }

    /// Describe every channel, ordered by id.
    pub fn channels(&self) -> Vec<ChannelInfo> {
        let channels: Vec<_> = self.channels.read().values().cloned().collect();
        channels.iter().map(|c| c.lock().info()).collect()
    }

    /// Ids and names of enabled channels, ordered by id.
    pub fn visible_channels(&self) -> Vec<(ChannelId, String)> {
        self.channels()
            .into_iter()
            .filter(|info| info.enabled)
            .map(|info| (info.id, info.name))
            .collect()
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    /// Total samples retained across channels.
    pub fn total_len(&self) -> usize {
        self.channels().iter().map(|c| c.len).sum()
    }
}
