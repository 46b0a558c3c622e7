use crate::timeline::snapshot::TimelineSnapshot;

/// Implemented by adapters that mirror the timeline into a frontend store.
pub trait TimelineStateUpdater: std::fmt::Debug + Send + Sync {
    /// Called with every published snapshot. Errors are logged and otherwise ignored.
    fn update_timeline(&self, snapshot: &TimelineSnapshot) -> anyhow::Result<()>;
}
