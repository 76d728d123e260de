use crate::ItemProgress;

/// Receives per-item stage transitions from workers. Must not block.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, progress: ItemProgress);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn emit(&self, _progress: ItemProgress) {}
}
