#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Msg {
    /// The coordinator is about to launch `total` worker tasks.
    Launch { total: usize },
    /// Every task has been spawned; only completions remain.
    AllLaunched,
    /// One task finished and its outcome was handed to the stream.
    OutcomeProduced,
}
