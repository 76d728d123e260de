/// Lifecycle of one fan-out/fan-in run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    /// Tasks are being launched.
    Running,
    /// Everything is launched; waiting on the outstanding tasks.
    Draining,
    /// Terminal. Reached exactly once.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunState {
    phase: Phase,
    total: usize,
    outstanding: usize,
    produced: usize,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of tasks the run was launched with.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Outcomes accepted so far. Never exceeds [`RunState::total`].
    pub fn produced(&self) -> usize {
        self.produced
    }

    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    pub(crate) fn launch(&mut self, total: usize) {
        self.phase = Phase::Running;
        self.total = total;
        self.outstanding = total;
        self.produced = 0;
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Returns false when no task was outstanding.
    pub(crate) fn record_outcome(&mut self) -> bool {
        if self.outstanding == 0 {
            return false;
        }
        self.outstanding -= 1;
        self.produced += 1;
        true
    }
}
