/// Side effects requested by [`crate::update`]; the caller performs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Every launched task has produced its outcome; end the output stream.
    CloseStream,
}
