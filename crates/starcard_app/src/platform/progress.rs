use engine_logging::{engine_debug, engine_info, RunLogger};
use starcard_engine::{ItemProgress, ProgressSink, Stage};

/// Reports worker progress through the run logger.
pub struct LoggingProgressSink {
    logger: RunLogger,
}

impl LoggingProgressSink {
    pub fn new(logger: RunLogger) -> Self {
        Self { logger }
    }
}

impl ProgressSink for LoggingProgressSink {
    fn emit(&self, progress: ItemProgress) {
        match progress.stage {
            Stage::Done => engine_info!(
                self.logger,
                "#{} done repo_url={}",
                progress.index,
                progress.context
            ),
            stage => engine_debug!(
                self.logger,
                "#{} {:?} repo_url={}",
                progress.index,
                stage,
                progress.context
            ),
        }
    }
}
