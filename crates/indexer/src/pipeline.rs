//! Ordered processing stages.
//!
//! A provider runs every tracker, then every aggregate, against the same
//! batch context. Stages run in registration order.

use crate::event::Action;
use blockstate_core::Result;
use blockstate_storage::Snapshot;
use tracing::debug;

/// One step of batch processing.
pub trait Stage: Send + Sync {
    /// Returns a name for logging.
    fn name(&self) -> &str;

    /// Processes a batch against the shared context.
    fn process(&self, action: &Action, snapshot: &mut Snapshot) -> Result<()>;
}

/// An ordered list of stages.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    pub fn push(&mut self, stage: impl Stage + 'static) {
        self.stages.push(Box::new(stage));
    }

    /// Appends a boxed stage.
    pub fn push_boxed(&mut self, stage: Box<dyn Stage>) {
        self.stages.push(stage);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns the stage names in run order.
    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs every stage in order, stopping at the first failure.
    pub fn run(&self, action: &Action, snapshot: &mut Snapshot) -> Result<()> {
        for stage in &self.stages {
            debug!(stage = stage.name(), block = action.block_number, "running stage");
            stage.process(action, snapshot)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockstate_core::schema::SchemaRegistry;
    use blockstate_core::Error;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl Stage for Recording {
        fn name(&self) -> &str {
            self.name
        }

        fn process(&self, _action: &Action, _snapshot: &mut Snapshot) -> Result<()> {
            self.log.lock().push(self.name);
            if self.fail {
                return Err(Error::generic("boom"));
            }
            Ok(())
        }
    }

    fn stage(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>, fail: bool) -> Recording {
        Recording {
            name,
            log: Arc::clone(log),
            fail,
        }
    }

    #[test]
    fn test_pipeline_runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.push(stage("a", &log, false));
        pipeline.push(stage("b", &log, false));
        assert_eq!(pipeline.names(), vec!["a", "b"]);

        let mut snap = Snapshot::new(Arc::new(SchemaRegistry::new()), 4).unwrap();
        pipeline.run(&Action::new(1, Vec::new()), &mut snap).unwrap();
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[test]
    fn test_pipeline_stops_at_first_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.push(stage("a", &log, true));
        pipeline.push(stage("b", &log, false));

        let mut snap = Snapshot::new(Arc::new(SchemaRegistry::new()), 4).unwrap();
        assert!(pipeline.run(&Action::new(1, Vec::new()), &mut snap).is_err());
        assert_eq!(*log.lock(), vec!["a"]);
    }
}
