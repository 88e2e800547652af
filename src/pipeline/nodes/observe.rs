//! ObserveNode — progress reporting stage.
//!
//! Passes every outcome through unchanged while counting values and errors.
//! A report goes to the reporter whenever the cadence is due on the running
//! total, and a final one when upstream ends if the last outcomes were not
//! reported yet.

use crate::error::Result;
use crate::pipeline::compiler::ExecutionBuilder;
use crate::pipeline::kind::StageKind;
use crate::pipeline::node::{Describe, Runnable, Stage, StageDescriptor};
use crate::pipeline::report::{Cadence, ProgressReport, ProgressReporter};
use crate::pipeline::stream::Stream;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

/// Observe node.
pub struct ObserveNode<T> {
    upstream: Stream<T>,
    label: String,
    /// `None` takes the cadence of the engine config
    cadence: Option<Cadence>,
    reporter: Arc<dyn ProgressReporter>,
}

impl<T> ObserveNode<T> {
    pub fn new(
        upstream: Stream<T>,
        label: String,
        cadence: Option<Cadence>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            upstream,
            label,
            cadence,
            reporter,
        }
    }
}

impl<T: Send + 'static> Describe for ObserveNode<T> {
    fn descriptor(&self) -> StageDescriptor {
        let descriptor =
            StageDescriptor::new(StageKind::Observe, "observe").label(self.label.clone());
        match self.cadence {
            Some(cadence) => descriptor.param("cadence", cadence),
            None => descriptor,
        }
    }

    fn upstream(&self) -> Option<&dyn Describe> {
        Some(&self.upstream)
    }
}

impl<T: Send + 'static> Stage<T> for ObserveNode<T> {
    fn build(&self, builder: &ExecutionBuilder<'_>) -> Runnable<T> {
        Box::new(ObserveIter {
            upstream: Some(builder.build(&self.upstream)),
            label: self.label.clone(),
            cadence: self.cadence.unwrap_or(builder.config().observe.cadence),
            reporter: self.reporter.clone(),
            yielded: 0,
            errors: 0,
            last_reported: 0,
            started: None,
        })
    }
}

struct ObserveIter<T> {
    upstream: Option<Runnable<T>>,
    label: String,
    cadence: Cadence,
    reporter: Arc<dyn ProgressReporter>,
    yielded: u64,
    errors: u64,
    last_reported: u64,
    /// Set on the first pull
    started: Option<(Instant, DateTime<Utc>)>,
}

impl<T> ObserveIter<T> {
    fn emit(&mut self, finished: bool) {
        let Some((started, started_at)) = self.started else {
            return;
        };
        let report = ProgressReport {
            label: self.label.clone(),
            yielded: self.yielded,
            errors: self.errors,
            elapsed: started.elapsed(),
            started_at,
            finished,
        };
        self.last_reported = report.total();
        self.reporter.report(&report);
    }
}

impl<T> Iterator for ObserveIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let upstream = self.upstream.as_mut()?;
        if self.started.is_none() {
            self.started = Some((Instant::now(), Utc::now()));
        }

        let outcome = upstream.next();
        match &outcome {
            Some(Ok(_)) => self.yielded += 1,
            Some(Err(_)) => self.errors += 1,
            None => {
                self.upstream = None;
                if self.yielded + self.errors != self.last_reported {
                    self.emit(true);
                }
                return None;
            }
        }

        if self.cadence.is_due(self.yielded + self.errors) {
            self.emit(false);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::pipeline::report::MockProgressReporter;
    use mockall::predicate::function;
    use mockall::Sequence;

    #[test]
    fn test_logarithmic_reports_and_final() {
        let mut reporter = MockProgressReporter::new();
        let mut seq = Sequence::new();
        for expected in [1u64, 2, 4, 8] {
            reporter
                .expect_report()
                .with(function(move |r: &ProgressReport| {
                    r.yielded == expected && !r.finished
                }))
                .times(1)
                .in_sequence(&mut seq)
                .return_const(());
        }
        reporter
            .expect_report()
            .with(function(|r: &ProgressReport| r.yielded == 10 && r.finished))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let stream = Stream::new(0..10)
            .observe_with("numbers", Cadence::Logarithmic, Arc::new(reporter))
            .unwrap();
        let out: Vec<i32> = stream.iter().map(|r| r.unwrap()).collect();
        assert_eq!(out, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_no_final_report_when_up_to_date() {
        let mut reporter = MockProgressReporter::new();
        reporter
            .expect_report()
            .withf(|r| r.label == "pairs" && !r.finished)
            .times(2)
            .return_const(());

        let stream = Stream::new(0..4)
            .observe_with("pairs", Cadence::Every(2), Arc::new(reporter))
            .unwrap();
        assert_eq!(stream.count().unwrap(), 4);
    }

    #[test]
    fn test_counts_errors_without_altering_them() {
        let mut reporter = MockProgressReporter::new();
        reporter
            .expect_report()
            .withf(|r| r.finished)
            .times(1)
            .returning(|r| {
                assert_eq!(r.yielded, 2);
                assert_eq!(r.errors, 1);
            });
        reporter.expect_report().withf(|r| !r.finished).return_const(());

        let node = ObserveNode::new(
            Stream::try_from_fn(|| vec![Ok(1), Err("bad"), Ok(2)]),
            "mixed".to_string(),
            Some(Cadence::Every(100)),
            Arc::new(reporter),
        );
        let config = EngineConfig::default();
        let outcomes: Vec<Result<i32>> = node.build(&ExecutionBuilder::new(&config)).collect();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[1].is_err());
    }

    #[test]
    fn test_empty_stream_reports_nothing() {
        let mut reporter = MockProgressReporter::new();
        reporter.expect_report().times(0);
        let stream = Stream::new(Vec::<u8>::new())
            .observe_with("empty", Cadence::Logarithmic, Arc::new(reporter))
            .unwrap();
        assert_eq!(stream.count().unwrap(), 0);
    }

    #[test]
    fn test_invalid_cadence_rejected() {
        let reporter = MockProgressReporter::new();
        assert!(Stream::new(vec![1])
            .observe_with("x", Cadence::Every(0), Arc::new(reporter))
            .is_err());
    }
}
