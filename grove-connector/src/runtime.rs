//! Connector runs.
//!
//! [`Connector::run`] drives the [`RunState`] machine from `grove-core`,
//! performing each requested action against a fresh [`Session`] and feeding
//! the outcome back as an event until the machine stops asking.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use grove_cache::Cache;
use grove_core::{RunAction, RunEvent, RunState};
use grove_types::ConnectorIdentity;

use crate::clock::{Clock, SystemClock};
use crate::collector::Collector;
use crate::error::{ConnectorError, Result};
use crate::lock::DEFAULT_LOCK_DURATION;
use crate::output::Output;
use crate::pipeline::{Pipeline, Processor};
use crate::session::{Session, SessionParts};

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Connector name.
    pub connector: String,
    /// Run descriptor.
    pub descriptor: String,
    /// Pages written.
    pub pages: u64,
    /// Entries delivered to outputs.
    pub entries_written: u64,
    /// Durable pointer after the run.
    pub pointer: String,
    /// Whether the run proceeded without holding the lock.
    pub best_effort: bool,
}

/// A configured collection target.
pub struct Connector {
    name: String,
    identity: ConnectorIdentity,
    cache: Arc<dyn Cache>,
    collector: Box<dyn Collector>,
    pipeline: Pipeline,
    outputs: Vec<Arc<dyn Output>>,
    lock_duration: Duration,
    clock: Arc<dyn Clock>,
}

impl Connector {
    /// Create a connector with no processors and no outputs.
    pub fn new(
        name: impl Into<String>,
        identity: ConnectorIdentity,
        cache: Arc<dyn Cache>,
        collector: Box<dyn Collector>,
    ) -> Self {
        Self {
            name: name.into(),
            identity,
            cache,
            collector,
            pipeline: Pipeline::default(),
            outputs: Vec::new(),
            lock_duration: DEFAULT_LOCK_DURATION,
            clock: Arc::new(SystemClock),
        }
    }

    /// Append a processing stage.
    pub fn with_processor(mut self, processor: Box<dyn Processor>) -> Self {
        self.pipeline.push(processor);
        self
    }

    /// Add a destination.
    pub fn with_output(mut self, output: Arc<dyn Output>) -> Self {
        self.outputs.push(output);
        self
    }

    /// Set the lock lifetime.
    pub fn with_lock_duration(mut self, duration: Duration) -> Self {
        self.lock_duration = duration;
        self
    }

    /// Use a specific time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Connector name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connector identity.
    pub fn identity(&self) -> &ConnectorIdentity {
        &self.identity
    }

    /// Run one collection.
    ///
    /// Lock contention is reported as a warning and the run continues in
    /// best-effort mode. A failed collection or commit releases the lock (if
    /// held) and returns the original error.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let descriptor = uuid::Uuid::new_v4().to_string();
        let order = self.collector.log_order();
        let mut session = Session::new(SessionParts {
            identity: self.identity.clone(),
            cache: self.cache.clone(),
            pointer_path: self.collector.pointer_path().clone(),
            order,
            default_pointer: self.collector.default_pointer(),
            lock_duration: self.lock_duration,
            clock: self.clock.clone(),
            pipeline: std::mem::take(&mut self.pipeline),
            outputs: self.outputs.clone(),
            descriptor: descriptor.clone(),
        });

        tracing::info!("Starting run {} of {} ({})", descriptor, self.name, order);

        let mut state = RunState::new();
        let mut queue = VecDeque::new();
        let mut failure: Option<ConnectorError> = None;
        let mut best_effort = false;
        step(&mut state, &mut queue, RunEvent::Started);

        while let Some(action) = queue.pop_front() {
            match action {
                RunAction::AcquireLock => match session.lock.acquire().await {
                    Ok(()) => step(&mut state, &mut queue, RunEvent::LockAcquired),
                    Err(e) => step(
                        &mut state,
                        &mut queue,
                        RunEvent::LockContended {
                            reason: e.to_string(),
                        },
                    ),
                },
                RunAction::Warn { message } => {
                    best_effort = true;
                    tracing::warn!("{}: proceeding without lock: {}", self.name, message);
                }
                RunAction::Collect => {
                    step(&mut state, &mut queue, RunEvent::CollectionStarted);
                    let event = match self.collector.collect(&mut session).await {
                        Ok(()) => RunEvent::CollectionSucceeded { order },
                        Err(e) => {
                            let event = RunEvent::CollectionFailed {
                                error: e.to_string(),
                            };
                            failure = Some(e);
                            event
                        }
                    };
                    step(&mut state, &mut queue, event);
                }
                RunAction::CommitChronological => {
                    step(&mut state, &mut queue, RunEvent::CommitSucceeded);
                }
                RunAction::CommitReverseChronological => {
                    let event = match session.commit_window().await {
                        Ok(()) => RunEvent::CommitSucceeded,
                        Err(e) => {
                            let event = RunEvent::CommitFailed {
                                error: e.to_string(),
                            };
                            failure = Some(e);
                            event
                        }
                    };
                    step(&mut state, &mut queue, event);
                }
                RunAction::Release => {
                    if session.lock.is_held() {
                        if let Err(e) = session.lock.release().await {
                            tracing::error!("{}: failed to release lock: {}", self.name, e);
                            failure.get_or_insert(e);
                        }
                    }
                }
                RunAction::Complete => {
                    tracing::info!(
                        "Finished run {} of {}: {} pages, {} entries",
                        descriptor,
                        self.name,
                        session.pages(),
                        session.entries_written()
                    );
                }
                RunAction::Fail { error } => {
                    tracing::error!("Run {} of {} failed: {}", descriptor, self.name, error);
                }
            }
        }

        let pointer = match failure {
            None => Some(session.pointer().await),
            Some(_) => None,
        };
        let pages = session.pages();
        let entries_written = session.entries_written();
        self.pipeline = session.into_pipeline();

        if let Some(e) = failure {
            return Err(e);
        }
        Ok(RunSummary {
            connector: self.name.clone(),
            descriptor,
            pages,
            entries_written,
            pointer: pointer.transpose()?.unwrap_or_default(),
            best_effort,
        })
    }
}

fn step(state: &mut RunState, queue: &mut VecDeque<RunAction>, event: RunEvent) {
    let (next, actions) = std::mem::take(state).on_event(event);
    *state = next;
    queue.extend(actions);
}
