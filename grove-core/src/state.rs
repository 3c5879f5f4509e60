//! Connector run state machine.
//!
//! A pure, side-effect-free model of one connector execution. The state
//! machine takes events as input and produces a new state plus a list of
//! actions; `grove-connector` performs the actions (cache writes, collection,
//! output) and feeds the outcomes back as events.
//!
//! ```text
//! Idle ──lock──► Locked ──► Collecting ──┬──► ChronologicalPost ─────────┬──► Unlocked
//!                                        ├──► ReverseChronologicalPost ──┘
//!                                        └──(failure)────────────────────────► Unlocked
//! ```

use grove_types::LogOrder;

/// Lifecycle of a single connector run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Nothing attempted yet.
    Idle,
    /// Lock step done. `best_effort` is set when another execution held the
    /// lock and this one proceeds anyway.
    Locked {
        /// Whether the lock was contended.
        best_effort: bool,
    },
    /// Collector is paging through upstream data.
    Collecting {
        /// Whether the lock was contended.
        best_effort: bool,
    },
    /// Collection finished for a chronological connector.
    ChronologicalPost {
        /// Whether the lock was contended.
        best_effort: bool,
    },
    /// Collection finished for a reverse-chronological connector; the
    /// provisional pointer still has to be committed.
    ReverseChronologicalPost {
        /// Whether the lock was contended.
        best_effort: bool,
    },
    /// Run finished (successfully or not) and the lock has been handed back.
    Unlocked,
}

impl RunState {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    pub fn on_event(self, event: RunEvent) -> (Self, Vec<RunAction>) {
        match (self, event) {
            (Self::Idle, RunEvent::Started) => (Self::Idle, vec![RunAction::AcquireLock]),
            (Self::Idle, RunEvent::LockAcquired) => (
                Self::Locked { best_effort: false },
                vec![RunAction::Collect],
            ),
            (Self::Idle, RunEvent::LockContended { reason }) => (
                Self::Locked { best_effort: true },
                vec![RunAction::Warn { message: reason }, RunAction::Collect],
            ),

            (Self::Locked { best_effort }, RunEvent::CollectionStarted) => {
                (Self::Collecting { best_effort }, vec![])
            }

            (Self::Collecting { best_effort }, RunEvent::CollectionSucceeded { order }) => {
                match order {
                    LogOrder::Chronological => (
                        Self::ChronologicalPost { best_effort },
                        vec![RunAction::CommitChronological],
                    ),
                    LogOrder::ReverseChronological => (
                        Self::ReverseChronologicalPost { best_effort },
                        vec![RunAction::CommitReverseChronological],
                    ),
                }
            }
            (Self::Collecting { .. }, RunEvent::CollectionFailed { error }) => (
                Self::Unlocked,
                vec![RunAction::Release, RunAction::Fail { error }],
            ),

            (
                Self::ChronologicalPost { .. } | Self::ReverseChronologicalPost { .. },
                RunEvent::CommitSucceeded,
            ) => (Self::Unlocked, vec![RunAction::Release, RunAction::Complete]),
            (
                Self::ChronologicalPost { .. } | Self::ReverseChronologicalPost { .. },
                RunEvent::CommitFailed { error },
            ) => (
                Self::Unlocked,
                vec![RunAction::Release, RunAction::Fail { error }],
            ),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Whether this run proceeded without holding the lock.
    pub fn is_best_effort(&self) -> bool {
        matches!(
            self,
            Self::Locked { best_effort: true }
                | Self::Collecting { best_effort: true }
                | Self::ChronologicalPost { best_effort: true }
                | Self::ReverseChronologicalPost { best_effort: true }
        )
    }

    /// Whether the run has reached its terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Unlocked)
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcomes fed back into the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// The run was requested.
    Started,
    /// The execution lock was acquired.
    LockAcquired,
    /// Another execution holds the lock (or the attempt failed).
    LockContended {
        /// Why the lock could not be taken.
        reason: String,
    },
    /// The collector has been invoked.
    CollectionStarted,
    /// The collector returned successfully.
    CollectionSucceeded {
        /// The collector's declared log order.
        order: LogOrder,
    },
    /// The collector (or a save it triggered) failed.
    CollectionFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Post-collection bookkeeping finished.
    CommitSucceeded,
    /// Post-collection bookkeeping failed.
    CommitFailed {
        /// Error message describing the failure.
        error: String,
    },
}

/// Side effects requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunAction {
    /// Try to take the execution lock.
    AcquireLock,
    /// Log a non-fatal warning.
    Warn {
        /// Message to log.
        message: String,
    },
    /// Invoke the collector.
    Collect,
    /// Finish a chronological collection.
    CommitChronological,
    /// Swap the provisional pointer in and clear the window.
    CommitReverseChronological,
    /// Release the lock if this execution holds it.
    Release,
    /// Report success.
    Complete,
    /// Report failure.
    Fail {
        /// Error message describing the failure.
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(events: Vec<RunEvent>) -> (RunState, Vec<RunAction>) {
        let mut state = RunState::new();
        let mut all = Vec::new();
        for event in events {
            let (next, actions) = state.on_event(event);
            state = next;
            all.extend(actions);
        }
        (state, all)
    }

    #[test]
    fn start_requests_lock() {
        let (state, actions) = RunState::new().on_event(RunEvent::Started);
        assert_eq!(state, RunState::Idle);
        assert_eq!(actions, vec![RunAction::AcquireLock]);
    }

    #[test]
    fn chronological_happy_path() {
        let (state, actions) = drive(vec![
            RunEvent::Started,
            RunEvent::LockAcquired,
            RunEvent::CollectionStarted,
            RunEvent::CollectionSucceeded {
                order: LogOrder::Chronological,
            },
            RunEvent::CommitSucceeded,
        ]);

        assert!(state.is_finished());
        assert_eq!(
            actions,
            vec![
                RunAction::AcquireLock,
                RunAction::Collect,
                RunAction::CommitChronological,
                RunAction::Release,
                RunAction::Complete,
            ]
        );
    }

    #[test]
    fn reverse_chronological_commits_window() {
        let (state, actions) = drive(vec![
            RunEvent::Started,
            RunEvent::LockAcquired,
            RunEvent::CollectionStarted,
            RunEvent::CollectionSucceeded {
                order: LogOrder::ReverseChronological,
            },
        ]);

        assert_eq!(
            state,
            RunState::ReverseChronologicalPost { best_effort: false }
        );
        assert_eq!(actions.last(), Some(&RunAction::CommitReverseChronological));
    }

    #[test]
    fn contended_lock_warns_and_still_collects() {
        let (state, actions) = RunState::Idle.on_event(RunEvent::LockContended {
            reason: "held until 123".into(),
        });

        assert!(state.is_best_effort());
        assert_eq!(
            actions,
            vec![
                RunAction::Warn {
                    message: "held until 123".into()
                },
                RunAction::Collect,
            ]
        );
    }

    #[test]
    fn collection_failure_short_circuits_to_unlock() {
        let (state, actions) = drive(vec![
            RunEvent::Started,
            RunEvent::LockAcquired,
            RunEvent::CollectionStarted,
            RunEvent::CollectionFailed {
                error: "output down".into(),
            },
        ]);

        assert_eq!(state, RunState::Unlocked);
        assert!(!actions.contains(&RunAction::CommitChronological));
        assert!(!actions.contains(&RunAction::CommitReverseChronological));
        assert_eq!(
            &actions[actions.len() - 2..],
            &[
                RunAction::Release,
                RunAction::Fail {
                    error: "output down".into()
                }
            ]
        );
    }

    #[test]
    fn commit_failure_still_releases() {
        let (state, actions) = drive(vec![
            RunEvent::Started,
            RunEvent::LockAcquired,
            RunEvent::CollectionStarted,
            RunEvent::CollectionSucceeded {
                order: LogOrder::ReverseChronological,
            },
            RunEvent::CommitFailed {
                error: "cache down".into(),
            },
        ]);

        assert!(state.is_finished());
        assert!(actions.contains(&RunAction::Release));
    }

    #[test]
    fn best_effort_flag_survives_collection() {
        let (state, _) = drive(vec![
            RunEvent::LockContended {
                reason: "busy".into(),
            },
            RunEvent::CollectionStarted,
        ]);
        assert_eq!(state, RunState::Collecting { best_effort: true });
    }

    #[test]
    fn invalid_transitions_are_ignored() {
        let (state, actions) = RunState::Idle.on_event(RunEvent::CommitSucceeded);
        assert_eq!(state, RunState::Idle);
        assert!(actions.is_empty());

        let (state, actions) = RunState::Unlocked.on_event(RunEvent::LockAcquired);
        assert_eq!(state, RunState::Unlocked);
        assert!(actions.is_empty());
    }
}
