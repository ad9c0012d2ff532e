//! Test doubles for the engine: hand-built states, a scripted probe and a
//! runner that records invocations instead of running git.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::core::descriptor::Descriptor;
use crate::core::types::{BranchName, Oid, RefTarget};
use crate::engine::probe::{Divergence, ProbeError, RepositoryState, StateProbe, Subject};
use crate::git::{CurrentRef, GitOutput, GitRunner, GitState, RunnerError};

pub(crate) fn descriptor(json: &str) -> Descriptor {
    Descriptor::from_json(json).unwrap()
}

pub(crate) fn oid(n: u32) -> Oid {
    Oid::new(format!("{:040x}", n)).unwrap()
}

fn branch(name: &str) -> BranchName {
    BranchName::new(name).unwrap()
}

fn remote_target(raw: &str) -> RefTarget {
    let (remote, name) = raw.split_once('/').unwrap();
    RefTarget::remote(remote, branch(name))
}

/// Builds a [`RepositoryState`] without a repository.
pub(crate) struct StateBuilder {
    state: RepositoryState,
}

impl StateBuilder {
    /// HEAD on `name`, clean, subject = `name`.
    pub(crate) fn on(name: &str) -> Self {
        Self::with_head(CurrentRef::Branch(branch(name)), Some(oid(1)), Some(branch(name)))
    }

    /// Empty repository whose HEAD names `name`.
    pub(crate) fn unborn(name: &str) -> Self {
        Self::with_head(CurrentRef::Unborn(branch(name)), None, Some(branch(name)))
    }

    /// Detached HEAD, no branch named.
    pub(crate) fn detached() -> Self {
        Self::with_head(CurrentRef::Detached(oid(1)), Some(oid(1)), None)
    }

    fn with_head(current_ref: CurrentRef, head: Option<Oid>, subject: Option<BranchName>) -> Self {
        Self {
            state: RepositoryState {
                current_ref,
                head_oid: head.clone(),
                is_dirty: false,
                has_upstream: false,
                upstream: None,
                operation: GitState::Clean,
                conflicts: Vec::new(),
                stash_depth: 0,
                subject: Subject {
                    branch: subject,
                    oid: head,
                    start_point: None,
                },
                pull: None,
                push: None,
            },
        }
    }

    /// The descriptor names another (local) branch.
    pub(crate) fn subject(mut self, name: &str) -> Self {
        self.state.subject = Subject {
            branch: Some(branch(name)),
            oid: Some(oid(2)),
            start_point: None,
        };
        self
    }

    /// The subject exists only as `<remote>/<subject>`.
    pub(crate) fn subject_from_remote(mut self, remote: &str) -> Self {
        let name = self.state.subject.branch.clone().unwrap();
        self.state.subject.start_point = Some(RefTarget::remote(remote, name));
        self
    }

    pub(crate) fn dirty(mut self) -> Self {
        self.state.is_dirty = true;
        self
    }

    pub(crate) fn operation(mut self, operation: GitState) -> Self {
        self.state.operation = operation;
        self
    }

    pub(crate) fn conflicts(mut self, paths: &[&str]) -> Self {
        self.state.conflicts = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    pub(crate) fn stash_depth(mut self, depth: usize) -> Self {
        self.state.stash_depth = depth;
        self
    }

    /// Pull from a remote-tracking ref written `remote/branch`.
    pub(crate) fn pull(mut self, raw: &str, ahead: usize, behind: usize) -> Self {
        self.state.pull = Some(Divergence {
            target: remote_target(raw),
            target_oid: Some(oid(3)),
            exists: true,
            ahead,
            behind,
        });
        self
    }

    /// Pull from `remote/branch` with no tracking ref fetched yet.
    pub(crate) fn pull_unfetched(mut self, raw: &str, ahead: usize) -> Self {
        self.state.pull = Some(Divergence {
            target: remote_target(raw),
            target_oid: None,
            exists: false,
            ahead,
            behind: 0,
        });
        self
    }

    pub(crate) fn pull_local(mut self, name: &str, ahead: usize, behind: usize) -> Self {
        self.state.pull = Some(Divergence {
            target: RefTarget::local(branch(name)),
            target_oid: Some(oid(3)),
            exists: true,
            ahead,
            behind,
        });
        self
    }

    pub(crate) fn push(mut self, raw: &str, ahead: usize, behind: usize) -> Self {
        self.state.push = Some(Divergence {
            target: remote_target(raw),
            target_oid: Some(oid(4)),
            exists: true,
            ahead,
            behind,
        });
        self
    }

    /// Push destination that does not exist yet.
    pub(crate) fn push_missing(mut self, raw: &str, ahead: usize) -> Self {
        self.state.push = Some(Divergence {
            target: remote_target(raw),
            target_oid: None,
            exists: false,
            ahead,
            behind: 0,
        });
        self
    }

    pub(crate) fn build(self) -> RepositoryState {
        self.state
    }
}

/// Returns queued states in order, then keeps returning the last one.
pub(crate) struct ScriptedProbe {
    states: RefCell<VecDeque<RepositoryState>>,
    last: RefCell<Option<RepositoryState>>,
    calls: RefCell<usize>,
}

impl ScriptedProbe {
    pub(crate) fn new(states: Vec<RepositoryState>) -> Self {
        Self {
            states: RefCell::new(states.into()),
            last: RefCell::new(None),
            calls: RefCell::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        *self.calls.borrow()
    }
}

impl StateProbe for ScriptedProbe {
    fn probe(&self) -> Result<RepositoryState, ProbeError> {
        *self.calls.borrow_mut() += 1;
        if let Some(next) = self.states.borrow_mut().pop_front() {
            *self.last.borrow_mut() = Some(next.clone());
            return Ok(next);
        }
        self.last
            .borrow()
            .clone()
            .ok_or_else(|| ProbeError::RefNotFound {
                refname: "scripted probe exhausted".to_string(),
            })
    }
}

/// Records every invocation; answers success unless a failure was queued
/// for the subcommand.
#[derive(Default)]
pub(crate) struct RecordingRunner {
    calls: RefCell<Vec<Vec<String>>>,
    failures: RefCell<Vec<(String, GitOutput)>>,
}

impl RecordingRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The next invocation of `subcommand` returns `output`.
    pub(crate) fn respond(self, subcommand: &str, output: GitOutput) -> Self {
        self.failures
            .borrow_mut()
            .push((subcommand.to_string(), output));
        self
    }

    pub(crate) fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }

    /// First argument of every invocation.
    pub(crate) fn subcommands(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|c| c.first().cloned().unwrap_or_default())
            .collect()
    }
}

impl GitRunner for RecordingRunner {
    fn run(&self, args: &[String]) -> Result<GitOutput, RunnerError> {
        self.calls.borrow_mut().push(args.to_vec());
        let subcommand = args.first().map(String::as_str).unwrap_or("");
        let mut failures = self.failures.borrow_mut();
        if let Some(i) = failures.iter().position(|(s, _)| s == subcommand) {
            return Ok(failures.remove(i).1);
        }
        Ok(GitOutput::ok(""))
    }
}
