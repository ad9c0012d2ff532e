//! Property-based tests for descriptor validation and planning.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated descriptors and repository states.

use proptest::prelude::*;

use gitensure::core::descriptor::{
    Descriptor, DescriptorError, Mode, RawCommitted, RawDescriptor, RawPull, RawPush,
    RawRequirements, Violation,
};
use gitensure::core::types::{BranchName, Oid, RefTarget};
use gitensure::engine::{
    check, decide, Action, Decision, Divergence, PushMode, RepositoryState, Subject,
};
use gitensure::git::{CurrentRef, GitState};

fn branch(name: &str) -> BranchName {
    BranchName::new(name).unwrap()
}

fn oid(n: u32) -> Oid {
    Oid::new(format!("{:040x}", n)).unwrap()
}

// =============================================================================
// Strategies
// =============================================================================

fn raw_pull() -> impl Strategy<Value = Option<RawPull>> {
    proptest::option::of((any::<bool>(), any::<bool>()).prop_map(|(rebase, autostash)| {
        RawPull {
            from: Some("origin/main".to_string()),
            rebase,
            autostash: rebase && autostash,
        }
    }))
}

fn raw_push() -> impl Strategy<Value = Option<RawPush>> {
    proptest::option::of(
        (prop::sample::select(vec!["origin/main", "origin/prod"]), 0..3u8).prop_map(
            |(to, strategy)| RawPush {
                to: Some(to.to_string()),
                force: strategy == 1,
                force_with_lease: strategy == 2,
            },
        ),
    )
}

fn raw_requirements() -> impl Strategy<Value = RawRequirements> {
    (any::<bool>(), raw_pull(), raw_push(), any::<bool>()).prop_map(
        |(checked_out, pull, push, committed)| RawRequirements {
            checked_out,
            pull,
            push,
            committed: committed.then(|| RawCommitted {
                message: Some("sync".to_string()),
            }),
        },
    )
}

/// A valid descriptor under ensure.
fn ensure_descriptor() -> impl Strategy<Value = Descriptor> {
    (
        proptest::option::of(prop::sample::select(vec!["main", "feature"])),
        raw_requirements(),
    )
        .prop_map(|(name, requirements)| {
            Descriptor::parse(RawDescriptor {
                branch: name.map(str::to_string),
                ensure: Some(requirements),
                ..Default::default()
            })
            .unwrap()
        })
}

#[derive(Debug, Clone)]
struct Shape {
    head: u8,
    dirty: bool,
    in_progress: bool,
    pull: (usize, usize),
    push: (usize, usize),
}

fn shape() -> impl Strategy<Value = Shape> {
    (
        0..3u8,
        any::<bool>(),
        prop::bool::weighted(0.1),
        (0..3usize, 0..3usize),
        (0..3usize, 0..3usize),
    )
        .prop_map(|(head, dirty, in_progress, pull, push)| Shape {
            head,
            dirty,
            in_progress,
            pull,
            push,
        })
}

/// The state a probe would report for `descriptor` in a repository of `shape`.
fn state_for(descriptor: &Descriptor, shape: &Shape) -> RepositoryState {
    let current_ref = match shape.head {
        0 => CurrentRef::Branch(branch("main")),
        1 => CurrentRef::Branch(branch("feature")),
        _ => CurrentRef::Detached(oid(1)),
    };
    let subject_branch = descriptor
        .branch()
        .cloned()
        .or_else(|| current_ref.branch().cloned());

    let divergence = |raw: &str, (ahead, behind): (usize, usize)| {
        let (remote, name) = raw.split_once('/').unwrap();
        Divergence {
            target: RefTarget::remote(remote, branch(name)),
            target_oid: Some(oid(3)),
            exists: true,
            ahead,
            behind,
        }
    };

    RepositoryState {
        head_oid: Some(oid(1)),
        is_dirty: shape.dirty,
        has_upstream: false,
        upstream: None,
        operation: if shape.in_progress {
            GitState::Merge
        } else {
            GitState::Clean
        },
        conflicts: Vec::new(),
        stash_depth: 0,
        subject: Subject {
            branch: subject_branch,
            oid: Some(oid(2)),
            start_point: None,
        },
        pull: descriptor.pull().map(|p| divergence(p.from(), shape.pull)),
        push: descriptor.push().map(|p| divergence(p.to(), shape.push)),
        current_ref,
    }
}

fn rank(action: &Action) -> u8 {
    match action {
        Action::Checkout { .. } => 0,
        Action::Fetch { .. } => 1,
        Action::Stash => 2,
        Action::Rebase { .. } | Action::Merge { .. } => 3,
        Action::Unstash => 4,
        Action::Commit { .. } => 5,
        Action::Push { .. } => 6,
    }
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn both_modes_always_conflict(verify in raw_requirements(), ensure in raw_requirements()) {
        let raw = RawDescriptor {
            verify: Some(verify),
            ensure: Some(ensure),
            ..Default::default()
        };
        prop_assert!(matches!(Descriptor::parse(raw), Err(DescriptorError::ModeConflict)));
    }

    #[test]
    fn autostash_without_rebase_is_rejected(autostash in any::<bool>()) {
        let raw = RawDescriptor {
            verify: Some(RawRequirements {
                pull: Some(RawPull {
                    from: Some("origin/main".into()),
                    rebase: false,
                    autostash,
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let result = Descriptor::parse(raw);
        if autostash {
            let err = result.unwrap_err();
            prop_assert!(err.violations().contains(&Violation::AutostashWithoutRebase));
        } else {
            prop_assert!(result.is_ok());
        }
    }

    #[test]
    fn valid_documents_keep_their_mode(requirements in raw_requirements(), ensure in any::<bool>()) {
        let raw = if ensure {
            RawDescriptor { ensure: Some(requirements), ..Default::default() }
        } else {
            RawDescriptor { verify: Some(requirements), ..Default::default() }
        };
        let d = Descriptor::parse(raw).unwrap();
        prop_assert_eq!(d.mode(), if ensure { Mode::Ensure } else { Mode::Verify });
    }

    #[test]
    fn verify_passes_exactly_when_ensure_plans_nothing(d in ensure_descriptor(), shape in shape()) {
        let state = state_for(&d, &shape);
        let verify = d.with_mode(Mode::Verify);

        let verified = decide(&verify, &state).unwrap();
        let ensured = decide(&d, &state);

        prop_assert_eq!(verified.is_compliant(), check(&d, &state).is_empty());
        prop_assert_eq!(
            verified.is_compliant(),
            matches!(ensured, Ok(Decision::Compliant))
        );
    }

    #[test]
    fn plans_follow_the_fixed_order(d in ensure_descriptor(), shape in shape()) {
        let state = state_for(&d, &shape);
        if let Ok(Decision::Plan(plan)) = decide(&d, &state) {
            prop_assert!(!plan.is_empty());
            let ranks: Vec<u8> = plan.actions().iter().map(rank).collect();
            prop_assert!(ranks.windows(2).all(|w| w[0] < w[1]), "order: {:?}", plan.actions());
        }
    }

    #[test]
    fn plain_push_never_targets_a_diverged_destination_unreconciled(
        d in ensure_descriptor(),
        shape in shape(),
    ) {
        let state = state_for(&d, &shape);
        if let Ok(Decision::Plan(plan)) = decide(&d, &state) {
            let push = state.push.as_ref();
            let plain_push = plan.actions().iter().any(|a| matches!(
                a,
                Action::Push { mode: PushMode::FastForward, .. }
            ));
            if plain_push && push.map(|p| p.behind > 0).unwrap_or(false) {
                let target = &push.unwrap().target;
                let pulls_target = plan.actions().iter().any(|a| matches!(
                    a,
                    Action::Rebase { onto: t } | Action::Merge { from: t } if t == target
                ));
                prop_assert!(pulls_target, "plan: {:?}", plan.actions());
            }
        }
    }

    #[test]
    fn stash_only_wraps_a_dirty_rebase(d in ensure_descriptor(), shape in shape()) {
        let state = state_for(&d, &shape);
        if let Ok(Decision::Plan(plan)) = decide(&d, &state) {
            let stashes = plan.actions().iter().filter(|a| matches!(a, Action::Stash)).count();
            let unstashes = plan.actions().iter().filter(|a| matches!(a, Action::Unstash)).count();
            prop_assert_eq!(stashes, unstashes);
            if stashes > 0 {
                prop_assert!(state.is_dirty);
                prop_assert!(d.pull().map(|p| p.autostash()).unwrap_or(false));
            }
        }
    }

    #[test]
    fn in_progress_operation_blocks_every_plan(d in ensure_descriptor(), shape in shape()) {
        let state = state_for(&d, &Shape { in_progress: true, ..shape });
        prop_assert!(!matches!(decide(&d, &state), Ok(Decision::Plan(_))));
    }
}
