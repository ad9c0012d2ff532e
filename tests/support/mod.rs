//! Real-repository fixtures shared by the integration tests.
//!
//! Every [`Fixture`] is a temp directory holding a bare `origin.git`, a
//! clone `work` that reconciliation runs against, and a second clone
//! `other` standing in for a collaborator pushing upstream.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use gitensure::engine::Context;

pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    /// Origin with one commit on `main`, cloned twice.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let root = dir.path();

        git(root, &["init", "--bare", "-b", "main", "origin.git"]);
        git(root, &["init", "-b", "main", "seed"]);
        configure(&root.join("seed"));
        write(&root.join("seed"), "README.md", "# Test Repo\n");
        git(&root.join("seed"), &["add", "README.md"]);
        git(&root.join("seed"), &["commit", "-m", "Initial commit"]);
        git(&root.join("seed"), &["remote", "add", "origin", "../origin.git"]);
        git(&root.join("seed"), &["push", "origin", "main"]);

        for clone in ["work", "other"] {
            git(root, &["clone", "origin.git", clone]);
            configure(&root.join(clone));
        }

        Self { dir }
    }

    pub fn work(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    pub fn other(&self) -> PathBuf {
        self.dir.path().join("other")
    }

    pub fn origin(&self) -> PathBuf {
        self.dir.path().join("origin.git")
    }

    /// Engine context rooted at the work clone.
    pub fn ctx(&self) -> Context {
        Context {
            cwd: Some(self.work()),
            ..Default::default()
        }
    }

    /// Commit `count` new files in `other` on `branch` and push them.
    pub fn push_upstream(&self, branch: &str, count: usize) {
        let other = self.other();
        git(&other, &["fetch", "origin"]);
        if rev(&other, &format!("refs/heads/{}", branch)).is_none() {
            let start = if rev(&other, &format!("origin/{}", branch)).is_some() {
                format!("origin/{}", branch)
            } else {
                "origin/main".to_string()
            };
            git(&other, &["checkout", "-b", branch, &start]);
        } else {
            git(&other, &["checkout", branch]);
            git(&other, &["merge", "--ff-only", &format!("origin/{}", branch)]);
        }
        for i in 0..count {
            let name = format!("{}-upstream-{}.txt", branch, i);
            commit(&other, &name, "upstream\n", &format!("upstream {}", i));
        }
        git(&other, &["push", "origin", &format!("{0}:{0}", branch)]);
    }

    /// Tip of `branch` in the bare origin.
    pub fn origin_tip(&self, branch: &str) -> Option<String> {
        rev(&self.origin(), &format!("refs/heads/{}", branch))
    }
}

fn configure(dir: &Path) {
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "user.name", "Test User"]);
    // Prevent git from opening editors during tests
    git(dir, &["config", "core.editor", "true"]);
    git(dir, &["config", "pull.rebase", "false"]);
}

/// Run a git command in the given directory, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Resolve a revision, `None` if it does not exist.
pub fn rev(dir: &Path, revision: &str) -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--verify", "--quiet", revision])
        .current_dir(dir)
        .output()
        .expect("git rev-parse failed");
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub fn write(dir: &Path, path: &str, content: &str) {
    std::fs::write(dir.join(path), content).unwrap();
}

pub fn commit(dir: &Path, path: &str, content: &str, message: &str) -> String {
    write(dir, path, content);
    git(dir, &["add", path]);
    git(dir, &["commit", "-m", message]);
    git(dir, &["rev-parse", "HEAD"])
}

/// `git status --porcelain` output.
pub fn status(dir: &Path) -> String {
    git(dir, &["status", "--porcelain"])
}

/// Number of commits in `range`.
pub fn count(dir: &Path, range: &str) -> usize {
    git(dir, &["rev-list", "--count", range]).parse().unwrap()
}
