//! Baseline checkouts for break checking, done with the `git` binary: the
//! requested ref is materialized as a detached worktree in a temp directory
//! so that include roots and nested configs resolve exactly as on disk.

use std::path::{Path, PathBuf};
use std::process::Command;

use prototool_config::Error;

/// A detached worktree for one git ref, removed on drop.
pub struct GitWorktree {
    repo_root: PathBuf,
    path: PathBuf,
    _dir: tempfile::TempDir,
}

impl GitWorktree {
    /// Checks out `git_ref` (a branch or tag) from the repository containing
    /// `dir`.
    pub fn checkout(dir: &Path, git_ref: &str) -> Result<GitWorktree, Error> {
        let repo_root = repository_root(dir)?;
        let tmp = tempfile::Builder::new().prefix("prototool-break").tempdir()?;
        let path = tmp.path().join("worktree");

        run_git(
            &repo_root,
            &[
                "worktree",
                "add",
                "--detach",
                path.to_str()
                    .ok_or_else(|| Error::internal("worktree path is not valid UTF-8"))?,
                git_ref,
            ],
        )?;

        Ok(GitWorktree {
            repo_root,
            path,
            _dir: tmp,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Maps a path under the live repository to its twin in the worktree.
    pub fn map_path(&self, path: &Path) -> Result<PathBuf, Error> {
        let relative = path.strip_prefix(&self.repo_root).map_err(|_| {
            Error::internal(format!(
                "{} is outside the repository {}",
                path.display(),
                self.repo_root.display()
            ))
        })?;
        Ok(self.path.join(relative))
    }
}

impl Drop for GitWorktree {
    fn drop(&mut self) {
        let removed = Command::new("git")
            .current_dir(&self.repo_root)
            .args(["worktree", "remove", "--force"])
            .arg(&self.path)
            .output();
        if let Err(err) = removed {
            log::debug!("failed to remove worktree {}: {err}", self.path.display());
        }
    }
}

/// The toplevel of the repository containing `dir`.
pub fn repository_root(dir: &Path) -> Result<PathBuf, Error> {
    let output = Command::new("git")
        .current_dir(dir)
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .map_err(|err| Error::internal(format!("failed to invoke git: {err}")))?;
    if !output.status.success() {
        return Err(Error::internal(format!(
            "{} is not inside a git repository: {}",
            dir.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(PathBuf::from(
        String::from_utf8_lossy(&output.stdout).trim().to_string(),
    ))
}

fn run_git(repo_root: &Path, args: &[&str]) -> Result<(), Error> {
    let output = Command::new("git")
        .current_dir(repo_root)
        .args(args)
        .output()
        .map_err(|err| Error::internal(format!("failed to invoke git: {err}")))?;
    if !output.status.success() {
        return Err(Error::internal(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .current_dir(dir)
            .args(args)
            .env("GIT_AUTHOR_NAME", "test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .output()
            .unwrap();
        assert!(status.status.success(), "git {args:?} failed");
    }

    #[test]
    fn checks_out_a_ref_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path();
        git(repo, &["init", "--quiet", "--initial-branch", "main"]);
        fs::write(repo.join("a.proto"), "syntax = \"proto3\";\n").unwrap();
        git(repo, &["add", "."]);
        git(repo, &["commit", "--quiet", "-m", "initial"]);

        let worktree_path;
        {
            let worktree = GitWorktree::checkout(repo, "main").unwrap();
            worktree_path = worktree.path().to_path_buf();
            assert!(worktree_path.join("a.proto").is_file());

            let mapped = worktree.map_path(&worktree.repo_root().join("a.proto")).unwrap();
            assert_eq!(mapped, worktree_path.join("a.proto"));
        }
        assert!(!worktree_path.exists());
    }
}
