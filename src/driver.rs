//! Shells out to the version-control executable and returns captured
//! stdout, plus a [`Repository`] facade tying the driver to [`crate::parse`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::errors::{Error, Result};
use crate::parse::{self, ChangeSet, ChangeSetDetail, FileStatus};

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub executable: PathBuf,
}

impl DriverConfig {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        DriverConfig {
            executable: executable.into(),
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig::new("git")
    }
}

#[async_trait]
pub trait CommandDriver: Send + Sync {
    async fn execute(
        &self,
        working_dir: &Path,
        args: &[&str],
        cancel: &CancellationToken,
    ) -> Result<String>;
}

/// No shell is invoked; argument vectors go straight to `exec`. Locale is
/// forced to `C` so the commit-date format the parser expects holds
/// regardless of the host's configured locale.
pub struct ProcessCommandDriver {
    config: DriverConfig,
}

impl ProcessCommandDriver {
    pub fn new(config: DriverConfig) -> Self {
        ProcessCommandDriver { config }
    }
}

#[async_trait]
impl CommandDriver for ProcessCommandDriver {
    async fn execute(
        &self,
        working_dir: &Path,
        args: &[&str],
        cancel: &CancellationToken,
    ) -> Result<String> {
        tracing::debug!(cwd = %working_dir.display(), ?args, "invoking command driver");

        let mut cmd = Command::new(&self.config.executable);
        cmd.args(args)
            .current_dir(working_dir)
            .env("LC_ALL", "C")
            .env("LANG", "C")
            .kill_on_drop(true);

        let driver_error = |reason: String| Error::Driver {
            program: self.config.executable.to_string_lossy().into_owned(),
            args: args.join(" "),
            cwd: working_dir.to_path_buf(),
            reason,
        };

        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = cmd.output() => result.map_err(|e| driver_error(e.to_string()))?,
        };

        if !output.status.success() {
            let stderr: String = String::from_utf8_lossy(&output.stderr)
                .chars()
                .take(2000)
                .collect();
            tracing::warn!(status = ?output.status.code(), stderr = %stderr, "command driver exited non-zero");
            return Err(driver_error(stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

pub struct Repository<D: CommandDriver> {
    driver: D,
    working_dir: PathBuf,
}

impl<D: CommandDriver> Repository<D> {
    pub fn new(driver: D, working_dir: impl Into<PathBuf>) -> Self {
        Repository {
            driver,
            working_dir: working_dir.into(),
        }
    }

    async fn run(&self, args: &[&str], cancel: &CancellationToken) -> Result<String> {
        self.driver.execute(&self.working_dir, args, cancel).await
    }

    pub async fn current_id(&self, cancel: &CancellationToken) -> Result<String> {
        Ok(self.run(&["rev-parse", "HEAD"], cancel).await?.trim().to_string())
    }

    pub async fn initialize(&self, cancel: &CancellationToken) -> Result<()> {
        self.run(&["init"], cancel).await?;
        self.run(&["config", "core.autocrlf", "true"], cancel).await?;
        Ok(())
    }

    /// Whitespace-only `branch` stdout means no branches exist yet.
    pub async fn is_empty(&self, cancel: &CancellationToken) -> Result<bool> {
        let out = self.run(&["branch"], cancel).await?;
        Ok(out.trim().is_empty())
    }

    pub async fn status(&self, cancel: &CancellationToken) -> Result<Vec<FileStatus>> {
        let out = self.run(&["status", "--porcelain"], cancel).await?;
        parse::parse_status(&out).collect()
    }

    pub async fn log(&self, cancel: &CancellationToken) -> Result<Vec<ChangeSet>> {
        let out = self.run(&["log", "--all"], cancel).await?;
        parse::parse_log(&out).collect()
    }

    pub async fn log_page(
        &self,
        skip: u32,
        take: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChangeSet>> {
        let skip = skip.to_string();
        let take = take.to_string();
        let out = self
            .run(&["log", "--all", "--skip", &skip, "-n", &take], cancel)
            .await?;
        parse::parse_log(&out).collect()
    }

    pub async fn add(&self, path: &str, cancel: &CancellationToken) -> Result<()> {
        self.run(&["add", path], cancel).await?;
        Ok(())
    }

    pub async fn add_all(&self, cancel: &CancellationToken) -> Result<()> {
        self.run(&["add", "."], cancel).await?;
        Ok(())
    }

    pub async fn remove_cached(&self, path: &str, cancel: &CancellationToken) -> Result<()> {
        self.run(&["rm", path, "--cached"], cancel).await?;
        Ok(())
    }

    /// Returns `None` when stdout contains `working directory clean`;
    /// `show HEAD` is then not invoked at all.
    pub async fn commit(
        &self,
        message: &str,
        author: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ChangeSetDetail>> {
        let out = self
            .run(&["commit", "-m", message, &format!("--author={author}")], cancel)
            .await?;
        if out.contains("working directory clean") {
            return Ok(None);
        }
        let show_out = self.run(&["show", "HEAD"], cancel).await?;
        Ok(Some(parse::parse_show(&show_out, true)?))
    }

    pub async fn show_head(&self, cancel: &CancellationToken) -> Result<ChangeSetDetail> {
        let out = self.run(&["show", "HEAD"], cancel).await?;
        parse::parse_show(&out, true)
    }

    pub async fn show(&self, id: &str, cancel: &CancellationToken) -> Result<ChangeSetDetail> {
        let numstat_out = self
            .run(&["show", id, "-m", "-p", "--numstat", "--shortstat"], cancel)
            .await?;
        let mut detail = parse::parse_show(&numstat_out, true)?;

        let name_status_out = self
            .run(&["show", id, "-m", "--name-status", "--format=%H"], cancel)
            .await?;
        parse::populate_name_status(&name_status_out, &mut detail);
        Ok(detail)
    }

    pub async fn checkout(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        self.run(&["checkout", id, "--force"], cancel).await?;
        Ok(())
    }

    /// `None` when `status` is empty; otherwise stages everything and diffs
    /// staged changes.
    pub async fn working_changes(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<ChangeSetDetail>> {
        let status = self.status(cancel).await?;
        if status.is_empty() {
            return Ok(None);
        }
        self.add_all(cancel).await?;

        let numstat_out = self
            .run(
                &[
                    "diff",
                    "--no-ext-diff",
                    "-p",
                    "--numstat",
                    "--shortstat",
                    "--staged",
                ],
                cancel,
            )
            .await?;
        let name_status_out = self
            .run(&["diff", "--name-status", "--staged"], cancel)
            .await?;
        Ok(Some(parse::parse_working_diff(&numstat_out, &name_status_out)?))
    }
}
