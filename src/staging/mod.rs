//! On-disk artifact lifecycle
//!
//! A staged template directory moves through
//! `absent -> cleaned -> built -> staged -> promoted -> old retained | old deleted`.
//! Promotion renames the live directory aside before moving the staged one into
//! place, so valid content is always reachable under either the live name or the
//! `_old` name.

use std::io;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::descriptor::CleanOptions;
use crate::error::{CleanupError, PromotionStep, StagingPromotionError};
use crate::utils::is_subpath;

/// Client build output
pub const OUTPUT_DIR: &str = "dist";

/// Server-render build output
pub const SERVER_OUTPUT_DIR: &str = "dist_server";

/// Per-entry template renderings
pub const TEMPLATE_DIR: &str = "dist_ejs";

const STAGED_SUFFIX: &str = "_temp";
const RETIRED_SUFFIX: &str = "_old";

/// Name of the staging sibling of `dir`
pub fn staged_name(dir: &str) -> String {
    format!("{}{}", dir, STAGED_SUFFIX)
}

/// Name the live directory is parked under during promotion
pub fn retired_name(dir: &str) -> String {
    format!("{}{}", dir, RETIRED_SUFFIX)
}

/// Result of a cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Whether the directory existed at all
    pub existed: bool,
    /// Top-level matches removed
    pub removed: Vec<PathBuf>,
}

/// Result of a promotion
#[derive(Debug)]
pub enum PromoteOutcome {
    /// No staged directory; nothing changed
    NothingStaged,
    /// The staged directory is now live
    Promoted {
        live: PathBuf,
        retired: Option<RetiredCleanup>,
    },
}

/// Background deletion of the retired directory
#[derive(Debug)]
pub struct RetiredCleanup {
    pub path: PathBuf,
    handle: JoinHandle<io::Result<()>>,
}

impl RetiredCleanup {
    /// Wait for the deletion and report its outcome
    pub async fn finish(self) -> io::Result<()> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
        }
    }
}

/// Owns the output directories of one project
#[derive(Debug, Clone)]
pub struct StagingManager {
    root: PathBuf,
}

impl StagingManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Client output directory
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    /// Remove everything inside the client output directory
    pub async fn clean_output_directory(&self) -> Result<CleanReport, CleanupError> {
        let options = CleanOptions {
            dry: false,
            verbose: false,
            patterns: vec!["**/*".to_string()],
            allow_outside_project: false,
        };
        self.clean(&self.output_dir(), &options).await
    }

    /// Remove the entries of `dir` matched by the cleanup patterns.
    ///
    /// Patterns are relative to `dir`. A missing directory is already clean.
    pub async fn clean(
        &self,
        dir: &Path,
        options: &CleanOptions,
    ) -> Result<CleanReport, CleanupError> {
        let exists = fs::try_exists(dir)
            .await
            .map_err(|source| CleanupError::Inspect {
                path: dir.to_path_buf(),
                source,
            })?;
        if !exists {
            debug!("{} does not exist, nothing to clean", dir.display());
            return Ok(CleanReport::default());
        }

        if !options.allow_outside_project && !is_subpath(dir, &self.root) {
            return Err(CleanupError::OutsideProject {
                path: dir.to_path_buf(),
            });
        }

        let patterns = build_globset(&options.patterns)?;
        let targets = matching_entries(dir, &patterns)?;

        let mut report = CleanReport {
            existed: true,
            removed: Vec::new(),
        };

        for (path, is_dir) in targets {
            if options.verbose {
                info!("clean: removing {}", path.display());
            }
            if options.dry {
                report.removed.push(path);
                continue;
            }

            let removal = if is_dir {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };
            match removal {
                Ok(()) => report.removed.push(path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(CleanupError::Remove { path, source }),
            }
        }

        Ok(report)
    }

    /// Make the staged directory `staged` live under the name `live`.
    ///
    /// The two renames run strictly in sequence. The retired directory is deleted
    /// on a background task; its failure never fails the promotion.
    pub async fn promote(
        &self,
        staged: &str,
        live: &str,
    ) -> Result<PromoteOutcome, StagingPromotionError> {
        let staged_path = self.root.join(staged);
        let live_path = self.root.join(live);
        let retired_path = self.root.join(retired_name(live));

        let inspect = |path: &Path| {
            let path = path.to_path_buf();
            let staged_path = staged_path.clone();
            let live_path = live_path.clone();
            async move {
                fs::try_exists(&path)
                    .await
                    .map_err(|source| StagingPromotionError {
                        step: PromotionStep::Inspect,
                        from: staged_path,
                        to: live_path,
                        source,
                    })
            }
        };

        if !inspect(&staged_path).await? {
            debug!("{} does not exist, nothing to promote", staged_path.display());
            return Ok(PromoteOutcome::NothingStaged);
        }

        let live_exists = inspect(&live_path).await?;

        if live_exists {
            // A leftover from an earlier promotion is redundant while the live copy exists
            if inspect(&retired_path).await? {
                warn!("Removing stale {}", retired_path.display());
                fs::remove_dir_all(&retired_path)
                    .await
                    .map_err(|source| StagingPromotionError {
                        step: PromotionStep::RetireLive,
                        from: live_path.clone(),
                        to: retired_path.clone(),
                        source,
                    })?;
            }

            fs::rename(&live_path, &retired_path)
                .await
                .map_err(|source| StagingPromotionError {
                    step: PromotionStep::RetireLive,
                    from: live_path.clone(),
                    to: retired_path.clone(),
                    source,
                })?;
        }

        fs::rename(&staged_path, &live_path)
            .await
            .map_err(|source| StagingPromotionError {
                step: PromotionStep::PromoteStaged,
                from: staged_path.clone(),
                to: live_path.clone(),
                source,
            })?;

        info!("Promoted {} to {}", staged_path.display(), live_path.display());

        let retired = live_exists.then(|| {
            let path = retired_path.clone();
            let handle = tokio::spawn(async move {
                let result = fs::remove_dir_all(&path).await;
                if let Err(e) = &result {
                    warn!("Failed to delete {}: {}", path.display(), e);
                }
                result
            });
            RetiredCleanup {
                path: retired_path,
                handle,
            }
        });

        Ok(PromoteOutcome::Promoted {
            live: live_path,
            retired,
        })
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, CleanupError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let normalized = pattern.trim_start_matches("./");
        let glob = Glob::new(normalized).map_err(|source| CleanupError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| CleanupError::Pattern {
        pattern: patterns.join(", "),
        source,
    })
}

/// Outermost entries of `dir` matched by `patterns`; a matched directory is
/// removed whole, so its contents are not listed separately
fn matching_entries(dir: &Path, patterns: &GlobSet) -> Result<Vec<(PathBuf, bool)>, CleanupError> {
    let mut targets = Vec::new();
    let mut walker = WalkDir::new(dir).min_depth(1).into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|source| CleanupError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());

        if patterns.is_match(relative) {
            let is_dir = entry.file_type().is_dir();
            targets.push((entry.path().to_path_buf(), is_dir));
            if is_dir {
                walker.skip_current_dir();
            }
        }
    }

    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;
    use std::time::Duration;

    fn write(path: &Path, content: &str) {
        std_fs::create_dir_all(path.parent().unwrap()).unwrap();
        std_fs::write(path, content).unwrap();
    }

    fn listing(dir: &Path) -> Vec<String> {
        let mut files: Vec<String> = WalkDir::new(dir)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.path().strip_prefix(dir).unwrap().display().to_string())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_names() {
        assert_eq!(staged_name(TEMPLATE_DIR), "dist_ejs_temp");
        assert_eq!(retired_name(TEMPLATE_DIR), "dist_ejs_old");
    }

    #[tokio::test]
    async fn test_clean_missing_directory_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = StagingManager::new(tmp.path());

        let report = staging.clean_output_directory().await.unwrap();
        assert!(!report.existed);
        assert!(report.removed.is_empty());
    }

    #[tokio::test]
    async fn test_clean_removes_contents_but_keeps_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dist = tmp.path().join(OUTPUT_DIR);
        write(&dist.join("main.js"), "x");
        write(&dist.join("images").join("logo.png"), "x");
        write(&dist.join(".cache"), "x");

        let staging = StagingManager::new(tmp.path());
        let report = staging.clean_output_directory().await.unwrap();

        assert!(report.existed);
        assert_eq!(report.removed.len(), 3);
        assert!(dist.is_dir());
        assert!(listing(&dist).is_empty());
    }

    #[tokio::test]
    async fn test_clean_respects_patterns() {
        let tmp = tempfile::tempdir().unwrap();
        let dist = tmp.path().join(OUTPUT_DIR);
        write(&dist.join("main.js"), "x");
        write(&dist.join("main.css"), "x");

        let staging = StagingManager::new(tmp.path());
        let options = CleanOptions {
            dry: false,
            verbose: false,
            patterns: vec!["./*.js".to_string()],
            allow_outside_project: false,
        };
        staging.clean(&dist, &options).await.unwrap();

        assert_eq!(listing(&dist), vec!["main.css"]);
    }

    #[tokio::test]
    async fn test_clean_dry_run_keeps_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dist = tmp.path().join(OUTPUT_DIR);
        write(&dist.join("main.js"), "x");

        let staging = StagingManager::new(tmp.path());
        let options = CleanOptions {
            dry: true,
            verbose: true,
            patterns: vec!["**/*".to_string()],
            allow_outside_project: false,
        };
        let report = staging.clean(&dist, &options).await.unwrap();

        assert_eq!(report.removed.len(), 1);
        assert!(dist.join("main.js").exists());
    }

    #[tokio::test]
    async fn test_clean_outside_project_requires_permission() {
        let project = tempfile::tempdir().unwrap();
        let deploy = tempfile::tempdir().unwrap();
        write(&deploy.path().join("main.js"), "x");

        let staging = StagingManager::new(project.path());
        let mut options = CleanOptions {
            dry: false,
            verbose: false,
            patterns: vec!["**/*".to_string()],
            allow_outside_project: false,
        };
        assert!(matches!(
            staging.clean(deploy.path(), &options).await,
            Err(CleanupError::OutsideProject { .. })
        ));
        assert!(deploy.path().join("main.js").exists());

        options.allow_outside_project = true;
        staging.clean(deploy.path(), &options).await.unwrap();
        assert!(!deploy.path().join("main.js").exists());
    }

    #[tokio::test]
    async fn test_clean_rejects_bad_pattern() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join(OUTPUT_DIR).join("main.js"), "x");

        let staging = StagingManager::new(tmp.path());
        let options = CleanOptions {
            dry: false,
            verbose: false,
            patterns: vec!["[".to_string()],
            allow_outside_project: false,
        };
        let result = staging.clean(&staging.output_dir(), &options).await;
        assert!(matches!(result, Err(CleanupError::Pattern { .. })));
    }

    #[tokio::test]
    async fn test_promote_without_staged_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("dist_ejs").join("main.js.ejs"), "live");

        let staging = StagingManager::new(tmp.path());
        let outcome = staging.promote("dist_ejs_temp", "dist_ejs").await.unwrap();

        assert!(matches!(outcome, PromoteOutcome::NothingStaged));
        assert_eq!(listing(tmp.path()), vec!["dist_ejs", "dist_ejs/main.js.ejs"]);
    }

    #[tokio::test]
    async fn test_promote_replaces_live_directory() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("dist_ejs").join("old.js.ejs"), "live");
        write(&tmp.path().join("dist_ejs_temp").join("main.js.ejs"), "staged");
        write(&tmp.path().join("dist_ejs_temp").join("main.css.ejs"), "staged");

        let staging = StagingManager::new(tmp.path());
        let outcome = staging.promote("dist_ejs_temp", "dist_ejs").await.unwrap();

        let retired = match outcome {
            PromoteOutcome::Promoted { live, retired } => {
                assert_eq!(live, tmp.path().join("dist_ejs"));
                retired.expect("live directory should have been retired")
            }
            other => panic!("unexpected outcome {:?}", other),
        };

        assert_eq!(listing(&tmp.path().join("dist_ejs")), vec!["main.css.ejs", "main.js.ejs"]);
        assert_eq!(
            std_fs::read_to_string(tmp.path().join("dist_ejs").join("main.js.ejs")).unwrap(),
            "staged"
        );
        assert!(!tmp.path().join("dist_ejs_temp").exists());

        tokio::time::timeout(Duration::from_secs(5), retired.finish())
            .await
            .unwrap()
            .unwrap();
        assert!(!tmp.path().join("dist_ejs_old").exists());
    }

    #[tokio::test]
    async fn test_promote_without_live_directory() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("dist_ejs_temp").join("main.js.ejs"), "staged");

        let staging = StagingManager::new(tmp.path());
        let outcome = staging.promote("dist_ejs_temp", "dist_ejs").await.unwrap();

        assert!(matches!(outcome, PromoteOutcome::Promoted { retired: None, .. }));
        assert!(tmp.path().join("dist_ejs").join("main.js.ejs").exists());
    }

    #[tokio::test]
    async fn test_promote_replaces_stale_retired_directory() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("dist_ejs_old").join("stale.js.ejs"), "stale");
        write(&tmp.path().join("dist_ejs").join("old.js.ejs"), "live");
        write(&tmp.path().join("dist_ejs_temp").join("main.js.ejs"), "staged");

        let staging = StagingManager::new(tmp.path());
        let outcome = staging.promote("dist_ejs_temp", "dist_ejs").await.unwrap();
        if let PromoteOutcome::Promoted { retired: Some(retired), .. } = outcome {
            retired.finish().await.unwrap();
        }

        assert_eq!(listing(tmp.path()), vec!["dist_ejs", "dist_ejs/main.js.ejs"]);
    }

    #[tokio::test]
    async fn test_promote_keeps_retired_content_when_live_is_missing() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("dist_ejs_old").join("old.js.ejs"), "previous");
        write(&tmp.path().join("dist_ejs_temp").join("main.js.ejs"), "staged");

        let staging = StagingManager::new(tmp.path());
        staging.promote("dist_ejs_temp", "dist_ejs").await.unwrap();

        assert!(tmp.path().join("dist_ejs_old").join("old.js.ejs").exists());
        assert!(tmp.path().join("dist_ejs").join("main.js.ejs").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_clean_fails_when_directory_cannot_be_inspected() {
        let tmp = tempfile::tempdir().unwrap();
        // A file where a directory is expected makes the lookup fail with ENOTDIR
        write(&tmp.path().join("blocker"), "x");

        let staging = StagingManager::new(tmp.path());
        let options = CleanOptions {
            dry: false,
            verbose: false,
            patterns: vec!["**/*".to_string()],
            allow_outside_project: false,
        };
        let result = staging.clean(&tmp.path().join("blocker").join("dist"), &options).await;
        assert!(matches!(result, Err(CleanupError::Inspect { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_promote_fails_when_staged_cannot_be_inspected() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("blocker"), "x");
        write(&tmp.path().join("dist_ejs").join("main.js.ejs"), "live");

        let staging = StagingManager::new(tmp.path());
        let error = staging
            .promote("blocker/dist_ejs_temp", "dist_ejs")
            .await
            .unwrap_err();

        assert_eq!(error.step, PromotionStep::Inspect);
        assert!(tmp.path().join("dist_ejs").join("main.js.ejs").exists());
    }
}
