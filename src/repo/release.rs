//! Release manifest generation and signing.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::pool::sha256_file;
use crate::config::PublishConfig;
use crate::error::PipelineError;
use crate::process::{Cmd, ToolRunner};
use crate::workspace::{discard_file, partial_path, promote_file};

pub const RELEASE: &str = "Release";
pub const RELEASE_GPG: &str = "Release.gpg";
pub const IN_RELEASE: &str = "InRelease";

/// `-o APT::FTPArchive::Release::*` settings passed to apt-ftparchive.
pub fn release_options(config: &PublishConfig) -> Vec<(&'static str, String)> {
    vec![
        ("Origin", config.origin.clone()),
        ("Label", config.label.clone()),
        ("Suite", config.dist.clone()),
        ("Codename", config.dist.clone()),
        ("Architectures", config.architectures.join(" ")),
        ("Components", config.component.clone()),
        ("Description", config.description.clone()),
    ]
}

/// Generate `dists/<dist>/Release` from the indices already written there.
pub fn generate_release(config: &PublishConfig, tools: &dyn ToolRunner) -> Result<PathBuf> {
    let mut cmd = Cmd::new("apt-ftparchive");
    for (key, value) in release_options(config) {
        cmd = cmd
            .arg("-o")
            .arg(format!("APT::FTPArchive::Release::{key}={value}"));
    }
    let output = cmd
        .arg("release")
        .arg(format!("dists/{}", config.dist))
        .current_dir(&config.repo_dir)
        .error_msg(format!("apt-ftparchive failed to generate Release for {}", config.dist))
        .run(tools)?;

    let release = config.dist_dir().join(RELEASE);
    fs::write(&release, &output.stdout)
        .with_context(|| format!("writing '{}'", release.display()))?;
    debug!(path = %release.display(), bytes = output.stdout.len(), "wrote Release");
    Ok(release)
}

/// Signature files committed next to the manifest.
#[derive(Debug, Clone)]
pub struct Signatures {
    pub detached: PathBuf,
    pub inline: PathBuf,
}

/// Produce `Release.gpg` and `InRelease` for `release`.
///
/// Both signatures are written under partial names first and renamed only
/// when both succeeded and the manifest bytes are unchanged; otherwise both
/// partial files are removed and nothing is committed.
pub fn sign_release(release: &Path, key_id: &str, tools: &dyn ToolRunner) -> Result<Signatures> {
    let dir = release.parent().unwrap_or_else(|| Path::new("."));
    let detached = dir.join(RELEASE_GPG);
    let inline = dir.join(IN_RELEASE);
    let detached_partial = partial_path(&detached);
    let inline_partial = partial_path(&inline);

    let result = sign_into(release, key_id, &detached_partial, &inline_partial, tools);
    if let Err(err) = result {
        discard_file(&detached_partial);
        discard_file(&inline_partial);
        return Err(err);
    }

    if let Err(err) = promote_file(&detached_partial, &detached) {
        discard_file(&detached_partial);
        discard_file(&inline_partial);
        return Err(signing_error("committing Release.gpg", err).into());
    }
    if let Err(err) = promote_file(&inline_partial, &inline) {
        discard_file(&detached);
        discard_file(&inline_partial);
        return Err(signing_error("committing InRelease", err).into());
    }
    info!(key = key_id, "signed Release");
    Ok(Signatures { detached, inline })
}

fn signing_error(step: &str, err: anyhow::Error) -> PipelineError {
    PipelineError::SigningInconsistency {
        step: step.to_string(),
        detail: format!("{err:#}"),
    }
}

fn sign_into(
    release: &Path,
    key_id: &str,
    detached: &Path,
    inline: &Path,
    tools: &dyn ToolRunner,
) -> Result<()> {
    let (before, _) = sha256_file(release)?;

    let gpg = |mode: &[&str], output: &Path| {
        Cmd::new("gpg")
            .args(["--batch", "--yes", "--default-key", key_id])
            .args(mode)
            .arg("--output")
            .arg_path(output)
            .arg_path(release)
            .error_msg(format!("gpg could not sign with key {key_id}"))
            .run(tools)
    };

    gpg(&["--armor", "--detach-sign"], detached)
        .map_err(|err| signing_error("detached signature (Release.gpg)", err))?;
    gpg(&["--clearsign"], inline)
        .map_err(|err| signing_error("inline signature (InRelease)", err))?;

    for path in [detached, inline] {
        if !path.is_file() {
            return Err(PipelineError::SigningInconsistency {
                step: "signature output".to_string(),
                detail: format!("gpg did not write '{}'", path.display()),
            }
            .into());
        }
    }

    let (after, _) = sha256_file(release)?;
    if before != after {
        return Err(PipelineError::SigningInconsistency {
            step: "manifest check".to_string(),
            detail: format!("'{}' changed while it was being signed", release.display()),
        }
        .into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::pipeline_error;
    use crate::testing::FakeTools;
    use tempfile::TempDir;

    fn release_file(temp: &TempDir) -> PathBuf {
        let dir = temp.path().join("dists/stable");
        fs::create_dir_all(&dir).unwrap();
        let release = dir.join(RELEASE);
        fs::write(&release, "Origin: Ankor\nSuite: stable\n").unwrap();
        release
    }

    fn is_signing_error(err: &anyhow::Error) -> bool {
        matches!(
            pipeline_error(err),
            Some(PipelineError::SigningInconsistency { .. })
        )
    }

    #[test]
    fn both_signatures_cover_the_same_manifest() {
        let temp = TempDir::new().unwrap();
        let release = release_file(&temp);
        let manifest = fs::read(&release).unwrap();

        let sigs = sign_release(&release, "ABCD1234", &FakeTools::new()).unwrap();
        assert_eq!(fs::read(&release).unwrap(), manifest);
        assert_eq!(FakeTools::signed_payload(&sigs.inline), manifest);
        assert_eq!(
            FakeTools::detached_digest(&sigs.detached),
            sha256_file(&release).unwrap().0
        );
    }

    #[test]
    fn failed_inline_signature_commits_nothing() {
        let temp = TempDir::new().unwrap();
        let release = release_file(&temp);
        let fake = FakeTools::new().failing_with("gpg", "--clearsign");

        let err = sign_release(&release, "ABCD1234", &fake).unwrap_err();
        assert!(is_signing_error(&err));

        let dir = release.parent().unwrap();
        let names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, [RELEASE]);
    }

    #[test]
    fn failed_detached_signature_commits_nothing() {
        let temp = TempDir::new().unwrap();
        let release = release_file(&temp);
        let fake = FakeTools::new().failing_with("gpg", "--detach-sign");

        let err = sign_release(&release, "ABCD1234", &fake).unwrap_err();
        assert!(is_signing_error(&err));

        let names: Vec<_> = fs::read_dir(release.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, [RELEASE]);
    }

    #[test]
    fn failed_inline_commit_removes_detached_signature() {
        let temp = TempDir::new().unwrap();
        let release = release_file(&temp);
        let blocker = release.with_file_name(IN_RELEASE);
        fs::create_dir_all(blocker.join("occupied")).unwrap();

        let err = sign_release(&release, "ABCD1234", &FakeTools::new()).unwrap_err();
        assert!(is_signing_error(&err));
        assert!(!release.with_file_name(RELEASE_GPG).exists());
        assert!(!partial_path(&release.with_file_name(RELEASE_GPG)).exists());
        assert!(!partial_path(&blocker).exists());
    }

    #[test]
    fn manifest_mutation_is_detected() {
        let temp = TempDir::new().unwrap();
        let release = release_file(&temp);
        let fake = FakeTools::new().tampering_on_sign();

        let err = sign_release(&release, "ABCD1234", &fake).unwrap_err();
        assert!(is_signing_error(&err));
        assert!(!release.with_file_name(RELEASE_GPG).exists());
        assert!(!release.with_file_name(IN_RELEASE).exists());
    }
}
