//! 업데이터 프로세스의 파일 동기화 + 재시작
//!
//! 개별 파일 복사 실패(예: OS가 아직 파일을 잠그고 있음)는 기록만 하고
//! 나머지 파일 복사를 계속한다.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::UpdaterError;
use crate::platform::Platform;

/// 복사하지 못한 항목
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub directories_created: usize,
    pub files_copied: usize,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record_failure(&mut self, path: &Path, error: impl ToString) {
        let error = error.to_string();
        tracing::error!("[Sync] Skipping {}: {}", path.display(), error);
        self.failures.push(SyncFailure {
            path: path.to_path_buf(),
            error,
        });
    }
}

/// `source` 트리를 `destination`에 덮어쓴다.
///
/// 소스 루트 자체를 읽을 수 없을 때만 에러를 반환한다.
pub fn sync_tree(source: &Path, destination: &Path) -> Result<SyncReport, UpdaterError> {
    if !source.is_dir() {
        return Err(UpdaterError::io(
            "read update tree",
            source,
            std::io::Error::new(std::io::ErrorKind::NotFound, "source is not a directory"),
        ));
    }
    let entries = sorted_entries(source).map_err(|e| UpdaterError::io("read update tree", source, e))?;

    let mut report = SyncReport::default();
    if !destination.exists() {
        fs::create_dir_all(destination)
            .map_err(|e| UpdaterError::io("create install root", destination, e))?;
        report.directories_created += 1;
    }

    sync_entries(entries, destination, &mut report);

    tracing::info!(
        "[Sync] {} files copied, {} directories created, {} skipped",
        report.files_copied,
        report.directories_created,
        report.failures.len()
    );
    Ok(report)
}

fn sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

fn sync_entries(entries: Vec<PathBuf>, dest_dir: &Path, report: &mut SyncReport) {
    for source in entries {
        let Some(name) = source.file_name() else { continue };
        let destination = dest_dir.join(name);

        if source.is_dir() {
            if !destination.is_dir() {
                if let Err(e) = fs::create_dir(&destination) {
                    report.record_failure(&destination, e);
                    continue;
                }
                report.directories_created += 1;
            }
            match sorted_entries(&source) {
                Ok(children) => sync_entries(children, &destination, report),
                Err(e) => report.record_failure(&source, e),
            }
        } else {
            match fs::copy(&source, &destination) {
                Ok(_) => report.files_copied += 1,
                Err(e) => report.record_failure(&destination, e),
            }
        }
    }
}

/// 설치 루트 안에서 플랫폼에 맞는 메인 실행 파일을 찾는다
pub fn resolve_relaunch_target(
    destination: &Path,
    platform: Option<Platform>,
) -> Result<PathBuf, UpdaterError> {
    let platform = platform.ok_or_else(|| {
        UpdaterError::RelaunchTargetMissing(format!(
            "unsupported operating system '{}'",
            std::env::consts::OS
        ))
    })?;

    let target = destination.join(platform.main_executable_name());
    if target.is_file() {
        Ok(target)
    } else {
        Err(UpdaterError::RelaunchTargetMissing(target.display().to_string()))
    }
}

/// 동기화 → (스킵 여부와 관계없이) 재시작.
///
/// 동기화가 완전히 성공하면 소스 트리를 삭제한다.
pub fn apply_update<F>(
    source: &Path,
    destination: &Path,
    platform: Option<Platform>,
    spawn: F,
) -> Result<SyncReport, UpdaterError>
where
    F: FnOnce(&Path) -> std::io::Result<()>,
{
    tracing::info!(
        "[Sync] Applying update {} → {}",
        source.display(),
        destination.display()
    );
    let report = sync_tree(source, destination)?;

    if report.is_complete() {
        if let Err(e) = fs::remove_dir_all(source) {
            tracing::warn!("[Sync] Could not delete update tree {}: {}", source.display(), e);
        }
    } else {
        tracing::warn!(
            "[Sync] Keeping update tree {} because {} entries were skipped",
            source.display(),
            report.failures.len()
        );
    }

    let target = resolve_relaunch_target(destination, platform)?;
    tracing::info!("[Sync] Relaunching {}", target.display());
    spawn(&target).map_err(|e| UpdaterError::io("relaunch application", &target, e))?;

    Ok(report)
}
