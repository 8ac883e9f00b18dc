//! # RetroLauncher 업데이터 라이브러리
//!
//! 메인 애플리케이션의 셀프 업데이트를 담당합니다.
//!
//! ## 동작 원리
//! 1. **확인**: GitHub 최신 릴리스의 태그와 `<install_root>/VERSION`을 비교
//! 2. **다운로드**: 현재 플랫폼용 에셋을 스테이징 디렉터리에 스트리밍 저장
//! 3. **압축 해제**: 공통 루트 폴더를 벗겨내고 `update_unpacked/`에 풀기
//! 4. **핸드오프**: 업데이트 트리 안의 업데이터를 분리 실행하고 메인 프로세스 종료
//! 5. **동기화**: 업데이터가 트리를 설치 루트에 덮어쓰고 메인 애플리케이션 재시작
//!
//! ## 모듈 구성
//! - **version.rs**: 버전 파싱/비교, VERSION 파일
//! - **github.rs**: 릴리스 조회, 에셋 선택, 스트리밍 다운로드
//! - **archive.rs**: zip 압축 해제
//! - **staging.rs**: 스테이징 파일 관리/정리
//! - **handoff.rs**: 업데이터 분리 실행, 프로세스 종료 대기
//! - **sync.rs**: 업데이터 프로세스의 트리 동기화 + 재시작
//! - **worker.rs**: 백그라운드 확인/다운로드, 취소

pub mod archive;
pub mod error;
pub mod github;
pub mod handoff;
pub mod platform;
pub mod staging;
pub mod sync;
pub mod version;
pub mod worker;

#[cfg(test)]
mod tests;

pub use error::UpdaterError;
pub use github::{GitHubAsset, GitHubClient, GitHubRelease};
pub use handoff::{ProcessChecker, SelfUpdater};
pub use platform::Platform;
pub use staging::StagingArea;
pub use sync::{apply_update, SyncFailure, SyncReport};
pub use version::{is_newer, LocalVersion, Version};
pub use worker::{BackgroundTask, BackgroundWorker, WorkerEvent};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

// ══════════════════════════════════════════════════════
// 설정 / 상태 타입
// ══════════════════════════════════════════════════════

/// 업데이트 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub enabled: bool,
    /// GitHub 레포지토리 소유자
    pub github_owner: String,
    /// GitHub 레포지토리 이름
    pub github_repo: String,
    /// API 베이스 URL 오버라이드 (테스트용 로컬 서버,
    /// 예: "http://127.0.0.1:9876" 처럼 GitHub API 대신 사용할 URL)
    pub api_base_url: Option<String>,
    /// 설치 루트 (기본값: 실행 파일이 있는 디렉터리)
    pub install_root: Option<String>,
    /// 스테이징 디렉터리 (기본값: %APPDATA%/RetroLauncher/updates 또는 ~/.cache/retro-launcher/updates)
    pub staging_dir: Option<String>,
    /// 릴리스 조회 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 에셋 다운로드 타임아웃 (초)
    pub download_timeout_secs: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            github_owner: "KarandaevRuslan".to_string(),
            github_repo: "RetroLauncher".to_string(),
            api_base_url: None,
            install_root: None,
            staging_dir: None,
            request_timeout_secs: 30,
            download_timeout_secs: 600,
        }
    }
}

/// 업데이트 진행 단계
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    Checking,
    NoUpdate,
    UpdateAvailable,
    Downloading,
    Extracting,
    HandoffPending,
    /// 업데이터가 실행되었고 현재 프로세스는 종료해야 함
    Terminated,
    Failed(String),
}

/// 업데이트가 없다고 판단한 이유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoUpdateReason {
    UpToDate,
    FetchFailed,
    UnsupportedPlatform,
    AmbiguousAsset,
    InvalidVersion,
    Disabled,
}

/// 설치 가능한 업데이트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableUpdate {
    pub latest_tag: String,
    pub current: LocalVersion,
    pub download_url: String,
}

/// 업데이트 확인 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCheck {
    NoUpdate { reason: NoUpdateReason },
    Available(AvailableUpdate),
}

impl UpdateCheck {
    fn none(reason: NoUpdateReason) -> Self {
        UpdateCheck::NoUpdate { reason }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, UpdateCheck::Available(_))
    }
}

// ══════════════════════════════════════════════════════
// UpdateManager
// ══════════════════════════════════════════════════════

/// 업데이트 확인/다운로드/핸드오프를 관리하는 매니저
///
/// 설치 루트 안에는 아무것도 쓰지 않는다. 파일 교체는 업데이터 프로세스의 몫.
pub struct UpdateManager {
    config: UpdateConfig,
    platform: Option<Platform>,
    /// 설치 루트 디렉터리 (VERSION 파일 위치, 업데이터 동기화 대상)
    install_root: PathBuf,
    staging: StagingArea,
    client: GitHubClient,
    phase: UpdatePhase,
}

impl UpdateManager {
    pub fn new(config: UpdateConfig, platform: Option<Platform>) -> Result<Self, UpdaterError> {
        // install_root: config 경로 또는 실행 파일 기준
        let install_root = config
            .install_root
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::current_exe()
                    .ok()
                    .and_then(|p| p.parent().map(|d| d.to_path_buf()))
                    .unwrap_or_else(|| PathBuf::from("."))
            });

        let staging = StagingArea::new(
            config
                .staging_dir
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(StagingArea::resolve_default_dir),
        );

        let client = GitHubClient::new(&config)?;

        Ok(Self {
            config,
            platform,
            install_root,
            staging,
            client,
            phase: UpdatePhase::Idle,
        })
    }

    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    pub fn phase(&self) -> &UpdatePhase {
        &self.phase
    }

    pub fn platform(&self) -> Option<Platform> {
        self.platform
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub fn local_version(&self) -> LocalVersion {
        version::read_local_version(&self.install_root)
    }

    /// 이전 실행에서 남은 스테이징 파일과 설치 루트의 업데이터 실행 파일 정리
    pub fn cleanup_leftovers(&self) {
        self.staging.cleanup_leftovers(&self.install_root, self.platform);
    }

    // ─── 업데이트 확인 ────────────────────────────────────────────────────────

    /// 최신 릴리스를 확인한다. 네트워크 문제는 조용히 "업데이트 없음"으로 처리되며
    /// 시작 흐름을 막지 않는다.
    pub async fn check_for_update(&mut self) -> UpdateCheck {
        if !self.config.enabled {
            tracing::info!("[Updater] Update check disabled by configuration");
            return self.finish_check(UpdateCheck::none(NoUpdateReason::Disabled));
        }

        self.phase = UpdatePhase::Checking;
        tracing::info!("[Updater] Checking {}", self.client.latest_release_url());

        let release = match self.client.fetch_latest_release().await {
            Ok(release) => release,
            Err(e) => return self.fail_check(e),
        };

        let asset = match github::select_asset_for_platform(&release, self.platform) {
            Ok(Some(asset)) => asset,
            Ok(None) => {
                tracing::info!(
                    "[Updater] No release asset for platform {:?} in {}",
                    self.platform,
                    release.tag_name
                );
                return self.finish_check(UpdateCheck::none(NoUpdateReason::UnsupportedPlatform));
            }
            Err(e) => return self.fail_check(e),
        };

        let current = self.local_version();
        let available = AvailableUpdate {
            latest_tag: release.tag_name.clone(),
            current: current.clone(),
            download_url: asset.browser_download_url.clone(),
        };

        let newer = match &current {
            LocalVersion::Unknown => {
                tracing::warn!(
                    "[Updater] Current version is unknown, set version manually in {} file",
                    version::VERSION_FILE
                );
                true
            }
            LocalVersion::Known(tag) => match version::is_newer(&release.tag_name, tag) {
                Ok(newer) => newer,
                Err(e) => return self.fail_check(e),
            },
        };

        if newer {
            tracing::info!(
                "[Updater] Update available: {} → {}",
                available.current,
                available.latest_tag
            );
            self.finish_check(UpdateCheck::Available(available))
        } else {
            tracing::info!("[Updater] Up to date ({})", current);
            self.finish_check(UpdateCheck::none(NoUpdateReason::UpToDate))
        }
    }

    /// 확인 실패를 "업데이트 없음"으로 바꾼다. 네트워크 쪽 에러는 경고로만 남긴다.
    fn fail_check(&mut self, e: UpdaterError) -> UpdateCheck {
        if e.is_quiet() {
            tracing::warn!("[Updater] Could not fetch latest release: {}", e);
        } else {
            tracing::error!("[Updater] {}", e);
        }
        let reason = e.no_update_reason().unwrap_or(NoUpdateReason::FetchFailed);
        self.finish_check(UpdateCheck::none(reason))
    }

    fn finish_check(&mut self, check: UpdateCheck) -> UpdateCheck {
        self.phase = if check.is_available() {
            UpdatePhase::UpdateAvailable
        } else {
            UpdatePhase::NoUpdate
        };
        check
    }

    /// 사용자가 업데이트를 거절함. 부수 효과 없음.
    pub fn decline(&mut self) {
        tracing::info!("[Updater] Update declined");
        self.phase = UpdatePhase::Idle;
    }

    // ─── 다운로드 / 압축 해제 ────────────────────────────────────────────────

    /// 에셋을 다운로드하고 압축을 풀어 업데이트 트리 경로를 반환한다.
    ///
    /// 실패하면 스테이징을 비우고 `Failed`, 취소되면 스테이징을 비우고 `Idle`.
    pub async fn download_and_extract(
        &mut self,
        update: &AvailableUpdate,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, UpdaterError> {
        match self.stage_update(update, cancel).await {
            Ok(dir) => Ok(dir),
            Err(e) => {
                self.staging.purge();
                if matches!(e, UpdaterError::Cancelled) {
                    tracing::info!("[Updater] Update cancelled, staging cleared");
                    self.phase = UpdatePhase::Idle;
                } else {
                    tracing::error!("[Updater] Update failed: {}", e);
                    self.phase = UpdatePhase::Failed(e.to_string());
                }
                Err(e)
            }
        }
    }

    async fn stage_update(
        &mut self,
        update: &AvailableUpdate,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, UpdaterError> {
        self.phase = UpdatePhase::Downloading;
        self.staging.prepare()?;
        let archive_path = self.staging.archive_path();
        self.client
            .download_to_file(&update.download_url, &archive_path, cancel)
            .await?;

        if cancel.is_cancelled() {
            return Err(UpdaterError::Cancelled);
        }

        self.phase = UpdatePhase::Extracting;
        let unpack_dir = self.staging.reset_unpack_dir()?;
        let (archive, dest) = (archive_path.clone(), unpack_dir.clone());
        // 블로킹 풀에서 시작된 압축 해제는 끝까지 진행시키고, 취소 여부는 그 후에 판단
        tokio::task::spawn_blocking(move || archive::extract(&archive, &dest))
            .await
            .map_err(|e| UpdaterError::ArchiveCorrupt {
                path: archive_path.clone(),
                message: format!("extraction task failed: {}", e),
            })??;

        if cancel.is_cancelled() {
            return Err(UpdaterError::Cancelled);
        }

        if let Err(e) = std::fs::remove_file(&archive_path) {
            tracing::warn!("[Updater] Could not delete {}: {}", archive_path.display(), e);
        }

        Ok(unpack_dir)
    }

    // ─── 핸드오프 ─────────────────────────────────────────────────────────────

    /// 업데이트 트리에서 업데이터 실행 파일을 찾는다. 없으면 스테이징을 비우고 실패.
    pub fn prepare_handoff(&mut self, unpacked: &Path) -> Result<SelfUpdater, UpdaterError> {
        let updater_name = self
            .platform
            .map(|p| p.updater_executable_name())
            .unwrap_or_else(|| platform::UPDATER_BINARY_NAME.to_string());
        let updater_exe = unpacked.join(updater_name);

        if !updater_exe.is_file() {
            let err = UpdaterError::UpdaterMissing(updater_exe);
            tracing::error!("[Updater] {}", err);
            self.staging.purge();
            self.phase = UpdatePhase::Failed(err.to_string());
            return Err(err);
        }

        self.phase = UpdatePhase::HandoffPending;
        Ok(SelfUpdater::new(
            updater_exe,
            unpacked.to_path_buf(),
            self.install_root.clone(),
        ))
    }

    /// 업데이터를 분리 실행한다. 성공하면 호출자는 즉시 프로세스를 종료해야 한다.
    pub fn hand_off(&mut self, updater: &SelfUpdater) -> Result<u32, UpdaterError> {
        match updater.execute() {
            Ok(pid) => {
                self.phase = UpdatePhase::Terminated;
                Ok(pid)
            }
            Err(e) => {
                tracing::error!("[Updater] Failed to start updater: {}", e);
                self.staging.purge();
                self.phase = UpdatePhase::Failed(e.to_string());
                Err(e)
            }
        }
    }
}
