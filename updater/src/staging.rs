//! 업데이트 스테이징 영역
//!
//! 다운로드한 압축 파일과 압축 해제 디렉터리를 관리한다.
//! 실패/취소 시 정리하고, 이전 실행에서 남은 찌꺼기는 시작 시 삭제한다.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::UpdaterError;
use crate::github::partial_path;
use crate::platform::Platform;

pub const ARCHIVE_FILE_NAME: &str = "update.zip";
pub const UNPACK_DIR_NAME: &str = "update_unpacked";

#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 기본 스테이징 디렉터리: %APPDATA%/RetroLauncher/updates 또는 ~/.cache/retro-launcher/updates
    pub fn resolve_default_dir() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA")
                .map(|appdata| PathBuf::from(appdata).join("RetroLauncher").join("updates"))
                .unwrap_or_else(|_| std::env::temp_dir().join("retro-launcher-updates"))
        }
        #[cfg(not(target_os = "windows"))]
        {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join(".cache").join("retro-launcher").join("updates"))
                .unwrap_or_else(|_| std::env::temp_dir().join("retro-launcher-updates"))
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archive_path(&self) -> PathBuf {
        self.root.join(ARCHIVE_FILE_NAME)
    }

    pub fn unpack_dir(&self) -> PathBuf {
        self.root.join(UNPACK_DIR_NAME)
    }

    pub fn prepare(&self) -> Result<(), UpdaterError> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| UpdaterError::io("create staging dir", &self.root, e))
    }

    /// 압축 해제 디렉터리를 비우고 새로 만든다
    pub fn reset_unpack_dir(&self) -> Result<PathBuf, UpdaterError> {
        let dir = self.unpack_dir();
        remove_dir_if_exists(&dir).map_err(|e| UpdaterError::io("clear unpack dir", &dir, e))?;
        std::fs::create_dir_all(&dir).map_err(|e| UpdaterError::io("create unpack dir", &dir, e))?;
        Ok(dir)
    }

    /// 다운로드 중간 파일, 압축 파일, 압축 해제 디렉터리를 모두 삭제 (best-effort)
    pub fn purge(&self) -> bool {
        let archive = self.archive_path();
        let mut clean = true;
        for file in [partial_path(&archive), archive] {
            match remove_file_if_exists(&file) {
                Ok(true) => tracing::info!("[Staging] Deleted {}", file.display()),
                Ok(false) => {}
                Err(e) => {
                    clean = false;
                    tracing::warn!("[Staging] Could not delete {}: {}", file.display(), e);
                }
            }
        }

        let dir = self.unpack_dir();
        match remove_dir_if_exists(&dir) {
            Ok(true) => tracing::info!("[Staging] Deleted update directory {}", dir.display()),
            Ok(false) => {}
            Err(e) => {
                clean = false;
                tracing::warn!("[Staging] Could not delete {}: {}", dir.display(), e);
            }
        }
        clean
    }

    /// 시작 시 정리: 이전 업데이트가 남긴 스테이징 파일과
    /// 설치 루트로 동기화되어 들어온 업데이터 실행 파일을 삭제
    pub fn cleanup_leftovers(&self, install_root: &Path, platform: Option<Platform>) {
        self.purge();

        let Some(platform) = platform else { return };
        let stray_updater = install_root.join(platform.updater_executable_name());
        match remove_file_if_exists(&stray_updater) {
            Ok(true) => tracing::info!("[Staging] Deleted updater file: {}", stray_updater.display()),
            Ok(false) => {}
            Err(e) => tracing::error!("[Staging] Error during cleanup of {}: {}", stray_updater.display(), e),
        }
    }
}

fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn remove_dir_if_exists(path: &Path) -> io::Result<bool> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
