//! 업데이터 에러 타입
//!
//! ## 지원하는 에러 상황
//! - 네트워크 끊김 / 타임아웃 / API 응답 오류
//! - 릴리스 메타데이터 파싱 실패
//! - 압축 파일 손상, 번들 업데이터 누락
//! - 재시작 대상 실행 파일 누락
//! - 사용자 취소

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::NoUpdateReason;

/// 업데이터 에러 타입
#[derive(thiserror::Error, Debug)]
pub enum UpdaterError {
    /// 네트워크 연결 실패
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP 요청 타임아웃
    #[error("Timeout after {}s: {operation}", .duration.as_secs())]
    Timeout { operation: String, duration: Duration },

    /// API 응답 오류 (200이 아닌 상태 코드)
    #[error("API error ({status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// 릴리스 JSON 파싱 실패 또는 필수 필드 누락
    #[error("Malformed release data: {0}")]
    MalformedRelease(String),

    /// 같은 플랫폼 조각을 가진 에셋이 여러 개
    #[error("Ambiguous release assets for '{fragment}': {urls:?}")]
    AmbiguousAsset { fragment: String, urls: Vec<String> },

    /// 버전 문자열에 숫자가 아닌 토큰이 포함됨
    #[error("Invalid version '{input}': token '{token}' is not a non-negative integer")]
    InvalidVersion { input: String, token: String },

    /// 압축 파일을 열거나 해석할 수 없음
    #[error("Corrupt archive {}: {message}", .path.display())]
    ArchiveCorrupt { path: PathBuf, message: String },

    /// 압축 해제된 업데이트에 업데이터 실행 파일이 없음
    #[error("Updater executable not found at {}", .0.display())]
    UpdaterMissing(PathBuf),

    /// 업데이트 후 재시작할 실행 파일을 찾을 수 없음
    #[error("Relaunch target not found: {0}")]
    RelaunchTargetMissing(String),

    /// 파일 시스템 오류
    #[error("File system error during {operation} on '{}': {source}", .path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 사용자가 다운로드/압축 해제를 취소함
    #[error("Update cancelled")]
    Cancelled,
}

impl UpdaterError {
    pub fn io(operation: &'static str, path: &Path, source: std::io::Error) -> Self {
        UpdaterError::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    /// reqwest 에러를 UpdaterError로 변환
    pub fn from_reqwest(err: reqwest::Error, operation: &str, timeout: Duration) -> Self {
        if err.is_timeout() {
            UpdaterError::Timeout {
                operation: operation.to_string(),
                duration: timeout,
            }
        } else if let Some(status) = err.status() {
            UpdaterError::ApiError {
                status_code: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            UpdaterError::MalformedRelease(err.to_string())
        } else {
            UpdaterError::Network(format!("{}: {}", operation, err))
        }
    }

    /// 업데이트 확인 단계에서 조용히 "업데이트 없음"으로 처리할 에러인지
    pub fn is_quiet(&self) -> bool {
        matches!(
            self,
            UpdaterError::Network(_)
                | UpdaterError::Timeout { .. }
                | UpdaterError::ApiError { .. }
                | UpdaterError::MalformedRelease(_)
        )
    }

    /// 업데이트 확인 단계에서 이 에러가 되는 "업데이트 없음" 사유.
    /// 확인 단계에서 나올 수 없는 에러는 `None`.
    pub fn no_update_reason(&self) -> Option<NoUpdateReason> {
        match self {
            e if e.is_quiet() => Some(NoUpdateReason::FetchFailed),
            UpdaterError::AmbiguousAsset { .. } => Some(NoUpdateReason::AmbiguousAsset),
            UpdaterError::InvalidVersion { .. } => Some(NoUpdateReason::InvalidVersion),
            _ => None,
        }
    }

    /// 사용자에게 표시할 메시지
    pub fn user_message(&self) -> String {
        match self {
            UpdaterError::Network(_) => "Check your internet connection.".to_string(),
            UpdaterError::Timeout { .. } => {
                "The update server is not responding. Please try again later.".to_string()
            }
            UpdaterError::ApiError { status_code, .. } => match *status_code {
                404 => "No published release was found.".to_string(),
                403 => "Access denied. The API rate limit may have been reached.".to_string(),
                code if code >= 500 => {
                    "The update server has a temporary problem. Please try again later.".to_string()
                }
                code => format!("Server error ({})", code),
            },
            UpdaterError::ArchiveCorrupt { .. } => {
                "The downloaded update is damaged. Your installation was not changed.".to_string()
            }
            UpdaterError::UpdaterMissing(_) => {
                "The downloaded update does not contain the updater. Your installation was not changed."
                    .to_string()
            }
            UpdaterError::Cancelled => "The update was cancelled.".to_string(),
            other => format!("Update failed: {}", other),
        }
    }
}
