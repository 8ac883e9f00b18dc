//! GitHub Release API 클라이언트
//!
//! 최신 릴리스 정보를 가져오고, 플랫폼에 맞는 에셋을 고른 뒤
//! 에셋을 파일로 스트리밍 다운로드합니다.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::error::UpdaterError;
use crate::platform::Platform;
use crate::UpdateConfig;

/// GitHub Release 응답 (필요한 필드만, 나머지는 무시)
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    pub assets: Vec<GitHubAsset>,
}

/// GitHub Release Asset
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubAsset {
    pub browser_download_url: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// 플랫폼 조각이 URL에 포함된 에셋을 선택한다.
///
/// 일치하는 에셋이 두 개 이상이면 어느 쪽이 맞는지 알 수 없으므로 에러.
pub fn select_asset_for_platform(
    release: &GitHubRelease,
    platform: Option<Platform>,
) -> Result<Option<&GitHubAsset>, UpdaterError> {
    let Some(platform) = platform else {
        return Ok(None);
    };
    let fragment = platform.asset_fragment();

    let matches: Vec<&GitHubAsset> = release
        .assets
        .iter()
        .filter(|a| a.browser_download_url.contains(fragment))
        .collect();

    match matches.as_slice() {
        [] => Ok(None),
        [single] => Ok(Some(*single)),
        many => Err(UpdaterError::AmbiguousAsset {
            fragment: fragment.to_string(),
            urls: many.iter().map(|a| a.browser_download_url.clone()).collect(),
        }),
    }
}

/// GitHub API 클라이언트
pub struct GitHubClient {
    owner: String,
    repo: String,
    http: reqwest::Client,
    /// API 베이스 URL (기본: "https://api.github.com")
    /// 로컬 mock 서버 테스트 시 "http://127.0.0.1:9876" 등으로 오버라이드
    base_url: String,
    request_timeout: Duration,
    download_timeout: Duration,
}

impl GitHubClient {
    pub fn new(config: &UpdateConfig) -> Result<Self, UpdaterError> {
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let http = reqwest::Client::builder()
            .user_agent(concat!("retro-launcher-updater/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .map_err(|e| UpdaterError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            owner: config.github_owner.clone(),
            repo: config.github_repo.clone(),
            http,
            base_url: config
                .api_base_url
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or("https://api.github.com")
                .trim_end_matches('/')
                .to_string(),
            request_timeout,
            download_timeout: Duration::from_secs(config.download_timeout_secs),
        })
    }

    pub fn latest_release_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.base_url, self.owner, self.repo
        )
    }

    /// 최신 릴리스 가져오기. 재시도하지 않는다.
    pub async fn fetch_latest_release(&self) -> Result<GitHubRelease, UpdaterError> {
        let url = self.latest_release_url();
        let timeout = self.request_timeout;

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await
            .map_err(|e| UpdaterError::from_reqwest(e, "fetch latest release", timeout))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(UpdaterError::ApiError {
                status_code: status.as_u16(),
                message: format!("Failed to fetch latest release: {}", body.trim()),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| UpdaterError::from_reqwest(e, "read release body", timeout))?;

        serde_json::from_str::<GitHubRelease>(&body)
            .map_err(|e| UpdaterError::MalformedRelease(e.to_string()))
    }

    /// 에셋을 파일로 다운로드 (스트리밍)
    ///
    /// `<dest>.part`에 먼저 기록하고 완료 후 `dest`로 rename 한다.
    /// 실패/취소 시 `.part` 파일은 삭제되며 `dest`에는 불완전한 파일이 남지 않는다.
    pub async fn download_to_file(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, UpdaterError> {
        tracing::info!("[Updater] Downloading {} → {}", url, dest.display());

        let part = partial_path(dest);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(UpdaterError::Cancelled),
            r = self.stream_to(url, &part) => r,
        };

        let written = match result {
            Ok(n) => n,
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&part).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!("[Updater] Could not remove {}: {}", part.display(), rm);
                    }
                }
                return Err(e);
            }
        };

        tokio::fs::rename(&part, dest)
            .await
            .map_err(|e| UpdaterError::io("rename download", dest, e))?;

        tracing::info!("[Updater] Downloaded {} bytes to {}", written, dest.display());
        Ok(written)
    }

    async fn stream_to(&self, url: &str, part: &Path) -> Result<u64, UpdaterError> {
        let timeout = self.download_timeout;
        let response = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| UpdaterError::from_reqwest(e, "download asset", timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdaterError::ApiError {
                status_code: status.as_u16(),
                message: format!("Failed to download {}", url),
            });
        }

        if let Some(parent) = part.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| UpdaterError::io("create download dir", parent, e))?;
        }
        let mut file = tokio::fs::File::create(part)
            .await
            .map_err(|e| UpdaterError::io("create download file", part, e))?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| UpdaterError::from_reqwest(e, "download asset", timeout))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| UpdaterError::io("write download", part, e))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| UpdaterError::io("flush download", part, e))?;

        Ok(written)
    }
}

/// `update.zip` → `update.zip.part`
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(urls: &[&str]) -> GitHubRelease {
        GitHubRelease {
            tag_name: "v1.0.0".into(),
            assets: urls
                .iter()
                .map(|u| GitHubAsset { browser_download_url: u.to_string(), name: None })
                .collect(),
        }
    }

    #[test]
    fn parse_release_ignores_unknown_fields() {
        let json = r#"{
            "tag_name": "v1.3.0",
            "name": "RetroLauncher v1.3.0",
            "draft": false,
            "assets": [
                { "name": "RetroLauncher-windows.zip", "size": 10,
                  "browser_download_url": "https://example.com/RetroLauncher-windows.zip" },
                { "browser_download_url": "https://example.com/RetroLauncher-ubuntu.zip" }
            ]
        }"#;
        let rel: GitHubRelease = serde_json::from_str(json).unwrap();
        assert_eq!(rel.tag_name, "v1.3.0");
        assert_eq!(rel.assets.len(), 2);
        assert_eq!(rel.assets[0].name.as_deref(), Some("RetroLauncher-windows.zip"));
        assert!(rel.assets[1].name.is_none());
    }

    #[test]
    fn parse_release_requires_tag_and_assets() {
        assert!(serde_json::from_str::<GitHubRelease>(r#"{"assets": []}"#).is_err());
        assert!(serde_json::from_str::<GitHubRelease>(r#"{"tag_name": "v1"}"#).is_err());
    }

    #[test]
    fn selects_only_the_matching_platform() {
        let rel = release(&["https://x/RL-v1-windows.zip", "https://x/RL-v1-ubuntu.tar"]);
        let asset = select_asset_for_platform(&rel, Some(Platform::Linux)).unwrap().unwrap();
        assert_eq!(asset.browser_download_url, "https://x/RL-v1-ubuntu.tar");

        let asset = select_asset_for_platform(&rel, Some(Platform::Windows)).unwrap().unwrap();
        assert_eq!(asset.browser_download_url, "https://x/RL-v1-windows.zip");
    }

    #[test]
    fn no_asset_for_missing_or_unknown_platform() {
        let rel = release(&["https://x/RL-v1-windows.zip"]);
        assert!(select_asset_for_platform(&rel, Some(Platform::MacOs)).unwrap().is_none());
        assert!(select_asset_for_platform(&rel, None).unwrap().is_none());
    }

    #[test]
    fn multiple_matches_are_ambiguous() {
        let rel = release(&["https://x/RL-ubuntu-x64.zip", "https://x/RL-ubuntu-arm64.zip"]);
        let err = select_asset_for_platform(&rel, Some(Platform::Linux)).unwrap_err();
        match err {
            UpdaterError::AmbiguousAsset { fragment, urls } => {
                assert_eq!(fragment, "ubuntu");
                assert_eq!(urls.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/tmp/stage/update.zip")),
            PathBuf::from("/tmp/stage/update.zip.part")
        );
    }

    #[test]
    fn base_url_override_is_trimmed() {
        let cfg = UpdateConfig {
            api_base_url: Some("http://127.0.0.1:9876/".into()),
            github_owner: "owner".into(),
            github_repo: "repo".into(),
            ..UpdateConfig::default()
        };
        let client = GitHubClient::new(&cfg).unwrap();
        assert_eq!(
            client.latest_release_url(),
            "http://127.0.0.1:9876/repos/owner/repo/releases/latest"
        );
    }
}
