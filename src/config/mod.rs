//! 애플리케이션 컨텍스트와 설정 로드
//!
//! 설치 루트, 플랫폼, 업데이트 설정, 프로필 저장소 경로를 한 번 결정하여
//! 업데이트/실행 컴포넌트에 명시적으로 전달한다.

pub mod profiles;

use anyhow::Context;
use retro_launcher_updater_lib::{Platform, UpdateConfig};
use std::path::{Path, PathBuf};

pub use profiles::{Emulator, LauncherConfig, ProfileError, Rom, UserProfile};

/// 설치 루트를 지정하는 환경 변수
pub const HOME_ENV: &str = "RETRO_LAUNCHER_HOME";

/// 설치 루트 기준 설정 파일 경로
pub const SETTINGS_FILE: &str = "config/launcher.toml";

/// 설치 루트 기준 프로필 저장소 경로
pub const PROFILES_FILE: &str = "config.json";

#[derive(Debug, Clone)]
pub struct AppContext {
    install_root: PathBuf,
    platform: Option<Platform>,
    update: UpdateConfig,
}

impl AppContext {
    /// `RETRO_LAUNCHER_HOME` 또는 실행 파일 디렉터리를 설치 루트로 사용
    pub fn load() -> anyhow::Result<Self> {
        Self::from_root(resolve_install_root())
    }

    pub fn from_root(install_root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let install_root = install_root.into();
        let mut update = load_update_config(&install_root.join(SETTINGS_FILE))?;
        update.install_root = Some(install_root.to_string_lossy().to_string());

        let platform = Platform::current();
        if platform.is_none() {
            tracing::warn!(
                "[Config] Unsupported operating system '{}', updates will not be offered",
                std::env::consts::OS
            );
        }

        Ok(Self {
            install_root,
            platform,
            update,
        })
    }

    pub fn with_platform(mut self, platform: Option<Platform>) -> Self {
        self.platform = platform;
        self
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn platform(&self) -> Option<Platform> {
        self.platform
    }

    pub fn update_config(&self) -> &UpdateConfig {
        &self.update
    }

    pub fn profiles_path(&self) -> PathBuf {
        self.install_root.join(PROFILES_FILE)
    }

    pub fn load_profiles(&self) -> Result<LauncherConfig, ProfileError> {
        LauncherConfig::load(&self.profiles_path())
    }
}

pub fn resolve_install_root() -> PathBuf {
    if let Ok(home) = std::env::var(HOME_ENV) {
        if !home.trim().is_empty() {
            return PathBuf::from(home);
        }
    }
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `launcher.toml`의 `[updater]` 섹션 로드. 파일이 없으면 기본값.
pub fn load_update_config(path: &Path) -> anyhow::Result<UpdateConfig> {
    if !path.exists() {
        return Ok(UpdateConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let parsed: toml::Value = content
        .parse()
        .with_context(|| format!("Invalid TOML in {}", path.display()))?;

    tracing::info!("[Config] Loaded {}", path.display());
    Ok(parsed
        .get("updater")
        .map(parse_update_config)
        .unwrap_or_default())
}

pub fn parse_update_config(val: &toml::Value) -> UpdateConfig {
    let mut cfg = UpdateConfig::default();
    if let Some(v) = val.get("enabled").and_then(|v| v.as_bool()) {
        cfg.enabled = v;
    }
    if let Some(v) = val.get("github_owner").and_then(|v| v.as_str()) {
        cfg.github_owner = v.to_string();
    }
    if let Some(v) = val.get("github_repo").and_then(|v| v.as_str()) {
        cfg.github_repo = v.to_string();
    }
    if let Some(v) = val.get("api_base_url").and_then(|v| v.as_str()) {
        cfg.api_base_url = Some(v.to_string());
    }
    if let Some(v) = val.get("staging_dir").and_then(|v| v.as_str()) {
        cfg.staging_dir = Some(v.to_string());
    }
    if let Some(v) = val.get("request_timeout_secs").and_then(|v| v.as_integer()) {
        cfg.request_timeout_secs = v.max(1) as u64;
    }
    if let Some(v) = val.get("download_timeout_secs").and_then(|v| v.as_integer()) {
        cfg.download_timeout_secs = v.max(1) as u64;
    }
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = AppContext::from_root(tmp.path()).unwrap();
        let cfg = ctx.update_config();
        assert!(cfg.enabled);
        assert_eq!(cfg.github_repo, "RetroLauncher");
        assert_eq!(cfg.install_root.as_deref(), Some(tmp.path().to_string_lossy().as_ref()));
        assert_eq!(ctx.profiles_path(), tmp.path().join("config.json"));
    }

    #[test]
    fn updater_table_overrides_fields() {
        let val: toml::Value = r#"
            [updater]
            enabled = false
            github_owner = "someone"
            api_base_url = "http://127.0.0.1:9876"
            request_timeout_secs = 5
            download_timeout_secs = 0
        "#
        .parse()
        .unwrap();
        let cfg = parse_update_config(val.get("updater").unwrap());
        assert!(!cfg.enabled);
        assert_eq!(cfg.github_owner, "someone");
        assert_eq!(cfg.github_repo, "RetroLauncher");
        assert_eq!(cfg.api_base_url.as_deref(), Some("http://127.0.0.1:9876"));
        assert_eq!(cfg.request_timeout_secs, 5);
        assert_eq!(cfg.download_timeout_secs, 1);
    }

    #[test]
    fn settings_file_is_read_from_install_root() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("config")).unwrap();
        std::fs::write(
            tmp.path().join(SETTINGS_FILE),
            "[updater]\nstaging_dir = \"/tmp/rl-stage\"\n",
        )
        .unwrap();

        let ctx = AppContext::from_root(tmp.path()).unwrap();
        assert_eq!(ctx.update_config().staging_dir.as_deref(), Some("/tmp/rl-stage"));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("config")).unwrap();
        std::fs::write(tmp.path().join(SETTINGS_FILE), "[updater\nenabled = ").unwrap();
        assert!(AppContext::from_root(tmp.path()).is_err());
    }
}
