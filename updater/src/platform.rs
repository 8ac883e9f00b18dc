//! 플랫폼 판별 — 시작 시 한 번 결정하여 에셋 선택/실행 파일 이름에 사용

use serde::{Deserialize, Serialize};

/// 메인 애플리케이션 실행 파일 기본 이름
pub const APP_BINARY_NAME: &str = "retro-launcher";

/// 업데이트 패키지에 포함된 업데이터 실행 파일 기본 이름
pub const UPDATER_BINARY_NAME: &str = "retro-launcher-updater";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    /// 현재 프로세스가 실행 중인 OS 계열. 지원하지 않는 OS면 None.
    pub fn current() -> Option<Self> {
        Self::from_os_name(std::env::consts::OS)
    }

    /// `std::env::consts::OS` 형식의 이름으로부터 판별
    pub fn from_os_name(os: &str) -> Option<Self> {
        match os {
            "windows" => Some(Platform::Windows),
            "macos" => Some(Platform::MacOs),
            "linux" | "freebsd" | "netbsd" | "openbsd" | "dragonfly" | "aix" => {
                Some(Platform::Linux)
            }
            _ => None,
        }
    }

    /// 릴리스 에셋 URL에 포함되는 플랫폼 조각
    pub fn asset_fragment(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::MacOs => "macos",
            Platform::Linux => "ubuntu",
        }
    }

    pub fn exe_suffix(&self) -> &'static str {
        match self {
            Platform::Windows => ".exe",
            Platform::MacOs | Platform::Linux => "",
        }
    }

    pub fn main_executable_name(&self) -> String {
        format!("{}{}", APP_BINARY_NAME, self.exe_suffix())
    }

    pub fn updater_executable_name(&self) -> String {
        format!("{}{}", UPDATER_BINARY_NAME, self.exe_suffix())
    }
}
