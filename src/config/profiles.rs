//! 런처 프로필 저장소 (`<install_root>/config.json`) 읽기 전용 뷰
//!
//! 실행에 필요한 필드만 읽고 나머지는 무시한다.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum ProfileError {
    #[error("Failed to read profile store '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse profile store '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Profile index {index} is out of range ({count} profiles)")]
    NoCurrentProfile { index: usize, count: usize },
}

/// 에뮬레이터/ROM 실행 인자 문자열
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LaunchParameters {
    #[serde(default)]
    pub launch_parameters: Option<String>,
}

impl LaunchParameters {
    pub fn as_str(&self) -> &str {
        self.launch_parameters.as_deref().unwrap_or("")
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Emulator {
    pub id: u32,
    pub name: String,
    pub executable_path: String,
    #[serde(default)]
    pub supported_consoles: Vec<String>,
    #[serde(default)]
    pub launch_parameters: Option<LaunchParameters>,
}

impl Emulator {
    /// 에뮬레이터 수준 인자 템플릿
    pub fn argument_template(&self) -> &str {
        self.launch_parameters.as_ref().map(LaunchParameters::as_str).unwrap_or("")
    }

    /// 콘솔 이름은 대소문자 구분 없이 비교
    pub fn supports_any(&self, consoles: &[String]) -> bool {
        self.supported_consoles
            .iter()
            .any(|s| consoles.iter().any(|c| c.eq_ignore_ascii_case(s)))
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Rom {
    pub name: String,
    pub file_path: String,
    #[serde(default)]
    pub consoles: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub favorite: Option<bool>,
    /// 에뮬레이터 ID → ROM 전용 인자
    #[serde(default)]
    pub launch_parameters: HashMap<u32, LaunchParameters>,
}

impl Rom {
    /// 지정한 에뮬레이터에 대한 ROM 전용 인자 템플릿 (없으면 빈 문자열)
    pub fn override_template(&self, emulator_id: u32) -> &str {
        self.launch_parameters
            .get(&emulator_id)
            .map(LaunchParameters::as_str)
            .unwrap_or("")
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub emulators: Vec<Emulator>,
    #[serde(default)]
    pub roms: Vec<Rom>,
}

impl UserProfile {
    /// 이름(대소문자 무시) 또는 숫자 ID로 에뮬레이터 검색
    pub fn find_emulator(&self, key: &str) -> Option<&Emulator> {
        let by_id = key.parse::<u32>().ok();
        self.emulators
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(key) || Some(e.id) == by_id)
    }

    pub fn find_rom(&self, name: &str) -> Option<&Rom> {
        self.roms.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// ROM의 콘솔 중 하나라도 지원하는 에뮬레이터 목록
    pub fn compatible_emulators<'a>(&'a self, rom: &'a Rom) -> impl Iterator<Item = &'a Emulator> {
        self.emulators.iter().filter(|e| e.supports_any(&rom.consoles))
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct LauncherConfig {
    #[serde(default)]
    pub profiles: Vec<UserProfile>,
    #[serde(default)]
    pub current_user_profile_index: usize,
}

impl LauncherConfig {
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: display.clone(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ProfileError::Parse {
            path: display,
            source,
        })
    }

    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn current_profile(&self) -> Result<&UserProfile, ProfileError> {
        self.profiles
            .get(self.current_user_profile_index)
            .ok_or(ProfileError::NoCurrentProfile {
                index: self.current_user_profile_index,
                count: self.profiles.len(),
            })
    }
}
