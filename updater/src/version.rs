//! 점(.)으로 구분된 버전 비교 유틸리티 + VERSION 파일 판독

use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::UpdaterError;

/// 설치 루트에 위치하는 버전 마커 파일 이름
pub const VERSION_FILE: &str = "VERSION";

/// 버전을 알 수 없을 때 표시되는 문자열
pub const VERSION_UNKNOWN: &str = "unknown";

/// 음이 아닌 정수 토큰의 나열. 빠진 뒤쪽 토큰은 0으로 취급한다.
#[derive(Debug, Clone)]
pub struct Version {
    parts: Vec<u64>,
}

impl Version {
    /// "v1.2.3" 또는 "1.2" 형식을 파싱. 숫자가 아닌 토큰은 에러.
    pub fn parse(s: &str) -> Result<Self, UpdaterError> {
        let trimmed = s.trim();
        let body = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let parts = body
            .split('.')
            .map(|token| {
                token.parse::<u64>().map_err(|_| UpdaterError::InvalidVersion {
                    input: s.to_string(),
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    /// 다른 버전보다 새로운 버전인지 확인
    pub fn is_newer_than(&self, other: &Version) -> bool {
        self > other
    }
}

/// `candidate`가 `baseline`보다 새로운지 판정
pub fn is_newer(candidate: &str, baseline: &str) -> Result<bool, UpdaterError> {
    Ok(Version::parse(candidate)?.is_newer_than(&Version::parse(baseline)?))
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            let a = self.parts.get(i).copied().unwrap_or(0);
            let b = other.parts.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .parts
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&joined)
    }
}

/// 로컬 설치본의 버전
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalVersion {
    Known(String),
    Unknown,
}

impl LocalVersion {
    pub fn is_unknown(&self) -> bool {
        matches!(self, LocalVersion::Unknown)
    }
}

impl fmt::Display for LocalVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalVersion::Known(tag) => f.write_str(tag),
            LocalVersion::Unknown => f.write_str(VERSION_UNKNOWN),
        }
    }
}

fn version_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^v([0-9]+\.)+[0-9]+$").expect("valid version regex"))
}

/// `<install_root>/VERSION`에서 패턴에 맞는 첫 줄을 현재 버전으로 읽는다.
pub fn read_local_version(install_root: &Path) -> LocalVersion {
    let path = install_root.join(VERSION_FILE);
    if !path.exists() {
        return LocalVersion::Unknown;
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .find(|line| version_line_pattern().is_match(line))
            .map(|line| LocalVersion::Known(line.to_string()))
            .unwrap_or(LocalVersion::Unknown),
        Err(e) => {
            tracing::error!("[Version] Failed to read {}: {}", path.display(), e);
            LocalVersion::Unknown
        }
    }
}
