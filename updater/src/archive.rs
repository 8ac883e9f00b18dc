//! zip 압축 해제
//!
//! 모든 엔트리가 하나의 최상위 폴더 아래에 있으면 그 폴더를 벗겨내고
//! 내용물을 대상 디렉터리 바로 아래에 배치한다.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::UpdaterError;

/// 압축 해제 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// 벗겨낸 공통 루트 폴더 (없으면 None)
    pub stripped_root: Option<String>,
    pub files: usize,
    pub directories: usize,
}

fn open_archive(archive_path: &Path) -> Result<zip::ZipArchive<fs::File>, UpdaterError> {
    let file = fs::File::open(archive_path)
        .map_err(|e| UpdaterError::io("open archive", archive_path, e))?;
    zip::ZipArchive::new(file).map_err(|e| corrupt(archive_path, e))
}

fn corrupt(archive_path: &Path, err: impl std::fmt::Display) -> UpdaterError {
    UpdaterError::ArchiveCorrupt {
        path: archive_path.to_path_buf(),
        message: err.to_string(),
    }
}

/// 모든 엔트리의 첫 경로 세그먼트가 같으면 그 세그먼트를 반환
pub fn find_common_root(archive_path: &Path) -> Result<Option<String>, UpdaterError> {
    let mut archive = open_archive(archive_path)?;
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(|e| corrupt(archive_path, e))?;
        names.push(entry.name().to_string());
    }
    Ok(common_root_of(names.iter().map(String::as_str)))
}

fn common_root_of<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut common: Option<&str> = None;
    for name in names {
        let root = name.split('/').next().unwrap_or_default();
        if root.is_empty() {
            return None;
        }
        match common {
            None => common = Some(root),
            Some(c) if c != root => return None,
            Some(_) => {}
        }
    }
    common.map(str::to_string)
}

/// 엔트리 이름에서 공통 루트를 제거하고 대상 디렉터리 기준 상대 경로로 변환.
/// 절대 경로나 `..`가 포함되면 None.
fn relative_entry_path(name: &str, root: Option<&str>) -> Option<PathBuf> {
    let stripped = match root {
        Some(r) => name
            .strip_prefix(r)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(name),
        None => name,
    };

    let mut out = PathBuf::new();
    for component in Path::new(stripped).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

/// `archive_path`의 zip을 `destination_dir`에 압축 해제한다.
///
/// 첫 번째 순회에서 공통 루트를 판정하고, 두 번째 순회에서 실제로 파일을 쓴다.
/// 기존 파일은 덮어쓴다.
pub fn extract(archive_path: &Path, destination_dir: &Path) -> Result<ExtractSummary, UpdaterError> {
    let root = find_common_root(archive_path)?;
    let mut archive = open_archive(archive_path)?;

    fs::create_dir_all(destination_dir)
        .map_err(|e| UpdaterError::io("create extract dir", destination_dir, e))?;

    let mut summary = ExtractSummary {
        stripped_root: root.clone(),
        ..Default::default()
    };

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| corrupt(archive_path, e))?;
        let name = entry.name().to_string();
        let relative = relative_entry_path(&name, root.as_deref())
            .ok_or_else(|| corrupt(archive_path, format!("unsafe entry path '{}'", name)))?;
        let out_path = destination_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(|e| UpdaterError::io("create directory", &out_path, e))?;
            summary.directories += 1;
            continue;
        }

        if relative.as_os_str().is_empty() {
            return Err(corrupt(archive_path, format!("file entry '{}' has no name", name)));
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| UpdaterError::io("create directory", parent, e))?;
        }

        let mut outfile = fs::File::create(&out_path)
            .map_err(|e| UpdaterError::io("create file", &out_path, e))?;
        io::copy(&mut entry, &mut outfile).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => corrupt(archive_path, e),
            _ => UpdaterError::io("write file", &out_path, e),
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode().filter(|m| m & 0o777 != 0) {
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o7777))
                    .map_err(|e| UpdaterError::io("set permissions", &out_path, e))?;
            }
        }

        summary.files += 1;
    }

    tracing::info!(
        "[Archive] Extracted {} files into {} (stripped root: {:?})",
        summary.files,
        destination_dir.display(),
        summary.stripped_root
    );
    Ok(summary)
}
