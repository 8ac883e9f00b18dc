//! 업데이터 핸드오프 — 실행 중인 애플리케이션이 자기 자신을 덮어쓰지 않도록
//! 별도 프로세스에 파일 교체를 맡긴다.
//!
//! ## 2단계 업데이트 플로우
//! 1. 메인 애플리케이션: 버전 체크 + 다운로드 + 압축 해제 → 업데이터 스폰 → 종료
//! 2. 업데이터: 메인 프로세스 종료 대기 → 파일 동기화 → 메인 애플리케이션 재시작

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::UpdaterError;

/// 부모 콘솔/잡과 분리된 독립 프로세스로 실행
pub fn spawn_detached(exe: &Path, args: &[&Path], working_dir: &Path) -> std::io::Result<u32> {
    let mut cmd = Command::new(exe);
    cmd.args(args).current_dir(working_dir);

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        // DETACHED_PROCESS | CREATE_BREAKAWAY_FROM_JOB | CREATE_NEW_PROCESS_GROUP
        cmd.creation_flags(0x00000008 | 0x01000000 | 0x00000200);
    }

    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(child.id())
}

/// unix에서 실행 권한 부여. 다른 플랫폼에서는 아무것도 하지 않음.
pub fn make_executable(path: &Path) -> Result<(), UpdaterError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perm = std::fs::metadata(path)
            .map_err(|e| UpdaterError::io("read permissions", path, e))?
            .permissions();
        perm.set_mode(perm.mode() | 0o755);
        std::fs::set_permissions(path, perm)
            .map_err(|e| UpdaterError::io("set permissions", path, e))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// 셀프 업데이트 실행기
///
/// 압축 해제된 업데이트 트리 안의 업데이터를
/// `<updater> <extracted-tree> <install-root>` 형태로 실행한다.
/// 이 함수 호출 후 현재 프로세스는 종료되어야 합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfUpdater {
    /// 업데이터 실행 파일 경로 (압축 해제 트리 내부)
    pub updater_exe: PathBuf,
    /// 압축 해제된 업데이트 트리
    pub staged_dir: PathBuf,
    /// 덮어쓸 설치 루트
    pub install_root: PathBuf,
}

impl SelfUpdater {
    pub fn new(updater_exe: PathBuf, staged_dir: PathBuf, install_root: PathBuf) -> Self {
        Self {
            updater_exe,
            staged_dir,
            install_root,
        }
    }

    /// 업데이터에 전달할 위치 인자
    pub fn args(&self) -> [&Path; 2] {
        [self.staged_dir.as_path(), self.install_root.as_path()]
    }

    /// 업데이터 스폰. 종료를 기다리지 않는다.
    pub fn execute(&self) -> Result<u32, UpdaterError> {
        make_executable(&self.updater_exe)?;

        let pid = spawn_detached(&self.updater_exe, &self.args(), &self.staged_dir)
            .map_err(|e| UpdaterError::io("spawn updater", &self.updater_exe, e))?;

        tracing::info!(
            "[SelfUpdate] Updater spawned (pid {}), current process should exit now",
            pid
        );
        Ok(pid)
    }
}

/// 프로세스 체커 — 특정 프로세스가 실행 중인지 확인
pub struct ProcessChecker;

impl ProcessChecker {
    /// 프로세스 이름으로 실행 중인지 확인
    #[cfg(target_os = "windows")]
    pub fn is_running(process_name: &str) -> bool {
        let output = Command::new("tasklist")
            .args(["/FI", &format!("IMAGENAME eq {}", process_name)])
            .output();

        match output {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                stdout.contains(process_name)
            }
            Err(_) => false,
        }
    }

    #[cfg(not(target_os = "windows"))]
    pub fn is_running(process_name: &str) -> bool {
        let output = Command::new("pgrep").arg("-x").arg(process_name).output();

        match output {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }

    /// 프로세스 종료 대기. 시간 안에 종료되면 true.
    pub fn wait_for_exit(process_name: &str, timeout: Duration) -> bool {
        let start = Instant::now();

        while start.elapsed() < timeout {
            if !Self::is_running(process_name) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(500));
        }

        false
    }
}
