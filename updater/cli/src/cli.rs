//! 업데이터 명령줄 처리
//!
//! ## 사용법
//! ```text
//! retro-launcher-updater <extracted-tree> <install-root>
//! ```
//!
//! ## 종료 코드
//! - `0` — 동기화 완료 (일부 파일 스킵 포함) 후 재시작
//! - `1` — 인자 오류 / 업데이트 트리 읽기 실패 / 재시작 실패
//! - `2` — 재시작할 실행 파일이 없음

use std::path::Path;
use std::time::Duration;

use retro_launcher_updater_lib::handoff::spawn_detached;
use retro_launcher_updater_lib::{apply_update, Platform, ProcessChecker, UpdaterError};

/// 메인 애플리케이션 종료를 기다리는 최대 시간
pub const PARENT_EXIT_TIMEOUT: Duration = Duration::from_secs(15);

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_NO_RELAUNCH_TARGET: i32 = 2;

pub fn run(args: &[String], parent_exit_timeout: Duration) -> i32 {
    run_with(args, parent_exit_timeout, Platform::current(), |target| {
        let working_dir = target.parent().unwrap_or_else(|| Path::new("."));
        spawn_detached(target, &[], working_dir).map(|pid| {
            tracing::info!("[Updater] Application restarted (pid {})", pid);
        })
    })
}

fn run_with<F>(
    args: &[String],
    parent_exit_timeout: Duration,
    platform: Option<Platform>,
    spawn: F,
) -> i32
where
    F: FnOnce(&Path) -> std::io::Result<()>,
{
    let [source, destination] = args else {
        print_usage();
        tracing::error!("[Updater] Expected 2 arguments, got {}", args.len());
        return EXIT_FAILURE;
    };
    let (source, destination) = (Path::new(source), Path::new(destination));

    tracing::info!(
        "[Updater] Update started: {} → {}",
        source.display(),
        destination.display()
    );

    if let Some(platform) = platform {
        let app_name = platform.main_executable_name();
        if !ProcessChecker::wait_for_exit(&app_name, parent_exit_timeout) {
            tracing::warn!(
                "[Updater] {} still running after {}s, continuing anyway",
                app_name,
                parent_exit_timeout.as_secs()
            );
        }
    }

    match apply_update(source, destination, platform, spawn) {
        Ok(report) => {
            if report.is_complete() {
                tracing::info!("[Updater] Update finished");
            } else {
                tracing::warn!(
                    "[Updater] Update finished with {} skipped entries",
                    report.failures.len()
                );
            }
            EXIT_OK
        }
        Err(e @ UpdaterError::RelaunchTargetMissing(_)) => {
            tracing::error!("[Updater] {}", e);
            EXIT_NO_RELAUNCH_TARGET
        }
        Err(e) => {
            tracing::error!("[Updater] {}", e);
            EXIT_FAILURE
        }
    }
}

fn print_usage() {
    eprintln!("RetroLauncher updater {}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("Usage: retro-launcher-updater <extracted-tree> <install-root>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn args(a: &Path, b: &Path) -> Vec<String> {
        vec![a.to_string_lossy().to_string(), b.to_string_lossy().to_string()]
    }

    #[test]
    fn wrong_argument_count_is_usage_error() {
        let code = run_with(&["only-one".to_string()], Duration::ZERO, None, |_| Ok(()));
        assert_eq!(code, EXIT_FAILURE);
        assert_eq!(run_with(&[], Duration::ZERO, None, |_| Ok(())), EXIT_FAILURE);
    }

    #[test]
    fn unreadable_source_exits_one() {
        let tmp = tempfile::tempdir().unwrap();
        let code = run_with(
            &args(&tmp.path().join("missing"), tmp.path()),
            Duration::ZERO,
            Some(Platform::Linux),
            |_| Ok(()),
        );
        assert_eq!(code, EXIT_FAILURE);
    }

    #[test]
    fn missing_relaunch_target_exits_two() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("tree");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("data.bin"), b"d").unwrap();

        let code = run_with(
            &args(&src, &tmp.path().join("install")),
            Duration::ZERO,
            Some(Platform::Linux),
            |_| panic!("nothing should be spawned"),
        );
        assert_eq!(code, EXIT_NO_RELAUNCH_TARGET);
        assert!(tmp.path().join("install").join("data.bin").is_file());
    }

    #[test]
    fn successful_update_relaunches_main_binary() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("tree");
        let install = tmp.path().join("install");
        fs::create_dir_all(src.join("lib")).unwrap();
        fs::write(src.join("retro-launcher"), b"new").unwrap();
        fs::write(src.join("lib").join("core.dat"), b"core").unwrap();
        fs::create_dir_all(&install).unwrap();
        fs::write(install.join("retro-launcher"), b"old").unwrap();

        let mut launched: Option<PathBuf> = None;
        let code = run_with(&args(&src, &install), Duration::ZERO, Some(Platform::Linux), |t| {
            launched = Some(t.to_path_buf());
            Ok(())
        });

        assert_eq!(code, EXIT_OK);
        assert_eq!(launched, Some(install.join("retro-launcher")));
        assert_eq!(fs::read(install.join("retro-launcher")).unwrap(), b"new");
        assert!(install.join("lib").join("core.dat").is_file());
        assert!(!src.exists());
    }

    #[test]
    fn relaunch_spawn_failure_exits_one() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("tree");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("retro-launcher"), b"bin").unwrap();

        let code = run_with(
            &args(&src, &tmp.path().join("install")),
            Duration::ZERO,
            Some(Platform::Linux),
            |_| Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied")),
        );
        assert_eq!(code, EXIT_FAILURE);
    }
}
