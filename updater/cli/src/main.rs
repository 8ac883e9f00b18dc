//! RetroLauncher 업데이터 실행 파일
//!
//! 메인 애플리케이션이 업데이트 트리 안의 이 실행 파일을
//! `retro-launcher-updater <extracted-tree> <install-root>` 형태로 분리 실행한다.

mod cli;

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "retro-launcher-updater.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// `<install-root>/retro-launcher-updater.log`에 로그 기록.
/// 분리 실행되어 콘솔이 없으므로 파일이 유일한 기록 수단이다.
fn init_file_logging(install_root: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(install_root)
        .with_context(|| format!("creating {}", install_root.display()))?;
    let path = install_root.join(LOG_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_env_filter(env_filter())
        .with_target(false)
        .init();
    Ok(())
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter())
        .with_target(false)
        .init();
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.get(1).map(Path::new) {
        Some(install_root) => {
            if let Err(e) = init_file_logging(install_root) {
                init_stderr_logging();
                tracing::warn!("[Updater] File logging unavailable, using stderr: {:#}", e);
            }
        }
        None => init_stderr_logging(),
    }

    std::process::exit(cli::run(&args, cli::PARENT_EXIT_TIMEOUT));
}
