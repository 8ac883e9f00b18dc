use std::path::PathBuf;

/// 에뮬레이터 실행 에러
#[derive(thiserror::Error, Debug)]
pub enum LaunchError {
    #[error("Emulator '{0}' not found in the current profile")]
    EmulatorNotFound(String),

    #[error("ROM '{0}' not found in the current profile")]
    RomNotFound(String),

    #[error("Failed to start '{}': {source}", .executable.display())]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
