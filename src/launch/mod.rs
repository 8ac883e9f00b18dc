//! 에뮬레이터 실행 명령 조립
//!
//! 에뮬레이터 인자 템플릿과 ROM 전용 인자 템플릿을 플레이스홀더로 합치고,
//! 따옴표를 존중하는 공백 분리로 argv를 만든다.
//!
//! - `{emu}`: ROM 템플릿 안에서 에뮬레이터 템플릿 자리
//! - `{rom}`: 따옴표로 감싼 ROM 경로 자리 (없으면 끝에 추가)

mod error;

pub use error::LaunchError;

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::{Emulator, Rom};

pub const EMULATOR_ARGS_PLACEHOLDER: &str = "{emu}";
pub const TARGET_PATH_PLACEHOLDER: &str = "{rom}";

/// 한 번의 실행에 필요한 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub executable_path: PathBuf,
    pub argument_template: String,
    pub override_template: String,
    pub target_path: PathBuf,
}

/// 실제로 실행할 프로세스. `build_command`로만 만들어지며 argv는 항상 실행 파일로 시작한다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    argv: Vec<String>,
    working_dir: PathBuf,
}

impl LaunchSpec {
    pub fn new(
        executable_path: impl Into<PathBuf>,
        argument_template: impl Into<String>,
        override_template: impl Into<String>,
        target_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executable_path: executable_path.into(),
            argument_template: argument_template.into(),
            override_template: override_template.into(),
            target_path: target_path.into(),
        }
    }

    /// 프로필의 에뮬레이터/ROM으로부터 생성. 상대 경로는 현재 디렉터리 기준 절대 경로로 변환.
    pub fn for_rom(emulator: &Emulator, rom: &Rom) -> Self {
        Self::new(
            absolutize(Path::new(&emulator.executable_path)),
            emulator.argument_template(),
            rom.override_template(emulator.id),
            absolutize(Path::new(&rom.file_path)),
        )
    }

    pub fn working_dir(&self) -> PathBuf {
        working_dir_of(&self.executable_path)
    }

    pub fn to_command(&self) -> LaunchCommand {
        build_command(
            &self.executable_path,
            &self.argument_template,
            &self.override_template,
            &self.target_path,
        )
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn working_dir_of(executable: &Path) -> PathBuf {
    match executable.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// `{emu}` 치환 또는 공백 연결 (결과는 trim)
pub fn compose_arguments(emulator_template: &str, target_template: &str) -> String {
    if target_template.contains(EMULATOR_ARGS_PLACEHOLDER) {
        target_template
            .replace(EMULATOR_ARGS_PLACEHOLDER, emulator_template)
            .trim()
            .to_string()
    } else {
        format!("{} {}", emulator_template, target_template)
            .trim()
            .to_string()
    }
}

/// `{rom}`을 따옴표로 감싼 경로로 치환, 없으면 끝에 추가
pub fn substitute_target(arguments: &str, target_path: &str) -> String {
    let quoted = format!("\"{}\"", target_path);
    let result = if arguments.contains(TARGET_PATH_PLACEHOLDER) {
        arguments.replace(TARGET_PATH_PLACEHOLDER, &quoted)
    } else {
        format!("{} {}", arguments, quoted)
    };
    result.trim().to_string()
}

/// 공백으로 분리하되 큰/작은따옴표로 묶인 부분은 하나의 토큰으로 취급.
/// 따옴표는 제거되며, 닫히지 않은 따옴표는 문자열 끝까지 이어진다.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for ch in input.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_token = true;
            }
            None if ch.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(ch);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}

/// 실행 파일 경로 + 두 템플릿 + 대상 경로 → argv와 작업 디렉터리
pub fn build_command(
    executable_path: &Path,
    emulator_template: &str,
    target_template: &str,
    target_path: &Path,
) -> LaunchCommand {
    let exe = executable_path.to_string_lossy().to_string();
    let target = target_path.to_string_lossy().to_string();

    let combined = compose_arguments(emulator_template, target_template);
    let arguments = substitute_target(&combined, &target);
    let tokens = tokenize(&arguments);

    let mut argv = Vec::with_capacity(tokens.len() + 1);
    argv.push(exe);
    if tokens.is_empty() {
        argv.push(target);
    } else {
        argv.extend(tokens);
    }

    LaunchCommand {
        argv,
        working_dir: working_dir_of(executable_path),
    }
}

impl LaunchCommand {
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    /// 프로세스를 분리 실행하고 기다리지 않는다
    pub fn spawn(&self) -> Result<u32, LaunchError> {
        let mut cmd = Command::new(self.program());
        cmd.args(self.args())
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        crate::utils::apply_creation_flags(&mut cmd);

        let child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            executable: PathBuf::from(self.program()),
            source,
        })?;
        Ok(child.id())
    }
}

/// 현재 프로필에서 ROM과 에뮬레이터를 찾아 실행
pub fn launch(
    profile: &crate::config::UserProfile,
    emulator_key: &str,
    rom_name: &str,
) -> Result<u32, LaunchError> {
    let emulator = profile
        .find_emulator(emulator_key)
        .ok_or_else(|| LaunchError::EmulatorNotFound(emulator_key.to_string()))?;
    let rom = profile
        .find_rom(rom_name)
        .ok_or_else(|| LaunchError::RomNotFound(rom_name.to_string()))?;

    let command = LaunchSpec::for_rom(emulator, rom).to_command();
    tracing::info!("[Launch] {} with ROM {}: {:?}", emulator.name, rom.name, command.argv);

    match command.spawn() {
        Ok(pid) => {
            tracing::info!("[Launch] Launched emulator {} (pid {})", emulator.name, pid);
            Ok(pid)
        }
        Err(e) => {
            tracing::error!("[Launch] Failed to launch emulator: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tail(cmd: &LaunchCommand) -> Vec<&str> {
        cmd.args().iter().map(String::as_str).collect()
    }

    #[test]
    fn emulator_args_then_target() {
        let cmd = build_command(Path::new("/emu/snes"), "-fullscreen", "", Path::new("/roms/g.bin"));
        assert_eq!(cmd.program(), "/emu/snes");
        assert_eq!(tail(&cmd), vec!["-fullscreen", "/roms/g.bin"]);
        assert_eq!(cmd.working_dir, PathBuf::from("/emu"));
    }

    #[test]
    fn emu_placeholder_is_replaced() {
        assert_eq!(compose_arguments("-v", "{emu} -fast"), "-v -fast");
        let cmd = build_command(Path::new("/emu/x"), "-v", "{emu} -fast", Path::new("/r/a.rom"));
        assert_eq!(tail(&cmd), vec!["-v", "-fast", "/r/a.rom"]);
    }

    #[test]
    fn rom_placeholder_substituted_once_not_appended() {
        let cmd = build_command(
            Path::new("/emu/x"),
            "-L core --rom={rom}",
            "",
            Path::new("/roms/Super Game.sfc"),
        );
        assert_eq!(tail(&cmd), vec!["-L", "core", "--rom=/roms/Super Game.sfc"]);
    }

    #[test]
    fn every_rom_placeholder_is_replaced() {
        assert_eq!(substitute_target("{rom} {rom}", "/a"), "\"/a\" \"/a\"");
    }

    #[test]
    fn empty_templates_default_to_target_only() {
        let cmd = build_command(Path::new("/emu/x"), "", "", Path::new("/roms/g.bin"));
        assert_eq!(cmd.argv, vec!["/emu/x", "/roms/g.bin"]);
    }

    #[test]
    fn target_path_with_spaces_is_one_argument() {
        let cmd = build_command(Path::new("emu"), "", "", Path::new("/my roms/g.bin"));
        assert_eq!(tail(&cmd), vec!["/my roms/g.bin"]);
        assert_eq!(cmd.working_dir, PathBuf::from("."));
    }

    #[test]
    fn tokenizer_handles_quotes() {
        assert_eq!(tokenize(r#"a "b c" 'd e' f"#), vec!["a", "b c", "d e", "f"]);
        assert_eq!(tokenize(r#"--x="1 2""#), vec!["--x=1 2"]);
        assert_eq!(tokenize(r#"a "unterminated rest"#), vec!["a", "unterminated rest"]);
        assert_eq!(tokenize(r#""""#), vec![""]);
        assert!(tokenize("   ").is_empty());
        assert_eq!(tokenize(r#""it's""#), vec!["it's"]);
    }

    #[test]
    fn spawn_failure_is_reported() {
        let cmd = LaunchCommand {
            argv: vec!["/definitely/not/an/emulator".into(), "rom".into()],
            working_dir: std::env::temp_dir(),
        };
        assert!(matches!(cmd.spawn(), Err(LaunchError::Spawn { .. })));
    }

    #[test]
    fn empty_executable_path_is_spawn_error() {
        let cmd = build_command(Path::new(""), "", "", Path::new(""));
        assert_eq!(cmd.program(), "");
        assert_eq!(cmd.args(), [String::new()]);
        assert!(matches!(cmd.spawn(), Err(LaunchError::Spawn { .. })));

        let bare = LaunchCommand { argv: Vec::new(), working_dir: std::env::temp_dir() };
        assert_eq!(bare.program(), "");
        assert!(bare.args().is_empty());
        assert!(matches!(bare.spawn(), Err(LaunchError::Spawn { .. })));
    }

    #[test]
    fn spec_for_rom_uses_per_emulator_override() {
        let emulator: Emulator = serde_json::from_str(
            r#"{"id": 7, "name": "Emu", "executablePath": "/emu/run",
                "launchParameters": {"launchParameters": "-a"}}"#,
        )
        .unwrap();
        let rom: Rom = serde_json::from_str(
            r#"{"name": "G", "filePath": "/roms/g.bin",
                "launchParameters": {"7": {"launchParameters": "{emu} -b"}}}"#,
        )
        .unwrap();

        let spec = LaunchSpec::for_rom(&emulator, &rom);
        assert_eq!(spec.working_dir(), PathBuf::from("/emu"));
        assert_eq!(tail(&spec.to_command()), vec!["-a", "-b", "/roms/g.bin"]);
    }
}
