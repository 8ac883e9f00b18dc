use std::io::{self, BufRead, Write};

use anyhow::Context;
use retro_launcher::config::AppContext;
use retro_launcher::launch;
use retro_launcher::startup::{run_startup_update, StartupOutcome, UpdatePrompt};
use retro_launcher_updater_lib::{version, AvailableUpdate, NoUpdateReason};
use tokio_util::sync::CancellationToken;

/// 터미널 yes/no 프롬프트
///
/// 업데이트를 수락한 뒤에만 Ctrl+C를 가로채 다운로드 취소로 바꾼다.
/// 그 전에는 Ctrl+C가 기본 동작대로 프로세스를 끝낸다.
struct ConsolePrompt {
    cancel: CancellationToken,
    interrupt: Option<tokio::task::JoinHandle<()>>,
}

impl ConsolePrompt {
    fn new(cancel: CancellationToken) -> Self {
        Self { cancel, interrupt: None }
    }

    fn watch_interrupt(&mut self) {
        let cancel = self.cancel.clone();
        self.interrupt = Some(tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, cancelling update");
                cancel.cancel();
            }
        }));
    }
}

impl Drop for ConsolePrompt {
    fn drop(&mut self) {
        if let Some(handle) = self.interrupt.take() {
            handle.abort();
        }
    }
}

impl UpdatePrompt for ConsolePrompt {
    async fn confirm_update(&mut self, update: &AvailableUpdate) -> bool {
        print!(
            "A new version {} is available (current: {}). Update now? [y/N] ",
            update.latest_tag, update.current
        );
        let _ = io::stdout().flush();

        let answer = tokio::task::spawn_blocking(|| {
            let mut answer = String::new();
            io::stdin().lock().read_line(&mut answer).map(|_| answer)
        })
        .await;

        let accepted = match answer {
            Ok(Ok(answer)) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            _ => false,
        };
        if accepted {
            self.watch_interrupt();
        }
        accepted
    }

    fn notify_failure(&mut self, message: &str) {
        eprintln!("✗ {}", message);
    }
}

fn print_help() {
    println!("RetroLauncher {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage:");
    println!("  retro-launcher [update]              Check for updates and install if accepted");
    println!("  retro-launcher launch <emu> <rom>    Launch a ROM with an emulator (name or id)");
    println!("  retro-launcher emulators <rom>       List emulators compatible with a ROM");
    println!("  retro-launcher version               Show the installed version");
    println!("  retro-launcher help                  Show this help");
    println!();
    println!("Environment: RETRO_LAUNCHER_HOME overrides the install directory.");
}

async fn cmd_update(ctx: &AppContext) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let mut prompt = ConsolePrompt::new(cancel.clone());

    let outcome = run_startup_update(ctx, &mut prompt, cancel).await;
    drop(prompt);

    match outcome? {
        StartupOutcome::HandedOff { pid } => {
            tracing::info!("Updater started (pid {}), exiting", pid);
            std::process::exit(0);
        }
        StartupOutcome::NoUpdate(NoUpdateReason::Disabled) => println!("Updates are disabled."),
        StartupOutcome::NoUpdate(_) => println!("No update available."),
        StartupOutcome::Declined => println!("Update skipped."),
        StartupOutcome::Cancelled => println!("Update cancelled."),
        StartupOutcome::Failed(_) => println!("Continuing with the installed version."),
    }
    Ok(())
}

fn cmd_launch(ctx: &AppContext, args: &[String]) -> anyhow::Result<()> {
    let [emulator, rom] = args else {
        anyhow::bail!("Usage: retro-launcher launch <emulator> <rom>");
    };
    let profiles = ctx.load_profiles()?;
    let profile = profiles.current_profile()?;
    let pid = launch::launch(profile, emulator, rom)?;
    println!("✓ Started {} (pid {})", emulator, pid);
    Ok(())
}

fn cmd_emulators(ctx: &AppContext, args: &[String]) -> anyhow::Result<()> {
    let [rom_name] = args else {
        anyhow::bail!("Usage: retro-launcher emulators <rom>");
    };
    let profiles = ctx.load_profiles()?;
    let profile = profiles.current_profile()?;
    let rom = profile
        .find_rom(rom_name)
        .ok_or_else(|| launch::LaunchError::RomNotFound(rom_name.clone()))?;

    let mut found = false;
    for emulator in profile.compatible_emulators(rom) {
        found = true;
        println!("  [{}] {}", emulator.id, emulator.name);
    }
    if !found {
        println!("No emulator in profile '{}' supports {:?}", profile.username, rom.consoles);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("update");

    if matches!(command, "help" | "--help" | "-h") {
        print_help();
        return Ok(());
    }

    let ctx = AppContext::load().context("Failed to load launcher settings")?;
    tracing::info!("RetroLauncher starting (install root: {})", ctx.install_root().display());

    match command {
        "update" => cmd_update(&ctx).await,
        "launch" => cmd_launch(&ctx, &args[1..]),
        "emulators" => cmd_emulators(&ctx, &args[1..]),
        "version" | "--version" | "-V" => {
            println!(
                "RetroLauncher {} (installed: {})",
                env!("CARGO_PKG_VERSION"),
                version::read_local_version(ctx.install_root())
            );
            Ok(())
        }
        other => {
            eprintln!("✗ Unknown command: {}", other);
            eprintln!("  Run 'retro-launcher help' for usage.");
            std::process::exit(1);
        }
    }
}
