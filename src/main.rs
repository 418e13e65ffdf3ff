use cctasks::app::{AppError, SessionManager};
use cctasks::cli::{CliCommand, CliContext, CliInvocation, CliRunError, GlobalOptions};
use cctasks::infra::{
    ClaudeLayout, Preferences, clamp_orphan_age_days, load_preferences, resolve_claude_dir,
    resolve_state_dir,
};
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Error)]
enum MainError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Cli(#[from] CliRunError),
}

fn main() {
    init_tracing();
    if let Err(error) = run_main() {
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{error}");
        std::process::exit(1);
    }
}

/// Opt-in via `RUST_LOG`; empty or oversized filters fall back to `off`.
fn init_tracing() {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new("off"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn run_main() -> Result<(), MainError> {
    let args = std::env::args().collect::<Vec<_>>();
    let invocation = match cctasks::cli::parse_invocation(&args) {
        Ok(invocation) => invocation,
        Err(error) => {
            let mut err = io::stderr().lock();
            let _ = writeln!(err, "{error}");
            let _ = writeln!(err);
            print_help();
            std::process::exit(2);
        }
    };

    match invocation {
        CliInvocation::PrintHelp => {
            print_help();
            Ok(())
        }
        CliInvocation::PrintVersion => {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliInvocation::Run { options, command } => run_command(options, command),
    }
}

fn run_command(options: GlobalOptions, command: CliCommand) -> Result<(), MainError> {
    let state_dir = resolve_state_dir().map_err(AppError::from)?;
    let preferences = load_preferences(&state_dir).map_err(AppError::from)?;
    let root = resolve_root(&options, &preferences)?;
    let age_days = clamp_orphan_age_days(options.age_days.unwrap_or(preferences.orphan_age_days));

    let mut manager = SessionManager::new(ClaudeLayout::new(root));
    if preferences.auto_remove_completed_sessions && !matches!(command, CliCommand::Prefs { .. }) {
        manager.load_sessions();
        let removed = manager.delete_completed_sessions();
        if removed > 0 {
            info!(removed, "removed completed sessions on start");
        }
    }

    let ctx = CliContext {
        manager: &mut manager,
        age_days,
        state_dir: Some(state_dir.as_path()),
        preferences,
    };
    cctasks::cli::run(command, ctx)?;
    Ok(())
}

fn resolve_root(options: &GlobalOptions, preferences: &Preferences) -> Result<PathBuf, AppError> {
    if let Some(root) = &options.root {
        return Ok(root.clone());
    }
    if let Some(root) = &preferences.claude_directory {
        return Ok(root.clone());
    }
    Ok(resolve_claude_dir()?)
}

fn print_help() {
    let text = format!(
        "{name} - inspect and clean up agent task sessions\n\nUSAGE:\n  {name} [--root DIR] [--age-days N] [COMMAND]\n\nCOMMANDS:\n  sessions [--project ID] [--orphans]   List sessions (default command)\n  projects                              List projects that have task sessions\n  tasks [--session ID] [--project ID] [--query TEXT] [--board]\n                                        List tasks for the current selection\n  clean (--orphans | --completed) [--dry-run]\n                                        Delete orphaned or fully completed sessions\n  delete SESSION_ID                     Delete one session's task folder\n  note SESSION_ID TASK_ID TEXT...       Append a note to a task's description\n  watch                                 Reload and print a summary on every change\n  prefs [set KEY VALUE]                 Show or change preferences\n  --help | --version\n\nGLOBAL FLAGS:\n  --root DIR      Root directory holding tasks/ and projects/ (default: ~/.claude)\n  --age-days N    Orphan age threshold in days, clamped to 7..=90 (default: 30)\n\nOUTPUT:\n  sessions: modified_at<TAB>session_id<TAB>name<TAB>completed/total<TAB>in_progress<TAB>project<TAB>orphan_reason\n  projects: project_id<TAB>name<TAB>path<TAB>sessions<TAB>tasks<TAB>active\n  tasks:    session_id<TAB>task_id<TAB>status<TAB>title<TAB>blockers\n\nENV:\n  CLAUDE_DIR         Override the root directory\n  CCTASKS_STATE_DIR  Override where preferences.json lives (default: ~/.cctasks)\n  RUST_LOG           Enable diagnostics on stderr (e.g. RUST_LOG=cctasks=debug)\n",
        name = env!("CARGO_PKG_NAME")
    );
    let mut out = io::stdout().lock();
    let _ = write!(out, "{text}");
}
