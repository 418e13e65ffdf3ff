use crate::app::SessionManager;
use crate::domain::{Session, Task, TaskBoard, TaskStatus};
use crate::infra::{
    AddNoteError, DeleteSessionError, Preferences, SavePreferencesError, SetPreferenceError,
    WatchError, WatchSignal, save_preferences, watch_trees,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::warn;

const WATCH_QUIET_PERIOD: Duration = Duration::from_millis(500);

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliInvocation {
    PrintHelp,
    PrintVersion,
    Run {
        options: GlobalOptions,
        command: CliCommand,
    },
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct GlobalOptions {
    pub root: Option<PathBuf>,
    pub age_days: Option<u32>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CleanTarget {
    Orphans,
    Completed,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliCommand {
    Sessions {
        project: Option<String>,
        orphans_only: bool,
    },
    Projects,
    Tasks {
        session: Option<String>,
        project: Option<String>,
        query: String,
        board: bool,
    },
    Clean {
        target: CleanTarget,
        dry_run: bool,
    },
    Delete {
        session_id: String,
    },
    Note {
        session_id: String,
        task_id: String,
        text: String,
    },
    Watch,
    Prefs {
        set: Option<(String, String)>,
    },
}

#[derive(Debug, Error)]
pub enum CliParseError {
    #[error("unknown subcommand: {0}")]
    UnknownSubcommand(String),

    #[error("unknown flag: {0}")]
    UnknownFlag(String),

    #[error("missing value for flag: {0}")]
    MissingFlagValue(String),

    #[error("invalid value for {flag}: {value}")]
    InvalidFlagValue { flag: String, value: String },

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),

    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
}

/// Help and version flags count before the subcommand, as a subcommand's
/// first argument, or among its flags. Flag values and note text are taken
/// verbatim.
pub fn parse_invocation(args: &[String]) -> Result<CliInvocation, CliParseError> {
    let mut iter = args.iter().skip(1).peekable();
    let mut options = GlobalOptions::default();
    while let Some(&arg) = iter.peek() {
        match arg.as_str() {
            "--root" | "-r" => {
                let _ = iter.next();
                let value = iter
                    .next()
                    .ok_or_else(|| CliParseError::MissingFlagValue("--root".to_string()))?;
                options.root = Some(PathBuf::from(value));
            }
            "--age-days" | "-a" => {
                let _ = iter.next();
                let value = iter
                    .next()
                    .ok_or_else(|| CliParseError::MissingFlagValue("--age-days".to_string()))?;
                options.age_days = Some(parse_u32_flag("--age-days", value)?);
            }
            "--help" | "-h" => return Ok(CliInvocation::PrintHelp),
            "--version" | "-V" => return Ok(CliInvocation::PrintVersion),
            "--" => {
                let _ = iter.next();
                break;
            }
            _ => break,
        }
    }

    let Some(subcommand) = iter.next() else {
        return Ok(CliInvocation::Run {
            options,
            command: CliCommand::Sessions {
                project: None,
                orphans_only: false,
            },
        });
    };

    let mut args = iter;
    if args.peek().is_some_and(|arg| is_help_flag(arg)) {
        return Ok(CliInvocation::PrintHelp);
    }
    let command = match subcommand.as_str() {
        "sessions" => {
            let mut project: Option<String> = None;
            let mut orphans_only = false;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--project" | "-p" => {
                        let value = args.next().ok_or_else(|| {
                            CliParseError::MissingFlagValue("--project".to_string())
                        })?;
                        project = Some(value.to_string());
                    }
                    "--orphans" => orphans_only = true,
                    _ if is_help_flag(arg) => return Ok(CliInvocation::PrintHelp),
                    _ if arg.starts_with('-') => {
                        return Err(CliParseError::UnknownFlag(arg.to_string()));
                    }
                    _ => return Err(CliParseError::UnexpectedArgument(arg.to_string())),
                }
            }
            CliCommand::Sessions {
                project,
                orphans_only,
            }
        }
        "projects" => {
            if let Some(arg) = args.next() {
                return Err(unexpected(arg));
            }
            CliCommand::Projects
        }
        "tasks" => {
            let mut session: Option<String> = None;
            let mut project: Option<String> = None;
            let mut query = String::new();
            let mut board = false;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--session" | "-s" => {
                        let value = args.next().ok_or_else(|| {
                            CliParseError::MissingFlagValue("--session".to_string())
                        })?;
                        session = Some(value.to_string());
                    }
                    "--project" | "-p" => {
                        let value = args.next().ok_or_else(|| {
                            CliParseError::MissingFlagValue("--project".to_string())
                        })?;
                        project = Some(value.to_string());
                    }
                    "--query" | "-q" => {
                        let value = args.next().ok_or_else(|| {
                            CliParseError::MissingFlagValue("--query".to_string())
                        })?;
                        query = value.to_string();
                    }
                    "--board" => board = true,
                    _ if is_help_flag(arg) => return Ok(CliInvocation::PrintHelp),
                    _ if arg.starts_with('-') => {
                        return Err(CliParseError::UnknownFlag(arg.to_string()));
                    }
                    _ => return Err(CliParseError::UnexpectedArgument(arg.to_string())),
                }
            }
            CliCommand::Tasks {
                session,
                project,
                query,
                board,
            }
        }
        "clean" => {
            let mut target: Option<CleanTarget> = None;
            let mut dry_run = false;
            for arg in args {
                match arg.as_str() {
                    "--orphans" => target = Some(CleanTarget::Orphans),
                    "--completed" => target = Some(CleanTarget::Completed),
                    "--dry-run" | "-n" => dry_run = true,
                    _ if is_help_flag(arg) => return Ok(CliInvocation::PrintHelp),
                    _ if arg.starts_with('-') => {
                        return Err(CliParseError::UnknownFlag(arg.to_string()));
                    }
                    _ => return Err(CliParseError::UnexpectedArgument(arg.to_string())),
                }
            }
            let target = target.ok_or(CliParseError::MissingArgument("--orphans | --completed"))?;
            CliCommand::Clean { target, dry_run }
        }
        "delete" => {
            let session_id = args
                .next()
                .ok_or(CliParseError::MissingArgument("SESSION_ID"))?
                .to_string();
            if let Some(arg) = args.next() {
                return Err(unexpected(arg));
            }
            CliCommand::Delete { session_id }
        }
        "note" => {
            let session_id = args
                .next()
                .ok_or(CliParseError::MissingArgument("SESSION_ID"))?
                .to_string();
            let task_id = args
                .next()
                .ok_or(CliParseError::MissingArgument("TASK_ID"))?
                .to_string();
            let text = args.map(String::as_str).collect::<Vec<_>>().join(" ");
            if text.trim().is_empty() {
                return Err(CliParseError::MissingArgument("TEXT"));
            }
            CliCommand::Note {
                session_id,
                task_id,
                text,
            }
        }
        "watch" => {
            if let Some(arg) = args.next() {
                return Err(unexpected(arg));
            }
            CliCommand::Watch
        }
        "prefs" => match args.next().map(String::as_str) {
            None => CliCommand::Prefs { set: None },
            Some("set") => {
                let key = args
                    .next()
                    .ok_or(CliParseError::MissingArgument("KEY"))?
                    .to_string();
                let value = args
                    .next()
                    .ok_or(CliParseError::MissingArgument("VALUE"))?
                    .to_string();
                if let Some(arg) = args.next() {
                    return Err(unexpected(arg));
                }
                CliCommand::Prefs {
                    set: Some((key, value)),
                }
            }
            Some(other) => return Err(CliParseError::UnexpectedArgument(other.to_string())),
        },
        other => return Err(CliParseError::UnknownSubcommand(other.to_string())),
    };

    Ok(CliInvocation::Run { options, command })
}

#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("output error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Delete(#[from] DeleteSessionError),

    #[error(transparent)]
    AddNote(#[from] AddNoteError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error(transparent)]
    SetPreference(#[from] SetPreferenceError),

    #[error(transparent)]
    SavePreferences(#[from] SavePreferencesError),

    #[error("failed to load sessions: {0}")]
    Load(String),

    #[error("project not found: {0}\nHint: run `cctasks projects` and copy the project id column.")]
    ProjectNotFound(String),

    #[error("session not found: {0}\nHint: run `cctasks sessions` and copy the session id column.")]
    SessionNotFound(String),
}

/// What a command needs beyond its own arguments.
#[derive(Debug)]
pub struct CliContext<'a> {
    pub manager: &'a mut SessionManager,
    pub age_days: u32,
    pub state_dir: Option<&'a Path>,
    pub preferences: Preferences,
}

pub fn run(command: CliCommand, ctx: CliContext<'_>) -> Result<(), CliRunError> {
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let CliContext {
        manager,
        age_days,
        state_dir,
        preferences,
    } = ctx;

    match command {
        CliCommand::Sessions {
            project,
            orphans_only,
        } => {
            load(manager)?;
            if let Some(project) = project {
                let project_id = resolve_project_id(manager, &project)?;
                manager.select_project(Some(project_id));
            }
            let now = SystemTime::now();
            for session in manager.filtered_sessions() {
                if orphans_only && !session.is_orphan_at(age_days, now) {
                    continue;
                }
                if !write_line(&mut out, &format_session_line(session, age_days, now))? {
                    return Ok(());
                }
            }
            Ok(())
        }
        CliCommand::Projects => {
            load(manager)?;
            for project in manager.projects() {
                let line = format!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    project.id,
                    project.display_name(),
                    project.path,
                    project.sessions.len(),
                    project.total_task_count(),
                    project.active_task_count(),
                );
                if !write_line(&mut out, &line)? {
                    return Ok(());
                }
            }
            Ok(())
        }
        CliCommand::Tasks {
            session,
            project,
            query,
            board,
        } => {
            load(manager)?;
            if let Some(project) = project {
                let project_id = resolve_project_id(manager, &project)?;
                manager.select_project(Some(project_id));
            }
            if let Some(session_id) = session {
                if manager.session(&session_id).is_none() {
                    return Err(CliRunError::SessionNotFound(session_id));
                }
                manager.select_session(Some(session_id));
            }
            let tasks = manager.current_tasks(&query);
            if board {
                print_board(&mut out, tasks)?;
            } else {
                for task in &tasks {
                    if !write_line(&mut out, &format_task_line(task))? {
                        return Ok(());
                    }
                }
            }
            Ok(())
        }
        CliCommand::Clean { target, dry_run } => {
            load(manager)?;
            if dry_run {
                for line in clean_preview_lines(manager, target, age_days) {
                    if !write_line(&mut out, &line)? {
                        return Ok(());
                    }
                }
                return Ok(());
            }
            let deleted = match target {
                CleanTarget::Orphans => manager.delete_orphan_sessions(age_days),
                CleanTarget::Completed => manager.delete_completed_sessions(),
            };
            let _ = write_line(&mut out, &format!("deleted {deleted} session(s)"))?;
            Ok(())
        }
        CliCommand::Delete { session_id } => {
            manager.delete_session(&session_id)?;
            let _ = write_line(&mut out, &format!("deleted {session_id}"))?;
            Ok(())
        }
        CliCommand::Note {
            session_id,
            task_id,
            text,
        } => {
            let task = manager.add_note(&session_id, &task_id, &text)?;
            let _ = write_line(
                &mut out,
                &format!("note added to {session_id}/{}: {}", task.id, task.subject),
            )?;
            Ok(())
        }
        CliCommand::Watch => {
            let tasks_dir = manager.layout().tasks_dir();
            let projects_dir = manager.layout().projects_dir();
            let mut watcher = watch_trees(&[tasks_dir.as_path(), projects_dir.as_path()])?;
            loop {
                manager.load_sessions();
                let line = format_watch_summary(manager, age_days);
                if !write_line(&mut out, &line)? {
                    return Ok(());
                }
                out.flush()?;
                match watcher.recv_coalesced(WATCH_QUIET_PERIOD) {
                    Some(WatchSignal::Changed) => {}
                    Some(WatchSignal::Error(error)) => warn!(%error, "watcher reported an error"),
                    None => return Ok(()),
                }
            }
        }
        CliCommand::Prefs { set } => {
            let mut preferences = preferences;
            if let Some((key, value)) = set {
                preferences.set(&key, &value)?;
                if let Some(state_dir) = state_dir {
                    save_preferences(state_dir, &preferences)?;
                }
            }
            for (key, value) in preferences.entries() {
                if !write_line(&mut out, &format!("{key}\t{value}"))? {
                    return Ok(());
                }
            }
            Ok(())
        }
    }
}

fn load(manager: &mut SessionManager) -> Result<(), CliRunError> {
    manager.load_sessions();
    match manager.last_load_error() {
        Some(error) => Err(CliRunError::Load(error.to_string())),
        None => Ok(()),
    }
}

/// Accepts a project id (`-Users-joe-app`) or the decoded path (`/Users/joe/app`).
fn resolve_project_id(manager: &SessionManager, value: &str) -> Result<String, CliRunError> {
    manager
        .projects()
        .iter()
        .find(|project| project.id == value || project.path == value)
        .map(|project| project.id.clone())
        .ok_or_else(|| CliRunError::ProjectNotFound(value.to_string()))
}

fn format_session_line(session: &Session, age_days: u32, now: SystemTime) -> String {
    format!(
        "{}\t{}\t{}\t{}/{}\t{}\t{}\t{}",
        format_timestamp(session.modified_at),
        session.id,
        session.display_name(),
        session.completed,
        session.task_count,
        session.in_progress,
        session.project.as_deref().unwrap_or("-"),
        session
            .orphan_reason_at(age_days, now)
            .map(|reason| reason.to_string())
            .unwrap_or_default(),
    )
}

/// One line per session the matching `clean` would delete.
fn clean_preview_lines(manager: &SessionManager, target: CleanTarget, age_days: u32) -> Vec<String> {
    let ids = match target {
        CleanTarget::Orphans => manager.orphan_session_ids(age_days),
        CleanTarget::Completed => manager.completed_session_ids(),
    };
    ids.iter()
        .filter_map(|session_id| manager.session(session_id))
        .map(|session| {
            let reason = match target {
                CleanTarget::Orphans => session
                    .orphan_reason(age_days)
                    .map(|reason| reason.to_string())
                    .unwrap_or_default(),
                CleanTarget::Completed => "All tasks completed".to_string(),
            };
            format!("{}\t{}\t{}", session.id, session.display_name(), reason)
        })
        .collect()
}

fn format_task_line(task: &Task) -> String {
    let blocked_by = task
        .blocked_by
        .as_ref()
        .filter(|ids| !ids.is_empty())
        .map(|ids| format!("blocked by {}", ids.join(",")))
        .unwrap_or_default();
    format!(
        "{}\t{}\t{}\t{}\t{}",
        task.session_id.as_deref().unwrap_or("-"),
        task.id,
        task.status,
        task.headline(),
        blocked_by,
    )
}

fn print_board(out: &mut impl Write, tasks: Vec<Task>) -> io::Result<()> {
    let board = TaskBoard::from_tasks(tasks);
    for status in TaskStatus::ALL {
        let column = board.column(status);
        if !write_line(out, &format!("{} ({})", status.label(), column.len()))? {
            return Ok(());
        }
        for task in column {
            let marker = if task.is_blocked() { " [blocked]" } else { "" };
            let line = format!("  {}\t{}{}", task.id, task.headline(), marker);
            if !write_line(out, &line)? {
                return Ok(());
            }
        }
    }
    Ok(())
}

fn format_watch_summary(manager: &SessionManager, age_days: u32) -> String {
    let active = manager
        .sessions()
        .iter()
        .filter(|session| session.has_active_tasks())
        .count();
    format!(
        "{}\tsessions={}\tprojects={}\tactive={}\torphans={}",
        format_timestamp(SystemTime::now()),
        manager.sessions().len(),
        manager.projects().len(),
        active,
        manager.orphan_count(age_days),
    )
}

fn format_timestamp(value: SystemTime) -> String {
    OffsetDateTime::from(value)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "-".to_string())
}

fn is_help_flag(arg: &str) -> bool {
    arg == "--help" || arg == "-h"
}

fn unexpected(arg: &str) -> CliParseError {
    CliParseError::UnexpectedArgument(arg.to_string())
}

fn write_line(out: &mut impl Write, line: &str) -> io::Result<bool> {
    match writeln!(out, "{line}") {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(false),
        Err(error) => Err(error),
    }
}

fn parse_u32_flag(flag: &str, value: &str) -> Result<u32, CliParseError> {
    value
        .parse::<u32>()
        .map_err(|_| CliParseError::InvalidFlagValue {
            flag: flag.to_string(),
            value: value.to_string(),
        })
}
