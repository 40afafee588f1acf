use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

use crate::backup::{self, BackupDocument, BackupError};
use crate::clock::Clock;
use crate::config::{Config, ConfigError, ConfigSource};
use crate::database::{Database, DatabaseError};
use crate::habit_store::HabitStore;
use crate::models::{Habit, Quadrant, Task, TaskPatch};
use crate::persistence;
use crate::streak::MAX_ACTIVITY_DAYS;
use crate::task_store::TaskStore;
use crate::utils::{format_tags_brackets, parse_date, parse_tags};

const ACTIVITY_DAYS_DEFAULT: u32 = 7;

#[derive(Parser)]
#[command(name = "grid")]
#[command(about = "Grid - Eisenhower task board and habit tracker")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the task board (default if no subcommand)
    Board,
    /// Manage tasks on the board
    Task {
        #[command(subcommand)]
        action: TaskCommand,
    },
    /// Manage habits
    Habit {
        #[command(subcommand)]
        action: HabitCommand,
    },
    /// Write a JSON backup of tasks, habits and settings
    Export {
        /// Output file (defaults to grid-backup-YYYY-MM-DD.json)
        path: Option<PathBuf>,
    },
    /// Replace tasks and habits with the contents of a backup
    Import {
        path: PathBuf,
    },
    /// Show or change settings
    Settings {
        /// Hours before done tasks are archived (-1 for never)
        #[arg(long, allow_hyphen_values = true)]
        archive_delay: Option<i64>,
    },
}

#[derive(Subcommand)]
pub enum TaskCommand {
    /// Add a new task
    Add {
        /// Task title
        title: String,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// q1, q2, q3, q4 or inbox
        #[arg(long, default_value_t = Quadrant::Inbox)]
        quadrant: Quadrant,
    },
    /// Move a task to another quadrant
    Move { id: String, quadrant: Quadrant },
    /// Mark a task done, or back to todo
    Toggle { id: String },
    /// Delete a task (active or archived)
    Delete { id: String },
    /// Edit task fields
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        /// Comma-separated tags (empty string clears)
        #[arg(long)]
        tags: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        #[arg(long)]
        clear_due: bool,
        #[arg(long)]
        quadrant: Option<Quadrant>,
    },
    /// Move an archived task back to the board
    Restore { id: String },
    /// Archive done tasks older than the delay now
    Archive {
        /// Override the configured delay in hours
        #[arg(long, allow_hyphen_values = true)]
        hours: Option<i64>,
    },
    /// List tasks
    List {
        #[arg(long)]
        quadrant: Option<Quadrant>,
        /// List the archive instead of the board
        #[arg(long)]
        archived: bool,
    },
}

#[derive(Subcommand)]
pub enum HabitCommand {
    /// Track a new habit
    Add {
        title: String,
        /// Minutes between repetitions (0 = once per day)
        #[arg(long, default_value_t = 0)]
        interval: u32,
    },
    /// Record a repetition now
    Log { id: String },
    /// Stop tracking a habit and drop its history
    Remove { id: String },
    /// Show habits with status and streak
    List,
    /// Show recent activity per habit
    Stats {
        #[arg(
            long,
            default_value_t = ACTIVITY_DAYS_DEFAULT,
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_ACTIVITY_DAYS))
        )]
        days: u32,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Backup error: {0}")]
    BackupError(#[from] BackupError),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("Id prefix `{0}` matches more than one item")]
    AmbiguousId(String),
}

/// Both stores hydrated from the database with persistence attached
pub struct Session {
    pub tasks: TaskStore,
    pub habits: HabitStore,
}

impl Session {
    /// Hydrate both stores, attach persistence and run the archive sweep
    pub fn open<C>(db: Rc<Database>, clock: C, config: &Config) -> Result<Self, CliError>
    where
        C: Clock + Clone + 'static,
    {
        let mut tasks = persistence::load_task_store(&db, Box::new(clock.clone()))?;
        persistence::attach_task_store(&mut tasks, Rc::clone(&db));

        let mut habits = persistence::load_habit_store(&db, Box::new(clock))?;
        persistence::attach_habit_store(&mut habits, db);

        if let Some(delay) = config.auto_archive_delay() {
            tasks.run_auto_archive(delay);
        }

        Ok(Self { tasks, habits })
    }
}

/// Dispatch a parsed command
pub fn run(
    command: Commands,
    session: &mut Session,
    config: &mut Config,
    source: &ConfigSource,
) -> Result<(), CliError> {
    match command {
        Commands::Board => {
            print_board(&session.tasks);
            Ok(())
        }
        Commands::Task { action } => handle_task(action, &mut session.tasks, config),
        Commands::Habit { action } => handle_habit(action, &mut session.habits),
        Commands::Export { path } => handle_export(path, session, config),
        Commands::Import { path } => handle_import(&path, session, config, source),
        Commands::Settings { archive_delay } => handle_settings(archive_delay, config, source),
    }
}

/// Handle task subcommands
pub fn handle_task(
    action: TaskCommand,
    tasks: &mut TaskStore,
    config: &Config,
) -> Result<(), CliError> {
    match action {
        TaskCommand::Add {
            title,
            tags,
            due,
            quadrant,
        } => {
            let due_date = parse_due(due.as_deref())?;
            match tasks.create(title.trim(), parse_tags(tags.as_deref()), due_date, quadrant) {
                Some(id) => println!("Task created successfully (ID: {})", short_id(&id)),
                None => println!("Task title cannot be empty"),
            }
        }
        TaskCommand::Move { id, quadrant } => {
            let Some(id) = resolve_task(tasks, &id)? else {
                return Ok(());
            };
            if tasks.move_to(&id, quadrant) {
                println!("Moved to {}", quadrant.label());
            }
        }
        TaskCommand::Toggle { id } => {
            let Some(id) = resolve_task(tasks, &id)? else {
                return Ok(());
            };
            tasks.toggle(&id);
            if let Some(task) = tasks.get(&id) {
                println!("{}", format_task(task));
            }
        }
        TaskCommand::Delete { id } => {
            let Some(id) = resolve_any_task(tasks, &id)? else {
                return Ok(());
            };
            if tasks.delete(&id) {
                println!("Task deleted");
            }
        }
        TaskCommand::Edit {
            id,
            title,
            tags,
            due,
            clear_due,
            quadrant,
        } => {
            let Some(id) = resolve_task(tasks, &id)? else {
                return Ok(());
            };
            let due_date = if clear_due {
                Some(None)
            } else {
                parse_due(due.as_deref())?.map(Some)
            };
            let patch = TaskPatch {
                title: title.map(|t| t.trim().to_string()),
                tags: tags.map(|t| parse_tags(Some(t.as_str()))),
                due_date,
                quadrant,
                status: None,
            };
            if tasks.update(&id, patch) {
                println!("Task updated");
            } else {
                println!("Nothing to change");
            }
        }
        TaskCommand::Restore { id } => {
            let Some(id) = resolve_id(tasks.archived_tasks().iter().map(|t| t.id.as_str()), &id)? else {
                println!("No archived task matches `{}`", id);
                return Ok(());
            };
            if tasks.restore(&id) {
                println!("Task restored to the board");
            }
        }
        TaskCommand::Archive { hours } => {
            let delay = hours.unwrap_or(config.auto_archive_delay_hours);
            let count = tasks.run_auto_archive(delay);
            println!("Archived {} task(s)", count);
        }
        TaskCommand::List { quadrant, archived } => {
            if archived {
                for task in tasks.archived_tasks() {
                    println!("{}", format_task(task));
                }
            } else if let Some(quadrant) = quadrant {
                for task in tasks.in_quadrant(quadrant) {
                    println!("{}", format_task(task));
                }
            } else {
                print_board(tasks);
            }
        }
    }
    Ok(())
}

/// Handle habit subcommands
pub fn handle_habit(action: HabitCommand, habits: &mut HabitStore) -> Result<(), CliError> {
    match action {
        HabitCommand::Add { title, interval } => match habits.create(title.trim(), interval) {
            Some(id) => println!("Habit created successfully (ID: {})", short_id(&id)),
            None => println!("Habit title cannot be empty"),
        },
        HabitCommand::Log { id } => {
            let Some(id) = resolve_habit(habits, &id)? else {
                return Ok(());
            };
            if let Some(streak) = habits.log(&id) {
                println!("Logged. Streak: {}", streak);
            }
        }
        HabitCommand::Remove { id } => {
            let Some(id) = resolve_habit(habits, &id)? else {
                return Ok(());
            };
            if habits.remove(&id) {
                println!("Habit removed");
            }
        }
        HabitCommand::List => {
            for habit in habits.habits() {
                println!(
                    "{}  {:<24} {:<14} streak {:>3}  {}",
                    short_id(&habit.id),
                    habit.title,
                    describe_interval(habit),
                    habit.streak,
                    habits.status(habit)
                );
            }
        }
        HabitCommand::Stats { days } => {
            for habit in habits.habits() {
                let activity = habits.activity(habit, days);
                let cells: Vec<String> = activity
                    .days
                    .iter()
                    .map(|(_, count)| if *count > 0 { count.to_string() } else { ".".to_string() })
                    .collect();
                println!(
                    "{:<24} [{}]  {} total reps, {}/{} days",
                    habit.title,
                    cells.join(" "),
                    activity.total_reps,
                    activity.active_days(),
                    days
                );
            }
        }
    }
    Ok(())
}

fn handle_export(path: Option<PathBuf>, session: &Session, config: &Config) -> Result<(), CliError> {
    let clock = session.habits.clock();
    let path = path.unwrap_or_else(|| PathBuf::from(backup::default_file_name(clock.today())));
    let document = BackupDocument::capture(
        &session.tasks,
        &session.habits,
        Some(config.backup_settings()),
        clock.now(),
    );
    backup::export_file(&path, &document)?;
    println!("Backup written to {}", path.display());
    Ok(())
}

fn handle_import(
    path: &Path,
    session: &mut Session,
    config: &mut Config,
    source: &ConfigSource,
) -> Result<(), CliError> {
    let settings = backup::import_file(path, &mut session.tasks, &mut session.habits)?;
    if let Some(settings) = settings {
        config.apply_backup_settings(settings);
        config.save_to(source)?;
    }
    println!(
        "Imported {} task(s) and {} habit(s)",
        session.tasks.tasks().len(),
        session.habits.habits().len()
    );
    Ok(())
}

fn handle_settings(
    archive_delay: Option<i64>,
    config: &mut Config,
    source: &ConfigSource,
) -> Result<(), CliError> {
    if let Some(hours) = archive_delay {
        config.auto_archive_delay_hours = hours;
        config.save_to(source)?;
    }
    match config.auto_archive_delay() {
        Some(hours) => println!("Auto-archive: after {} hour(s)", hours),
        None => println!("Auto-archive: never"),
    }
    println!("Database: {}", config.get_database_path().display());
    Ok(())
}

fn print_board(tasks: &TaskStore) {
    for quadrant in Quadrant::ALL {
        println!("== {} ==", quadrant.label());
        for task in tasks.in_quadrant(quadrant) {
            println!("  {}", format_task(task));
        }
    }
}

fn format_task(task: &Task) -> String {
    let mut line = format!(
        "{} [{}] {}",
        short_id(&task.id),
        if task.is_done() { "x" } else { " " },
        task.title
    );
    if let Some(due) = task.due_date {
        line.push_str(&format!(" (due {})", due));
    }
    if !task.tags.is_empty() {
        line.push(' ');
        line.push_str(&format_tags_brackets(&task.tags));
    }
    line
}

fn describe_interval(habit: &Habit) -> String {
    if habit.is_daily() {
        "daily".to_string()
    } else if habit.interval_minutes % 60 == 0 {
        format!("every {}h", habit.interval_minutes / 60)
    } else {
        format!("every {}m", habit.interval_minutes)
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn parse_due(due: Option<&str>) -> Result<Option<chrono::NaiveDate>, CliError> {
    due.map(|due_str| {
        parse_date(due_str).map_err(|e| {
            CliError::DateParseError(format!("Invalid date format '{}': {}", due_str, e))
        })
    })
    .transpose()
}

fn resolve_task(tasks: &TaskStore, query: &str) -> Result<Option<String>, CliError> {
    let resolved = resolve_id(tasks.tasks().iter().map(|t| t.id.as_str()), query)?;
    if resolved.is_none() {
        println!("No task matches `{}`", query);
    }
    Ok(resolved)
}

fn resolve_any_task(tasks: &TaskStore, query: &str) -> Result<Option<String>, CliError> {
    let ids = tasks
        .tasks()
        .iter()
        .chain(tasks.archived_tasks())
        .map(|t| t.id.as_str());
    let resolved = resolve_id(ids, query)?;
    if resolved.is_none() {
        println!("No task matches `{}`", query);
    }
    Ok(resolved)
}

fn resolve_habit(habits: &HabitStore, query: &str) -> Result<Option<String>, CliError> {
    let resolved = resolve_id(habits.habits().iter().map(|h| h.id.as_str()), query)?;
    if resolved.is_none() {
        println!("No habit matches `{}`", query);
    }
    Ok(resolved)
}

/// Match a full id, or a unique id prefix
fn resolve_id<'a>(
    ids: impl Iterator<Item = &'a str>,
    query: &str,
) -> Result<Option<String>, CliError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(None);
    }
    let candidates: Vec<&str> = ids.filter(|id| id.starts_with(query)).collect();
    if let Some(exact) = candidates.iter().find(|id| **id == query) {
        return Ok(Some(exact.to_string()));
    }
    match candidates.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(only.to_string())),
        _ => Err(CliError::AmbiguousId(query.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone, Utc};

    fn session() -> (Session, ManualClock, Rc<Database>) {
        let db = Rc::new(Database::open_in_memory().unwrap());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap());
        let session = Session::open(Rc::clone(&db), clock.clone(), &Config::default()).unwrap();
        (session, clock, db)
    }

    #[test]
    fn resolve_id_accepts_unique_prefix() {
        let ids = ["abc123", "abd456", "zzz"];
        assert_eq!(resolve_id(ids.into_iter(), "abc").unwrap(), Some("abc123".to_string()));
        assert_eq!(resolve_id(ids.into_iter(), "q").unwrap(), None);
        assert!(matches!(
            resolve_id(ids.into_iter(), "ab"),
            Err(CliError::AmbiguousId(_))
        ));
        assert_eq!(resolve_id(["ab", "abc"].into_iter(), "ab").unwrap(), Some("ab".to_string()));
    }

    #[test]
    fn task_commands_drive_the_store() {
        let (mut session, _, _) = session();
        let config = Config::default();
        handle_task(
            TaskCommand::Add {
                title: "  Ship report ".to_string(),
                tags: Some("work".to_string()),
                due: Some("2024-03-08".to_string()),
                quadrant: Quadrant::Inbox,
            },
            &mut session.tasks,
            &config,
        )
        .unwrap();

        let id = session.tasks.tasks()[0].id.clone();
        assert_eq!(session.tasks.tasks()[0].title, "Ship report");

        handle_task(
            TaskCommand::Move {
                id: id[..8].to_string(),
                quadrant: Quadrant::Q1,
            },
            &mut session.tasks,
            &config,
        )
        .unwrap();
        handle_task(TaskCommand::Toggle { id: id.clone() }, &mut session.tasks, &config).unwrap();

        let task = session.tasks.get(&id).unwrap();
        assert_eq!(task.quadrant, Quadrant::Q1);
        assert!(task.is_done());
    }

    #[test]
    fn invalid_due_date_is_reported() {
        let (mut session, _, _) = session();
        let result = handle_task(
            TaskCommand::Add {
                title: "x".to_string(),
                tags: None,
                due: Some("tomorrow".to_string()),
                quadrant: Quadrant::Inbox,
            },
            &mut session.tasks,
            &Config::default(),
        );
        assert!(matches!(result, Err(CliError::DateParseError(_))));
        assert!(session.tasks.tasks().is_empty());
    }

    #[test]
    fn opening_a_session_sweeps_old_done_tasks() {
        let (mut session, clock, db) = session();
        let id = session
            .tasks
            .create("old", Vec::new(), None, Quadrant::Q4)
            .unwrap();
        session.tasks.toggle(&id);
        clock.advance(Duration::hours(25));

        let reopened = Session::open(db, clock, &Config::default()).unwrap();
        assert!(reopened.tasks.get(&id).is_none());
        assert!(reopened.tasks.get_archived(&id).is_some());
    }

    #[test]
    fn habit_commands_log_and_remove() {
        let (mut session, _, _) = session();
        handle_habit(
            HabitCommand::Add {
                title: "Hydrate".to_string(),
                interval: 60,
            },
            &mut session.habits,
        )
        .unwrap();
        let id = session.habits.habits()[0].id.clone();

        handle_habit(HabitCommand::Log { id: id.clone() }, &mut session.habits).unwrap();
        assert_eq!(session.habits.get(&id).unwrap().streak, 1);

        handle_habit(HabitCommand::Remove { id }, &mut session.habits).unwrap();
        assert!(session.habits.habits().is_empty());
    }

    #[test]
    fn cli_parses_nested_subcommands() {
        let cli = Cli::parse_from(["grid", "--dev", "task", "add", "Plan", "--quadrant", "q2"]);
        assert!(cli.dev);
        match cli.command {
            Some(Commands::Task {
                action: TaskCommand::Add { title, quadrant, .. },
            }) => {
                assert_eq!(title, "Plan");
                assert_eq!(quadrant, Quadrant::Q2);
            }
            _ => panic!("expected task add"),
        }

        let cli = Cli::parse_from(["grid", "settings", "--archive-delay", "-1"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Settings { archive_delay: Some(-1) })
        ));
    }

    #[test]
    fn habit_stats_days_must_fit_the_activity_window() {
        let cli = Cli::parse_from(["grid", "habit", "stats", "--days", "365"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Habit {
                action: HabitCommand::Stats { days: 365 }
            })
        ));

        assert!(Cli::try_parse_from(["grid", "habit", "stats", "--days", "4294967295"]).is_err());
        assert!(Cli::try_parse_from(["grid", "habit", "stats", "--days", "0"]).is_err());
    }
}
