use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Result, eyre};
use std::path::PathBuf;
use todostore::models::is_sample_id;
use todostore::{Backend, Config, StoreError, Task, TaskStore, views};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "todostore")]
#[command(about = "TodoStore CLI - manage a local todo list")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to a YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the task data (overrides config)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Storage backend (overrides config)
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show tasks
    List {
        /// Only incomplete tasks, oldest first
        #[arg(long, conflicts_with = "completed")]
        pending: bool,

        /// Only completed tasks, most recent first
        #[arg(long)]
        completed: bool,
    },

    /// Add a new task
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },

    /// Mark a task complete, or undo completion
    Toggle { id: i64 },

    /// Change the title of a task
    Edit {
        id: i64,
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },

    /// Delete a task
    Delete { id: i64 },

    /// Delete every user task
    Clear,

    /// Print where task data is stored
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    let storage = config.open_storage()?;
    let mut store = TaskStore::open_with_key(storage, &config.key);
    store.subscribe(|tasks| debug!(count = tasks.len(), "Task list changed"));

    match cli.command {
        Commands::List { pending, completed } => {
            let tasks = store.tasks();
            let shown = if pending {
                views::pending(&tasks)
            } else if completed {
                views::completed(&tasks)
            } else {
                tasks.clone()
            };

            if shown.is_empty() {
                println!("{}", "No tasks yet. Add one with `todostore add`.".italic());
            }
            for task in &shown {
                print_task(task);
            }

            let s = views::summary(&tasks);
            println!(
                "\n{} total, {} pending, {} completed",
                s.total,
                s.pending.to_string().yellow(),
                s.completed.to_string().green()
            );
        }
        Commands::Add { title } => {
            let task = store.add(&title.join(" ")).map_err(report)?;
            store.flush()?;
            println!("Added task {}", task.id.to_string().bold());
        }
        Commands::Toggle { id } => {
            let toggled = store.toggle(id);
            store.flush()?;
            match toggled {
                Some(task) if task.completed => println!("Completed task {}", id),
                Some(_) => println!("Reopened task {}", id),
                None => println!("No task with id {}", id),
            }
        }
        Commands::Edit { id, title } => {
            if is_sample_id(id) {
                println!("{}", "Sample tasks are read-only".yellow());
                return Ok(());
            }
            let edited = store.edit(id, &title.join(" ")).map_err(report)?;
            store.flush()?;
            match edited {
                Some(task) => println!("Renamed task {} to \"{}\"", id, task.title),
                None => println!("No task with id {}", id),
            }
        }
        Commands::Delete { id } => {
            if is_sample_id(id) {
                println!("{}", "Sample tasks are read-only".yellow());
                return Ok(());
            }
            let removed = store.delete(id);
            store.flush()?;
            match removed {
                Some(_) => println!("Deleted task {}", id),
                None => println!("No task with id {}", id),
            }
        }
        Commands::Clear => {
            let ids: Vec<i64> = store.user_tasks().iter().map(|t| t.id).collect();
            for id in &ids {
                store.delete(*id);
            }
            store.flush()?;
            println!("Deleted {} tasks", ids.len());
        }
        Commands::Path => {
            println!("{} ({})", config.location().display(), store.storage_name());
        }
    }

    Ok(())
}

fn report(err: StoreError) -> eyre::Report {
    match err {
        StoreError::Persistence(e) => e,
        other => eyre!("{}", other),
    }
}

fn print_task(task: &Task) {
    let mark = if task.completed { "[x]".green() } else { "[ ]".normal() };
    let title = if task.completed {
        task.title.strikethrough().dimmed()
    } else {
        task.title.normal()
    };
    let tag = if task.is_sample() { " (Sample)".italic().dimmed().to_string() } else { String::new() };
    let when = if task.completed {
        format!("Completed: {}", views::format_timestamp(task.completed_at)).green()
    } else {
        format!("Created: {}", views::format_timestamp(Some(task.created_at))).blue()
    };

    println!("{:>5} {} {}{}  {}", task.id, mark, title, tag, when);
}
