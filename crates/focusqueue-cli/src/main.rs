use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "focusqueue", version, about = "Focusqueue CLI")]
struct Cli {
    /// Evaluate as of this RFC 3339 instant instead of the system clock
    #[arg(long, global = true, value_parser = commands::parse_instant)]
    at: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Task management and countdown control
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Contexts and their focus blocks
    Context {
        #[command(subcommand)]
        action: commands::context::ContextAction,
    },
    /// Show the current task, the queue, and the active focus block
    Now,
    /// Register reminders for a task
    Remind {
        /// Task id (or unique prefix)
        id: String,
        /// Drop the task's reminders instead
        #[arg(long)]
        cancel: bool,
    },
    /// Materialise recurring templates over a date window
    Expand {
        /// First date (YYYY-MM-DD), default today
        #[arg(long)]
        from: Option<chrono::NaiveDate>,
        /// Last date (YYYY-MM-DD), default `from`
        #[arg(long)]
        to: Option<chrono::NaiveDate>,
    },
    /// Reconcile countdowns with the clock
    Tick {
        /// Keep ticking for this many seconds and print events as they happen
        #[arg(long)]
        watch: Option<u64>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("FOCUSQUEUE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let at = cli.at;
    let result = match cli.command {
        Commands::Task { action } => commands::task::run(action, at),
        Commands::Context { action } => commands::context::run(action, at),
        Commands::Now => commands::now::run(at),
        Commands::Remind { id, cancel } => commands::remind::run(&id, cancel, at),
        Commands::Expand { from, to } => commands::expand::run(from, to, at),
        Commands::Tick { watch } => commands::tick::run(watch, at),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
