//! iMessage Export - Export conversation history from the macOS Messages app.
//!
//! This tool reads the Messages `SQLite` database read-only and writes
//! conversations as a flat CSV table or as hierarchical JSON.
//!
//! QUICK START:
//!   imessage-export list-chats +1555              # Find chats with a participant
//!   imessage-export export-chat +1555 -s 2        # Export the second match as CSV
//!   imessage-export export-all -o all.json        # Export every chat as JSON
//!   imessage-export paths                         # Show database and config paths

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::path::{Path, PathBuf};

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    export_all, export_conversation, find_conversations, format_conversations_table,
    format_stats, select_conversation, validate_participant, write_conversations, OutputFormat,
};
use cli::{parse_format, Cli, Commands};
use domain::{AppConfig, AppError, Conversation, ExportStats};
use infrastructure::{
    ensure_config_exists, known_paths, load_config, render_config, resolve_database_path,
    write_output, ChatDb, STDOUT_PATH,
};

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(hint) = e.hint() {
            eprintln!("{} {}", "Hint:".yellow().bold(), hint);
        }
        if e.is_retryable() {
            eprintln!("{}", "This is temporary; try again shortly.".dimmed());
        }
        std::process::exit(1);
    }
}

/// Main application logic.
fn run(cli: Cli) -> domain::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let db_override = cli.db_path.as_deref();

    match cli.command {
        Commands::ListChats { participant } => {
            cmd_list_chats(&config, db_override, &participant)?;
        }
        Commands::ExportChat {
            participant,
            output,
            format,
            select,
        } => {
            let format = parse_format(&format).map_err(|message| AppError::Config { message })?;
            let output = output.unwrap_or_else(|| default_output(&config.export.csv_file, format));
            cmd_export_chat(&config, db_override, &participant, &output, format, select)?;
        }
        Commands::ExportAll { output, format } => {
            let format = parse_format(&format).map_err(|message| AppError::Config { message })?;
            let output = output.unwrap_or_else(|| default_output(&config.export.json_file, format));
            cmd_export_all(&config, db_override, &output, format)?;
        }
        Commands::Paths => {
            cmd_paths(&config, db_override, cli.config.as_deref());
        }
        Commands::Config { init } => {
            cmd_config(&config, cli.config.as_deref(), init)?;
        }
    }

    Ok(())
}

/// Opens the store for one command.
fn open_store(config: &AppConfig, db_override: Option<&Path>) -> domain::Result<ChatDb> {
    let path = resolve_database_path(db_override, config);
    ChatDb::open(&path, config.busy_timeout())
}

/// List chats with a participant.
fn cmd_list_chats(
    config: &AppConfig,
    db_override: Option<&Path>,
    participant: &str,
) -> domain::Result<()> {
    let participant = validate_participant(participant)?;
    let db = open_store(config, db_override)?;

    let found = match find_conversations(&db, participant) {
        Ok(found) => found,
        Err(AppError::NoMatchingConversation { .. }) => {
            println!("No chats found with participant matching '{participant}'");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    println!("{}", format_conversations_table(&found));
    println!("{} chat(s) found", found.len());

    Ok(())
}

/// Export one chat with a participant.
fn cmd_export_chat(
    config: &AppConfig,
    db_override: Option<&Path>,
    participant: &str,
    output: &Path,
    format: OutputFormat,
    select: Option<usize>,
) -> domain::Result<()> {
    let participant = validate_participant(participant)?;

    let (conversation, stats) = {
        let db = open_store(config, db_override)?;
        let found = find_conversations(&db, participant)?;

        if found.len() > 1 && select.is_none() {
            eprintln!("{}", format_conversations_table(&found));
        }
        let stub = select_conversation(found, participant, select)?;
        export_conversation(&db, stub)?
    };

    let label = conversation
        .display_name
        .clone()
        .unwrap_or_else(|| conversation.chat_identifier.clone());

    write_export(output, format, &[conversation], &stats)?;
    report(output, &format!("chat {}", label.cyan()), &stats);

    Ok(())
}

/// Export every chat.
fn cmd_export_all(
    config: &AppConfig,
    db_override: Option<&Path>,
    output: &Path,
    format: OutputFormat,
) -> domain::Result<()> {
    let (conversations, stats) = {
        let db = open_store(config, db_override)?;
        export_all(&db)?
    };

    write_export(output, format, &conversations, &stats)?;
    report(
        output,
        &format!("{} chats", stats.conversation_count),
        &stats,
    );

    Ok(())
}

fn write_export(
    output: &Path,
    format: OutputFormat,
    conversations: &[Conversation],
    stats: &ExportStats,
) -> domain::Result<()> {
    tracing::info!(
        messages = stats.message_count,
        attachments = stats.attachment_count,
        "Writing {}",
        output.display()
    );
    write_output(output, |w| write_conversations(format, conversations, w))
}

/// Prints the export summary; to stderr when the data went to stdout.
fn report(output: &Path, what: &str, stats: &ExportStats) {
    if output.as_os_str() == STDOUT_PATH {
        eprintln!("{}", format_stats(stats));
        return;
    }

    println!(
        "{} Exported {} to {}",
        "✓".green().bold(),
        what,
        output.display()
    );
    println!();
    println!("{}", format_stats(stats));
}

/// Show paths command.
fn cmd_paths(config: &AppConfig, db_override: Option<&Path>, config_file: Option<&Path>) {
    println!("{}", "📂 iMessage Export Paths".bold());
    println!();

    for known in known_paths(db_override, config_file, config) {
        let status = if known.exists {
            "found".green()
        } else {
            "missing".red()
        };
        println!("  [{}] {:<12} {}", status, known.label, known.path.display());
    }
}

/// Show or initialize the configuration.
fn cmd_config(config: &AppConfig, config_file: Option<&Path>, init: bool) -> domain::Result<()> {
    let path = config_file.map_or_else(AppConfig::default_config_file, Path::to_path_buf);

    if init {
        if ensure_config_exists(&path)? {
            println!("{} Created {}", "✓".green().bold(), path.display());
        } else {
            println!("Config already exists at {}", path.display());
        }
        return Ok(());
    }

    println!("# {}", path.display());
    print!("{}", render_config(config)?);

    Ok(())
}

/// Configured default file name with the extension of `format`.
fn default_output(configured: &Path, format: OutputFormat) -> PathBuf {
    let extension = match format {
        OutputFormat::Csv => "csv",
        OutputFormat::Json => "json",
    };
    configured.with_extension(extension)
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
