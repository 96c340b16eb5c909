use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use tasknotes::{Client, NoteError, NoteEvent, SignUpOutcome, Task, TaskBoard, TaskId};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tasknotes")]
#[command(about = "Notes kept in your Supabase project", long_about = None)]
struct Cli {
    /// Account email
    #[arg(short, long, env = "TASKNOTES_EMAIL", global = true)]
    email: Option<String>,

    /// Account password
    #[arg(short, long, env = "TASKNOTES_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account (signs in unless email confirmation is required)
    SignUp {
        /// Password confirmation; defaults to --password
        #[arg(long)]
        confirm: Option<String>,
    },
    /// Check that the credentials work
    SignIn,
    /// List your notes, newest first
    List,
    /// Create a note
    Add {
        #[arg(short, long)]
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Change the title and description of a note
    Edit {
        #[arg(long)]
        id: TaskId,

        #[arg(short, long)]
        title: String,

        /// Keeps the current description when omitted
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a note
    Delete {
        #[arg(long)]
        id: TaskId,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tasknotes=info,tasknotes_client=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = Client::from_env().context("Failed to configure client")?;

    // Callbacks run on this thread whenever flush() drains the queue
    client.event_dispatcher().register_callback(print_event)?;

    if let Err(e) = run(&client, &cli).await {
        flush(&client);
        // Note errors were already reported through their failure event
        if e.downcast_ref::<NoteError>().is_none() {
            eprintln!("❌ {}", e.to_string().red());
        }
        tracing::debug!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(client: &Client, cli: &Cli) -> anyhow::Result<()> {
    let (email, password) = credentials(cli)?;

    if let Command::SignUp { confirm } = &cli.command {
        let confirm = confirm.as_deref().unwrap_or(password);
        let outcome = client.sign_up(email, password, confirm).await;
        flush(client);
        if let SignUpOutcome::SignedIn(_) = outcome? {
            print_tasks(&client.refresh().await?);
        }
        return Ok(());
    }

    let signed_in = client.sign_in(email, password).await;
    flush(client);
    signed_in?;

    match &cli.command {
        Command::SignUp { .. } | Command::SignIn => {}
        Command::List => {
            let tasks = client.refresh().await;
            flush(client);
            print_tasks(&tasks?);
        }
        Command::Add { title, description } => {
            let created = client.create_task(title, description).await;
            flush(client);
            created?;
            print_board(client);
        }
        Command::Edit {
            id,
            title,
            description,
        } => {
            let tasks = client.refresh().await;
            flush(client);

            match tasks?.into_iter().find(|task| task.id == *id) {
                Some(task) => {
                    let description = description
                        .clone()
                        .unwrap_or_else(|| task.description_or_empty().to_string());
                    client.tasks().select_for_edit(task);
                    client.tasks().set_edit_draft(title, &description);
                }
                None => println!(
                    "⚠️  {}",
                    format!("No note with id {}; nothing to update", id).yellow()
                ),
            }

            let updated = client.update_selected().await;
            flush(client);
            updated?;
            print_board(client);
        }
        Command::Delete { id } => {
            let deleted = client.delete_task(*id).await;
            flush(client);
            deleted?;
            print_board(client);
        }
    }

    Ok(())
}

fn credentials(cli: &Cli) -> anyhow::Result<(&str, &str)> {
    let email = cli
        .email
        .as_deref()
        .context("--email is required (or set TASKNOTES_EMAIL)")?;
    let password = cli
        .password
        .as_deref()
        .context("--password is required (or set TASKNOTES_PASSWORD)")?;
    Ok((email, password))
}

fn flush(client: &Client) {
    if let Err(e) = client.event_dispatcher().process_events() {
        tracing::warn!("Failed to deliver events: {}", e);
    }
}

fn print_event(event: NoteEvent) {
    match event {
        NoteEvent::TasksLoaded { count } => tracing::debug!("Loaded {} notes", count),
        NoteEvent::TaskCreated { title } => println!("✅ Note created: {}", title.green()),
        NoteEvent::TaskUpdated { id } => {
            println!("✅ Note {} updated", id.to_string().green())
        }
        NoteEvent::TaskDeleted { id } => {
            println!("🗑️  Note {} deleted", id.to_string().green())
        }
        NoteEvent::OperationFailed { operation, message } => {
            eprintln!("❌ {} failed: {}", operation, message.red())
        }
        NoteEvent::SignedIn { email } => println!("👤 Signed in as {}", email.green()),
        NoteEvent::SignedUp {
            confirmation_pending,
        } => {
            if !confirmation_pending {
                println!("✅ Account created and signed in");
            }
        }
        NoteEvent::SignedOut => println!("👋 Signed out"),
        NoteEvent::Alert { title, message } => {
            println!("{} {}", format!("{}:", title).bold().yellow(), message)
        }
    }
}

/// The board's list, unless the re-fetch after the last mutation failed and
/// left it stale.
fn fresh_tasks(board: &TaskBoard) -> Option<&[Task]> {
    match board.last_error {
        Some(_) => None,
        None => Some(board.tasks.as_slice()),
    }
}

fn print_board(client: &Client) {
    let board = client.tasks().snapshot();
    match fresh_tasks(&board) {
        Some(tasks) => print_tasks(tasks),
        None => println!(
            "⚠️  {}",
            "Could not reload notes; run `tasknotes list` to retry".yellow()
        ),
    }
}

fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("📭 No notes yet.");
        return;
    }

    println!("{}", "📋 Your Notes:".bold());
    println!("{}", "─".repeat(60).dimmed());
    for task in tasks {
        println!(
            "{:>6}  {}  {}",
            task.id.to_string().blue(),
            task.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
            task.title.bold()
        );
        let description = task.description_or_empty();
        if !description.is_empty() {
            println!("        {}", description);
        }
    }
    println!("{}", "─".repeat(60).dimmed());
}
