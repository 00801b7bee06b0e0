//! GenBI command-line client
//!
//! Streams a natural-language question through the backend and prints the
//! progress narration, generated SQL, and answer. Also exposes the thin
//! management surfaces (database listing, knowledge base).

use anyhow::Result;
use clap::{Parser, Subcommand};
use genbi_core::{ApiClient, AskSession, RecordStatus, SessionState};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "genbi",
    about = "Ask questions of your database in plain language"
)]
struct Cli {
    /// Base URL of the GenBI backend
    #[arg(long, global = true, default_value = "http://localhost:8000")]
    api_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a natural-language question against an indexed database
    Ask {
        /// Database to query
        #[arg(long, short)]
        database: String,
        /// The question to ask
        question: String,
        /// Maximum rows to return
        #[arg(long, default_value_t = 100)]
        max_rows: u32,
        /// Save the resulting question/SQL pair to the knowledge base
        #[arg(long)]
        save: bool,
        /// Print the final record as JSON instead of formatted output
        #[arg(long)]
        json: bool,
    },
    /// List databases configured on the backend
    Databases,
    /// List knowledge base entries for a database
    KnowledgeBase {
        /// Database whose entries to list
        #[arg(long, short)]
        database: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = ApiClient::new(&cli.api_url)?;

    match cli.command {
        Command::Ask {
            database,
            question,
            max_rows,
            save,
            json,
        } => ask(client, &database, &question, max_rows, save, json).await,
        Command::Databases => list_databases(client).await,
        Command::KnowledgeBase { database } => list_knowledge_base(client, &database).await,
    }
}

async fn ask(
    client: ApiClient,
    database: &str,
    question: &str,
    max_rows: u32,
    save: bool,
    json: bool,
) -> Result<()> {
    let session = AskSession::new(client).with_max_rows(max_rows);
    let mut updates = session.subscribe();

    // Narrate progress on stderr while the stream runs
    let narrator = tokio::spawn(async move {
        let mut last_step = None;
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            if snapshot.state != SessionState::Streaming {
                break;
            }
            let Some(record) = snapshot.record else {
                continue;
            };
            if record.current_step != last_step {
                if let Some(step) = &record.current_step {
                    eprintln!("... {step}");
                }
                last_step = record.current_step;
            }
        }
    });

    let record = session.ask(question, database).await?;
    let _ = narrator.await;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    if record.status != RecordStatus::Succeeded {
        let message = record
            .error
            .clone()
            .or_else(|| {
                record
                    .execution
                    .as_ref()
                    .and_then(|execution| execution.error.clone())
            })
            .unwrap_or_else(|| "ask failed".to_string());
        anyhow::bail!(message);
    }

    if let Some(sql) = &record.sql {
        println!("SQL:\n{sql}\n");
    }
    if record.metadata.auto_fixed {
        println!(
            "(query auto-corrected after {} attempts)\n",
            record.metadata.fix_attempts
        );
    }
    if let Some(table) = &record.formatted_table {
        println!("{table}");
    }
    if let Some(execution) = &record.execution {
        let elapsed = execution
            .elapsed_ms
            .map(|ms| format!(" in {ms:.1} ms"))
            .unwrap_or_default();
        println!("{} rows{elapsed}", execution.row_count);
    }
    if let Some(answer) = &record.answer {
        println!("\n{answer}");
    }

    if save {
        let pair = session.save_to_knowledge_base(None).await?;
        let id = pair
            .id
            .map(|id| format!(" as {id}"))
            .unwrap_or_default();
        println!("\nSaved to knowledge base{id}");
    }

    Ok(())
}

async fn list_databases(client: ApiClient) -> Result<()> {
    let databases = client.list_databases().await?;
    if databases.is_empty() {
        println!("No databases indexed yet.");
        return Ok(());
    }
    for db in databases {
        println!(
            "{}  ({}@{}:{} / {})",
            db.database_id, db.user, db.host, db.port, db.database_name
        );
    }
    Ok(())
}

async fn list_knowledge_base(client: ApiClient, database: &str) -> Result<()> {
    let listing = client.knowledge_base(database).await?;
    println!(
        "{} entries ({} instructions, {} SQL pairs)\n",
        listing.total_count,
        listing.instructions.len(),
        listing.sql_pairs.len()
    );
    for instruction in &listing.instructions {
        println!("[instruction] {}: {}", instruction.title, instruction.content);
    }
    for pair in &listing.sql_pairs {
        println!("[sql pair] {}\n  {}", pair.question, pair.sql);
    }
    Ok(())
}
