use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    actions, AdminClient, Dispatcher, ListMode, Operation, StudentImage, Store, DEFAULT_BASE_URL,
};
use shared::domain::{CampusId, CohortId, ProgramId, StudentId, STATUS_INACTIVE};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod edits;

use edits::{guess_mime_type, parse_bulk_rows, parse_edit};

#[derive(Parser, Debug)]
#[command(about = "Campus / program / cohort / student admin client")]
struct Cli {
    #[arg(long, env = "CPC_API_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,
    /// Print only the dispatched actions, not the final state.
    #[arg(long)]
    actions_only: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load campuses and follow the first entry down the hierarchy.
    Browse {
        #[arg(long, default_value = "fetchAll")]
        mode: ListMode,
        #[arg(long, default_value = "noop")]
        operation: Operation,
        /// Re-select a campus after the initial load.
        #[arg(long)]
        campus: Option<i64>,
        #[arg(long)]
        program: Option<i64>,
        #[arg(long)]
        cohort: Option<i64>,
    },
    /// List the active students of a cohort, or a single student.
    Students {
        #[arg(long)]
        cohort: Option<i64>,
        #[arg(long)]
        student: Option<i64>,
    },
    /// Edit fields of an existing student and save it.
    Update {
        #[arg(long)]
        student: i64,
        /// `field=value`; repeatable.
        #[arg(long = "set", value_name = "FIELD=VALUE", required = true)]
        edits: Vec<String>,
    },
    /// Build a new student from `field=value` pairs and save it.
    Create {
        #[arg(long = "set", value_name = "FIELD=VALUE", required = true)]
        edits: Vec<String>,
    },
    /// Soft-delete a student and reload its cohort.
    Delete {
        #[arg(long)]
        student: i64,
        #[arg(long)]
        cohort: i64,
        #[arg(long, default_value = STATUS_INACTIVE)]
        status: String,
    },
    /// Upload an image for a student and point one of its fields at it.
    Image {
        #[arg(long)]
        student: i64,
        #[arg(long)]
        cohort: i64,
        #[arg(long)]
        image_type: String,
        path: PathBuf,
    },
    /// Add every student in a JSON array file to a cohort.
    Bulk {
        #[arg(long)]
        cohort: i64,
        path: PathBuf,
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

    let store = Arc::new(Store::new());
    let mut dispatched = store.subscribe();
    let client = AdminClient::new(&cli.base_url, store.clone())?;
    info!(base_url = %client.base_url(), "admin client ready");

    let outcome = run(&client, &store, cli.command).await;

    let state = store.snapshot().await;
    if cli.actions_only {
        while let Ok(action) = dispatched.try_recv() {
            println!("{}", serde_json::to_string(&action)?);
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&state)?);
    }
    for failure in &state.errors {
        eprintln!("FETCH_ERROR {}: {}", failure.source, failure.err);
    }

    outcome
}

async fn run(client: &AdminClient, store: &Store, command: Command) -> Result<()> {
    match command {
        Command::Browse {
            mode,
            operation,
            campus,
            program,
            cohort,
        } => {
            client.fetch_campus_list(mode, operation).await?;
            if let Some(campus) = campus {
                client
                    .set_current_campus_fetch_programs(CampusId(campus), mode, operation)
                    .await?;
            }
            if let Some(program) = program {
                client
                    .set_current_program_fetch_cohorts(ProgramId(program), mode, operation)
                    .await?;
            }
            if let Some(cohort) = cohort {
                client
                    .set_current_cohort_fetch_students(CohortId(cohort), mode)
                    .await?;
            }
        }
        Command::Students { cohort, student } => {
            client
                .fetch_student_list(cohort.map(CohortId), student.map(StudentId))
                .await?;
        }
        Command::Update { student, edits } => {
            client
                .fetch_student_list(None, Some(StudentId(student)))
                .await?;
            for raw in &edits {
                let (field, value) = parse_edit(raw)?;
                store
                    .dispatch(actions::update_current_student(field, value))
                    .await;
            }
            let current = store
                .snapshot()
                .await
                .current_student
                .with_context(|| format!("student {student} not found or inactive"))?;
            client.post_current_student(&current).await?;
        }
        Command::Create { edits } => {
            for raw in &edits {
                let (field, value) = parse_edit(raw)?;
                store
                    .dispatch(actions::update_new_student(field, value))
                    .await;
            }
            let draft = store.snapshot().await.new_student;
            client.post_new_student(&draft).await?;
        }
        Command::Delete {
            student,
            cohort,
            status,
        } => {
            client
                .delete_current_student(&status, StudentId(student), CohortId(cohort))
                .await?;
        }
        Command::Image {
            student,
            cohort,
            image_type,
            path,
        } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .with_context(|| format!("{} has no usable file name", path.display()))?
                .to_string();
            let image = StudentImage {
                name,
                bytes,
                mime_type: guess_mime_type(&path),
            };
            client
                .post_student_image(image, &image_type, StudentId(student), CohortId(cohort))
                .await?;
        }
        Command::Bulk { cohort, path } => {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let rows = parse_bulk_rows(&raw)?;
            client.post_bulk_students(rows, CohortId(cohort)).await?;
        }
    }
    Ok(())
}
