use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use shared::domain::{CampusId, CohortId, Fields, ProgramId};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/cpc.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateCampus {
        name: String,
        /// Extra fields as a JSON object.
        #[arg(long)]
        fields: Option<String>,
    },
    CreateProgram {
        campus_id: i64,
        name: String,
        #[arg(long)]
        fields: Option<String>,
    },
    CreateCohort {
        program_id: i64,
        name: String,
        #[arg(long)]
        fields: Option<String>,
    },
    /// Insert a JSON array of students into a cohort in one transaction.
    ImportStudents { cohort_id: i64, path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateCampus { name, fields } => {
            let campus_id = storage
                .create_campus(named_fields(&name, fields.as_deref())?)
                .await?;
            println!("created campus_id={campus_id}");
        }
        Command::CreateProgram {
            campus_id,
            name,
            fields,
        } => {
            let program_id = storage
                .create_program(CampusId(campus_id), named_fields(&name, fields.as_deref())?)
                .await?;
            println!("created program_id={program_id}");
        }
        Command::CreateCohort {
            program_id,
            name,
            fields,
        } => {
            let cohort_id = storage
                .create_cohort(ProgramId(program_id), named_fields(&name, fields.as_deref())?)
                .await?;
            println!("created cohort_id={cohort_id}");
        }
        Command::ImportStudents { cohort_id, path } => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let rows: Vec<Value> = serde_json::from_str(&raw)?;
            let rows = rows
                .into_iter()
                .map(|row| match row {
                    Value::Object(fields) => Ok(fields),
                    other => Err(anyhow!("student row is not an object: {other}")),
                })
                .collect::<Result<Vec<Fields>>>()?;
            let ids = storage
                .bulk_create_students(CohortId(cohort_id), rows)
                .await?;
            println!("imported {} students into cohort_id={cohort_id}", ids.len());
        }
    }

    Ok(())
}

fn named_fields(name: &str, extra: Option<&str>) -> Result<Fields> {
    let mut fields = match extra {
        Some(raw) => match serde_json::from_str(raw)? {
            Value::Object(fields) => fields,
            other => bail!("--fields must be a JSON object, got {other}"),
        },
        None => Fields::new(),
    };
    fields.insert("name".into(), Value::String(name.to_string()));
    Ok(fields)
}
