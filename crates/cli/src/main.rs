use clap::{Parser, Subcommand};
use mobilemed_core::{CoreConfig, ExamLedger, PageRequest, PatientRegistry, Store};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "mobilemed")]
#[command(about = "MobileMed patient and exam records CLI")]
struct Cli {
    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://mobilemed.db")]
    database_url: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    Migrate,
    /// Patient records
    Patients {
        #[command(subcommand)]
        command: PatientCommands,
    },
    /// Exam records
    Exams {
        #[command(subcommand)]
        command: ExamCommands,
    },
}

#[derive(Subcommand)]
enum PatientCommands {
    /// List patients, newest first
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        page_size: u32,
    },
    /// Show one patient
    Show {
        /// Patient UUID
        id: Uuid,
    },
    /// Delete a patient with no exams
    Delete {
        /// Patient UUID
        id: Uuid,
    },
}

#[derive(Subcommand)]
enum ExamCommands {
    /// List exams, newest first
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        page_size: u32,
        /// Only exams of this patient
        #[arg(long)]
        patient_id: Option<Uuid>,
    },
    /// Show one exam
    Show {
        /// Exam UUID
        id: Uuid,
    },
    /// Delete an exam
    Delete {
        /// Exam UUID
        id: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("No command given. Run with --help for usage.");
        return Ok(());
    };

    let cfg = CoreConfig::from_env_values(
        Some(cli.database_url),
        std::env::var("DATABASE_MAX_CONNECTIONS").ok(),
        std::env::var("MOBILEMED_MAX_PAGE_SIZE").ok(),
    )?;
    let store = Store::connect(&cfg).await?;
    let result = run(command, &store, cfg.max_page_size()).await;
    store.close().await;
    result
}

async fn run(
    command: Commands,
    store: &Store,
    max_page_size: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Migrate => {
            store.migrate().await?;
            println!("Schema is up to date.");
        }
        Commands::Patients { command } => {
            let registry = PatientRegistry::new(store.clone());
            match command {
                PatientCommands::List { page, page_size } => {
                    let request = PageRequest::new(page, page_size, max_page_size)?;
                    let page = registry.list_patients(request).await?;
                    if page.data.is_empty() {
                        println!("No patients found.");
                    }
                    for patient in &page.data {
                        println!(
                            "ID: {}, CPF: {}, Name: {}, Born: {}, Created: {}",
                            patient.id,
                            patient.national_id,
                            patient.name,
                            patient.birth_date,
                            patient.created_at
                        );
                    }
                    println!(
                        "Page {} of {} ({} total)",
                        page.page, page.total_pages, page.total
                    );
                }
                PatientCommands::Show { id } => match registry.get_patient(id).await? {
                    Some(patient) => println!("{:#?}", patient),
                    None => println!("No patient with ID {}", id),
                },
                PatientCommands::Delete { id } => {
                    registry.delete_patient(id).await?;
                    println!("Deleted patient {}", id);
                }
            }
        }
        Commands::Exams { command } => {
            let ledger = ExamLedger::new(store.clone());
            match command {
                ExamCommands::List {
                    page,
                    page_size,
                    patient_id,
                } => {
                    let request = PageRequest::new(page, page_size, max_page_size)?;
                    let page = ledger.list_exams(request, patient_id).await?;
                    if page.data.is_empty() {
                        println!("No exams found.");
                    }
                    for exam in &page.data {
                        println!(
                            "ID: {}, Patient: {}, Modality: {}, Date: {}, Key: {}",
                            exam.id,
                            exam.patient_id,
                            exam.modality,
                            exam.exam_date,
                            exam.idempotency_key
                        );
                    }
                    println!(
                        "Page {} of {} ({} total)",
                        page.page, page.total_pages, page.total
                    );
                }
                ExamCommands::Show { id } => match ledger.get_exam(id).await? {
                    Some(exam) => println!("{:#?}", exam),
                    None => println!("No exam with ID {}", id),
                },
                ExamCommands::Delete { id } => {
                    ledger.delete_exam(id).await?;
                    println!("Deleted exam {}", id);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_exam_list_filter() {
        let cli = Cli::try_parse_from([
            "mobilemed",
            "--database-url",
            "sqlite::memory:",
            "exams",
            "list",
            "--page-size",
            "5",
            "--patient-id",
            "550e8400-e29b-41d4-a716-446655440000",
        ])
        .unwrap();
        assert_eq!(cli.database_url, "sqlite::memory:");
        match cli.command {
            Some(Commands::Exams {
                command:
                    ExamCommands::List {
                        page,
                        page_size,
                        patient_id,
                    },
            }) => {
                assert_eq!(page, 1);
                assert_eq!(page_size, 5);
                assert!(patient_id.is_some());
            }
            _ => panic!("expected exams list"),
        }
    }

    #[test]
    fn rejects_non_uuid_ids() {
        assert!(Cli::try_parse_from(["mobilemed", "patients", "show", "nope"]).is_err());
    }
}
