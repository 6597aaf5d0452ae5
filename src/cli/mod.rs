use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::application::{HistoryFilter, Services};
use crate::domain::{
    CoachId, HistoryEntry, StudentId, format_delta, format_timestamp, parse_delta,
};

/// Lesson Ledger - prepaid lesson credits for a coaching facility
#[derive(Parser)]
#[command(name = "lessonledger")]
#[command(about = "Track students' lesson credits, coach assignments and the audit trail behind them")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(
        short,
        long,
        env = "LESSONLEDGER_DATABASE",
        default_value = "lessons.db"
    )]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Student management commands
    #[command(subcommand)]
    Student(StudentCommands),

    /// Coach management commands
    #[command(subcommand)]
    Coach(CoachCommands),

    /// Record a lesson package purchase
    Topup {
        /// Student ID
        student: StudentId,

        /// Number of lessons purchased
        #[arg(short, long, default_value = "10")]
        lessons: i64,
    },

    /// Check a student into a class, consuming one lesson
    Class {
        /// Student ID
        student: StudentId,

        /// Coach teaching the class
        #[arg(short, long)]
        coach: CoachId,

        /// Note, e.g. court or drill
        #[arg(short, long, default_value = "")]
        note: String,
    },

    /// Apply a raw signed change to a student's balance
    Adjust {
        /// Student ID
        student: StudentId,

        /// Signed change, e.g. "+5" or "-2"
        #[arg(allow_hyphen_values = true)]
        delta: String,

        /// Note recorded with the entry
        #[arg(short, long, default_value = "")]
        note: String,

        /// Coach to attach to the entry
        #[arg(short, long)]
        coach: Option<CoachId>,
    },

    /// Show ledger history, most recent first
    History {
        /// Only show entries for this student
        #[arg(long)]
        student: Option<StudentId>,

        /// Maximum number of entries to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Verify ledger integrity
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: students, coaches, history (CSV) or full (JSON)
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum StudentCommands {
    /// Register a new student
    Add {
        /// Student name
        name: String,

        /// Contact phone number
        #[arg(short, long)]
        phone: Option<String>,
    },

    /// List students and their balances
    List,

    /// Show a student and their history
    Show {
        /// Student ID
        id: StudentId,
    },
}

#[derive(Subcommand)]
pub enum CoachCommands {
    /// Register a new coach
    Add {
        /// Coach name
        name: String,

        /// Specialty, e.g. "doubles tactics"
        #[arg(short, long)]
        specialty: Option<String>,
    },

    /// List coaches
    List,
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    let default = if verbose {
        "lessonledger=debug"
    } else {
        "lessonledger=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                Services::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Student(cmd) => {
                let services = Services::connect(&self.database).await?;
                run_student_command(&services, cmd).await?;
            }

            Commands::Coach(cmd) => {
                let services = Services::connect(&self.database).await?;
                run_coach_command(&services, cmd).await?;
            }

            Commands::Topup { student, lessons } => {
                let services = Services::connect(&self.database).await?;
                let result = services.ledger.top_up(student, lessons).await?;
                println!(
                    "Topped up {} lessons for student #{}. Balance: {}",
                    lessons, student, result.new_balance
                );
            }

            Commands::Class {
                student,
                coach,
                note,
            } => {
                let services = Services::connect(&self.database).await?;
                let result = services.ledger.consume_class(student, coach, &note).await?;
                println!("Done! Remaining balance: {} lessons", result.new_balance);
            }

            Commands::Adjust {
                student,
                delta,
                note,
                coach,
            } => {
                let services = Services::connect(&self.database).await?;
                let delta = parse_delta(&delta).context("Invalid delta. Use e.g. '+5' or '-2'")?;
                let result = services
                    .ledger
                    .apply_delta(student, delta, &note, coach)
                    .await?;
                println!(
                    "Applied {} to student #{} (entry #{}). Balance: {}",
                    format_delta(delta),
                    student,
                    result.entry.id,
                    result.new_balance
                );
            }

            Commands::History { student, limit } => {
                let services = Services::connect(&self.database).await?;
                let history = services
                    .query
                    .list_history_filtered(HistoryFilter {
                        student_id: student,
                        limit,
                    })
                    .await?;
                print_history(&history);
            }

            Commands::Check => {
                let services = Services::connect(&self.database).await?;
                run_check_command(&services).await?;
            }

            Commands::Export {
                export_type,
                output,
            } => {
                let services = Services::connect(&self.database).await?;
                run_export_command(&services, &export_type, output).await?;
            }
        }

        Ok(())
    }
}

async fn run_student_command(services: &Services, cmd: StudentCommands) -> Result<()> {
    match cmd {
        StudentCommands::Add { name, phone } => {
            let student = services.ledger.register_student(&name, phone).await?;
            println!("Registered student #{}: {}", student.id, student.name);
        }

        StudentCommands::List => {
            let students = services.query.list_students().await?;
            if students.is_empty() {
                println!("No students found.");
            } else {
                println!("{:>5} {:<20} {:<15} {:>8}", "ID", "NAME", "PHONE", "BALANCE");
                println!("{}", "-".repeat(51));
                for student in students {
                    println!(
                        "{:>5} {:<20} {:<15} {:>8}",
                        student.id,
                        truncate(&student.name, 20),
                        student.phone.as_deref().unwrap_or(""),
                        student.balance
                    );
                }
            }
        }

        StudentCommands::Show { id } => {
            let student = services.query.get_student(id).await?;
            println!("Student: {}", student.name);
            println!("  ID:       {}", student.id);
            if let Some(phone) = &student.phone {
                println!("  Phone:    {}", phone);
            }
            println!("  Balance:  {} lessons", student.balance);
            println!();

            let history = services.query.student_history(id).await?;
            print_history(&history);
        }
    }
    Ok(())
}

async fn run_coach_command(services: &Services, cmd: CoachCommands) -> Result<()> {
    match cmd {
        CoachCommands::Add { name, specialty } => {
            let coach = services.ledger.register_coach(&name, specialty).await?;
            println!("Registered coach #{}: {}", coach.id, coach.name);
        }

        CoachCommands::List => {
            let coaches = services.query.list_coaches().await?;
            if coaches.is_empty() {
                println!("No coaches found.");
            } else {
                println!("{:>5} {:<20} SPECIALTY", "ID", "NAME");
                println!("{}", "-".repeat(50));
                for coach in coaches {
                    println!(
                        "{:>5} {:<20} {}",
                        coach.id,
                        truncate(&coach.name, 20),
                        coach.specialty.as_deref().unwrap_or("")
                    );
                }
            }
        }
    }
    Ok(())
}

fn print_history(history: &[HistoryEntry]) {
    if history.is_empty() {
        println!("No history found.");
        return;
    }

    println!(
        "{:<20} {:<15} {:<15} {:>7} NOTE",
        "TIMESTAMP", "STUDENT", "COACH", "CHANGE"
    );
    println!("{}", "-".repeat(75));

    for item in history {
        println!(
            "{:<20} {:<15} {:<15} {:>7} {}",
            format_timestamp(&item.entry.timestamp),
            truncate(&item.student_name, 15),
            truncate(item.coach_name.as_deref().unwrap_or("-"), 15),
            format_delta(item.entry.delta),
            truncate(&item.entry.note, 30)
        );
    }
}

async fn run_check_command(services: &Services) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = services.query.check_integrity().await?;

    println!("Students: {}", report.student_count);
    println!("Coaches:  {}", report.coach_count);
    println!("Entries:  {}", report.entry_count);
    println!("Outstanding lessons: {}", report.total_balance);
    println!();

    for warning in &report.warnings {
        println!("Warning: {}", warning);
    }

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

async fn run_export_command(
    services: &Services,
    export_type: &str,
    output: Option<String>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(&services.query);
    let writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create {}", path))?,
        ),
        None => Box::new(stdout()),
    };

    match export_type {
        "students" => {
            let count = exporter.export_students_csv(writer).await?;
            eprintln!("Exported {} students", count);
        }
        "coaches" => {
            let count = exporter.export_coaches_csv(writer).await?;
            eprintln!("Exported {} coaches", count);
        }
        "history" => {
            let count = exporter.export_history_csv(writer).await?;
            eprintln!("Exported {} history entries", count);
        }
        "full" => {
            let snapshot = exporter.export_snapshot_json(writer).await?;
            eprintln!(
                "Exported {} students, {} coaches, {} entries",
                snapshot.students.len(),
                snapshot.coaches.len(),
                snapshot.history.len()
            );
        }
        other => anyhow::bail!(
            "Unknown export type '{}'. Use: students, coaches, history, full",
            other
        ),
    }

    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
