use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

mod aggregate;
mod alerts;
mod config;
mod db;
mod error;
#[cfg(test)]
mod fixtures;
mod filter;
mod leaderboard;
mod logging;
mod models;
mod progression;
mod report;
mod risk;
mod snapshot;

use alerts::AlertThresholds;
use filter::CohortFilter;
use snapshot::Snapshot;

#[derive(Parser)]
#[command(name = "academic-engine")]
#[command(about = "Academic risk scoring and attendance progression for the college portal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct FilterArgs {
    /// Department code, e.g. CSE
    #[arg(long)]
    department: Option<String>,
    #[arg(long)]
    batch_year: Option<i32>,
    /// Only students enrolled in this course code
    #[arg(long)]
    course: Option<String>,
}

impl From<FilterArgs> for CohortFilter {
    fn from(args: FilterArgs) -> Self {
        CohortFilter {
            department: args.department,
            batch_year: args.batch_year,
            course_id: args.course,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a small sample roster with attendance and marks
    Seed,
    /// Import roster, enrollment, attendance or assessment CSV files
    Import {
        #[arg(long)]
        roster: Option<PathBuf>,
        #[arg(long)]
        enrollments: Option<PathBuf>,
        #[arg(long)]
        attendance: Option<PathBuf>,
        #[arg(long)]
        assessments: Option<PathBuf>,
    },
    /// Score academic risk across students
    Risk {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Show attendance and mark averages per enrolled course for one student
    Courses {
        #[arg(long)]
        email: String,
        /// Limit to a single course code
        #[arg(long)]
        course: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Show one student's xp, level, streaks and badges
    Progress {
        #[arg(long)]
        email: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Rank students by xp
    Leaderboard {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// List low attendance, low test and low internal mark alerts
    Alerts {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value_t = 75.0)]
        attendance_threshold: f64,
        #[arg(long, default_value_t = 25.0)]
        periodic_threshold: f64,
        #[arg(long, default_value_t = 23.0)]
        internal_threshold: f64,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_score(score: Option<f64>, out_of: u32) -> String {
    score.map_or_else(|| "not graded".to_string(), |value| format!("{value:.2}/{out_of}"))
}

fn student_label(snapshot: &Snapshot, student_id: uuid::Uuid) -> String {
    snapshot
        .student(student_id)
        .map(|student| format!("{} ({})", student.full_name, student.register_number))
        .unwrap_or_else(|| student_id.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let settings = config::Settings::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import {
            roster,
            enrollments,
            attendance,
            assessments,
        } => {
            if roster.is_none() && enrollments.is_none() && attendance.is_none() && assessments.is_none() {
                anyhow::bail!("nothing to import; pass at least one of --roster, --enrollments, --attendance, --assessments");
            }
            if let Some(path) = roster {
                let count = db::import_roster(&pool, &path).await?;
                println!("Imported {count} students from {}.", path.display());
            }
            if let Some(path) = enrollments {
                let count = db::import_enrollments(&pool, &path).await?;
                println!("Inserted {count} enrollments from {}.", path.display());
            }
            if let Some(path) = attendance {
                let count = db::import_attendance(&pool, &path).await?;
                println!("Inserted {count} attendance records from {}.", path.display());
            }
            if let Some(path) = assessments {
                let count = db::import_assessments(&pool, &path).await?;
                println!("Imported {count} assessment records from {}.", path.display());
            }
        }
        Commands::Risk {
            filter,
            limit,
            format,
        } => {
            let snapshot = db::fetch_snapshot(&pool).await?;
            let filter = CohortFilter::from(filter);
            let students = filter.apply(&snapshot);
            let mut cohort = risk::score_cohort(&snapshot, &students);
            info!(
                scored = cohort.profiles.len(),
                skipped = cohort.skipped.len(),
                "risk scoring finished"
            );
            cohort.profiles.truncate(limit);

            match format {
                OutputFormat::Json => print_json(&cohort.profiles)?,
                OutputFormat::Text => {
                    if cohort.profiles.is_empty() {
                        println!("No students with enrolled courses for {}.", filter.describe());
                    } else {
                        println!("Students by risk score ({}):", filter.describe());
                        for profile in &cohort.profiles {
                            println!(
                                "- {} score {} ({}): attendance {}, marks {}, assignments {}",
                                student_label(&snapshot, profile.student_id),
                                profile.risk_score,
                                profile.risk_level,
                                profile.factors.attendance_risk,
                                profile.factors.marks_risk,
                                profile.factors.assignment_risk
                            );
                        }
                    }
                    if !cohort.skipped.is_empty() {
                        println!(
                            "{} students skipped for insufficient data.",
                            cohort.skipped.len()
                        );
                    }
                }
            }
        }
        Commands::Courses {
            email,
            course,
            format,
        } => {
            let snapshot = db::fetch_snapshot(&pool).await?;
            let student = snapshot
                .student_by_email(&email)
                .with_context(|| format!("no student with email {email}"))?;
            let courses = match course {
                Some(course_id) => vec![aggregate::aggregate_course(
                    &snapshot,
                    student.student_id,
                    &course_id,
                )?],
                None => aggregate::aggregate_student(&snapshot, student.student_id),
            };

            match format {
                OutputFormat::Json => print_json(&courses)?,
                OutputFormat::Text => {
                    println!("{} ({})", student.full_name, student.register_number);
                    if courses.is_empty() {
                        println!("- not enrolled in any course");
                    }
                    for aggregate in &courses {
                        let attendance = aggregate.attendance_pct.map_or_else(
                            || "no classes yet".to_string(),
                            |pct| {
                                format!(
                                    "{pct:.0}% ({}/{})",
                                    aggregate.present_count, aggregate.total_count
                                )
                            },
                        );
                        println!(
                            "- {}: attendance {}, tests {}, assignments {}, internal {}",
                            aggregate.course_id,
                            attendance,
                            format_score(aggregate.avg_periodic, 50),
                            format_score(aggregate.avg_assignment, 50),
                            format_score(aggregate.internal_total, 40)
                        );
                    }
                }
            }
        }
        Commands::Progress { email, format } => {
            let snapshot = db::fetch_snapshot(&pool).await?;
            let student = snapshot
                .student_by_email(&email)
                .with_context(|| format!("no student with email {email}"))?;
            let profile = progression::progression(
                student.student_id,
                snapshot.attendance_history(student.student_id),
            );

            match format {
                OutputFormat::Json => print_json(&profile)?,
                OutputFormat::Text => {
                    println!("{} ({})", student.full_name, student.register_number);
                    println!(
                        "- level {} ({}% to next), {} xp",
                        profile.level, profile.level_progress_pct, profile.xp
                    );
                    println!(
                        "- streak {} days, best {} days",
                        profile.streak, profile.max_streak
                    );
                    match profile.attendance_pct {
                        Some(pct) => println!(
                            "- {} classes attended, {pct:.0}% attendance",
                            profile.classes_attended
                        ),
                        None => println!("- no classes recorded yet"),
                    }
                    if profile.badges.is_empty() {
                        println!("- no badges yet");
                    } else {
                        let names: Vec<_> = profile
                            .badges
                            .iter()
                            .map(|badge| format!("{} [{}]", badge.title(), badge.id()))
                            .collect();
                        println!("- badges: {}", names.join(", "));
                    }
                }
            }
        }
        Commands::Leaderboard {
            filter,
            limit,
            format,
        } => {
            let snapshot = db::fetch_snapshot(&pool).await?;
            let students = CohortFilter::from(filter).apply(&snapshot);
            let mut board =
                leaderboard::build(progression::cohort_progression(&snapshot, &students));
            board.truncate(limit);

            match format {
                OutputFormat::Json => print_json(&board)?,
                OutputFormat::Text => {
                    if board.is_empty() {
                        println!("No students in this scope.");
                    }
                    for entry in &board {
                        let attendance = entry.attendance_pct.map_or_else(
                            || "-".to_string(),
                            |pct| format!("{pct:.0}%"),
                        );
                        println!(
                            "{:>3}. {} {} xp, level {}, attendance {}",
                            entry.rank,
                            student_label(&snapshot, entry.student_id),
                            entry.xp,
                            entry.level,
                            attendance
                        );
                    }
                }
            }
        }
        Commands::Alerts {
            filter,
            attendance_threshold,
            periodic_threshold,
            internal_threshold,
            format,
        } => {
            let snapshot = db::fetch_snapshot(&pool).await?;
            let students = CohortFilter::from(filter).apply(&snapshot);
            let thresholds = AlertThresholds {
                attendance_pct: attendance_threshold,
                periodic_score: periodic_threshold,
                internal_total: internal_threshold,
            };
            let alert_list = alerts::cohort_alerts(&snapshot, &students, &thresholds);

            match format {
                OutputFormat::Json => print_json(&alert_list)?,
                OutputFormat::Text => {
                    if alert_list.is_empty() {
                        println!("No alerts.");
                    }
                    for alert in &alert_list {
                        let detail = match &alert.kind {
                            alerts::AlertKind::LowAttendance {
                                attendance_pct,
                                present,
                                total,
                            } => format!("{attendance_pct:.0}% ({present}/{total})"),
                            alerts::AlertKind::LowPeriodic { test, score } => {
                                format!("test {test} scored {score}/50")
                            }
                            alerts::AlertKind::LowInternal { internal_total } => {
                                format!("{internal_total:.2}/40")
                            }
                        };
                        println!(
                            "- {} {} {}: {}",
                            student_label(&snapshot, alert.student_id),
                            alert.course_id,
                            alert.kind.label(),
                            detail
                        );
                    }
                }
            }
        }
        Commands::Report { filter, out } => {
            let snapshot = db::fetch_snapshot(&pool).await?;
            let filter = CohortFilter::from(filter);
            let students = filter.apply(&snapshot);
            let risk = risk::score_cohort(&snapshot, &students);
            let board = leaderboard::build(progression::cohort_progression(&snapshot, &students));
            let alert_list =
                alerts::cohort_alerts(&snapshot, &students, &AlertThresholds::default());
            let report = report::build_report(
                &snapshot,
                &filter.describe(),
                &risk,
                &board,
                &alert_list,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
