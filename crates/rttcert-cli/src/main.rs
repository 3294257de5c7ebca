//! rttcert CLI: issue, grade and audit RTT certification exams.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use rttcert_core::model::CertificationTier;

mod commands;

#[derive(Parser)]
#[command(name = "rttcert", version, about = "RTT certification exam engine")]
struct Cli {
    /// Config file path (default: ./rttcert.toml, then ~/.config/rttcert/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check bank integrity and report lint warnings
    Validate {
        /// Path to bank file or directory
        #[arg(long)]
        bank: Option<PathBuf>,
    },

    /// Show question counts per category and difficulty
    Stats {
        #[arg(long)]
        bank: Option<PathBuf>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Draw one exam and write the session JSON
    Select {
        #[arg(long)]
        bank: Option<PathBuf>,

        /// Candidate identifier
        #[arg(long)]
        candidate: String,

        /// Certification tier: foundation, practitioner, expert
        #[arg(long)]
        tier: CertificationTier,

        /// Cohort identifier
        #[arg(long)]
        cohort: Option<String>,

        /// Number of questions (default: questions_per_exam from config)
        #[arg(long)]
        count: Option<usize>,

        /// RNG seed for a reproducible draw
        #[arg(long)]
        seed: Option<u64>,

        /// Cohort seed (default: derived from --cohort)
        #[arg(long)]
        cohort_seed: Option<u64>,

        /// Previous session files whose questions should be avoided
        #[arg(long, num_args = 1..)]
        exclude: Vec<PathBuf>,

        /// Never reuse excluded questions, even if balance suffers
        #[arg(long)]
        strict: bool,

        /// Write the session here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Issue exams for a whole cohort
    Issue {
        #[arg(long)]
        bank: Option<PathBuf>,

        /// Cohort identifier
        #[arg(long)]
        cohort: String,

        /// Candidate identifiers (comma-separated)
        #[arg(long, value_delimiter = ',', required = true)]
        candidates: Vec<String>,

        #[arg(long)]
        tier: CertificationTier,

        #[arg(long)]
        count: Option<usize>,

        /// Directory of earlier session files to seed the attempt history
        #[arg(long)]
        history: Option<PathBuf>,

        /// Output directory for session files
        #[arg(long, default_value = "./rttcert-sessions")]
        output: PathBuf,
    },

    /// Print the answer-free paper for a session
    Paper {
        #[arg(long)]
        bank: Option<PathBuf>,

        /// Session JSON
        #[arg(long)]
        session: PathBuf,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Grade a candidate's answers
    Grade {
        #[arg(long)]
        bank: Option<PathBuf>,

        /// Session JSON
        #[arg(long)]
        session: PathBuf,

        /// Answers JSON: {"RTT-0001": "B", ...}
        #[arg(long)]
        answers: PathBuf,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,

        /// Also save the result JSON here
        #[arg(long)]
        output: Option<PathBuf>,

        /// Replace an existing result at --output
        #[arg(long)]
        regrade: bool,
    },

    /// Measure question overlap between issued sessions
    Audit {
        /// Session JSON files
        #[arg(long, num_args = 1.., required = true)]
        sessions: Vec<PathBuf>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create starter config and sample question bank
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rttcert=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Validate { bank } => commands::validate::execute(bank, config),
        Commands::Stats { bank, format } => commands::stats::execute(bank, format, config),
        Commands::Select {
            bank,
            candidate,
            tier,
            cohort,
            count,
            seed,
            cohort_seed,
            exclude,
            strict,
            output,
        } => commands::select::execute(
            commands::select::SelectArgs {
                bank,
                candidate,
                tier,
                cohort,
                count,
                seed,
                cohort_seed,
                exclude,
                strict,
                output,
            },
            config,
        ),
        Commands::Issue {
            bank,
            cohort,
            candidates,
            tier,
            count,
            history,
            output,
        } => {
            commands::issue::execute(bank, cohort, candidates, tier, count, history, output, config)
                .await
        }
        Commands::Paper {
            bank,
            session,
            format,
        } => commands::paper::execute(bank, session, format, config),
        Commands::Grade {
            bank,
            session,
            answers,
            format,
            output,
            regrade,
        } => commands::grade::execute(bank, session, answers, format, output, regrade, config),
        Commands::Audit { sessions, format } => commands::audit::execute(sessions, format),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
