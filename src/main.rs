use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use qms_e2e::runner::{self, RunOptions, SuiteKind};
use qms_e2e::{report, utils};

#[derive(Parser)]
#[command(name = "qms-e2e")]
#[command(version)]
#[command(about = "End-to-end suites for the Kademe QMS web app and its Supabase API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct OutputArgs {
    /// Directory the JSON reports are written to
    #[arg(short, long, default_value = "tmp")]
    output: PathBuf,

    /// Also write JUnit XML next to the JSON reports
    #[arg(long, default_value = "false")]
    junit: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the browser suite
    Ui {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Run the HTTP API suite
    Api {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Run both suites and write a combined report
    All {
        #[command(flatten)]
        output: OutputArgs,

        /// Run the UI and API suites at the same time
        #[arg(long, default_value = "false")]
        concurrent: bool,
    },

    /// Re-render a persisted JSON report
    Report {
        /// Path to a *_test_results.json file
        results: PathBuf,

        /// Output format (junit, summary)
        #[arg(short, long, default_value = "summary")]
        format: String,

        /// Output directory for generated files
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let (kinds, output, concurrent) = match cli.command {
        Commands::Ui { output } => (vec![SuiteKind::Ui], output, false),
        Commands::Api { output } => (vec![SuiteKind::Api], output, false),
        Commands::All { output, concurrent } => {
            (vec![SuiteKind::Ui, SuiteKind::Api], output, concurrent)
        }
        Commands::Report {
            results,
            format,
            output,
        } => {
            println!(
                "{} Generating {} report from: {}",
                "📊".to_string().blue(),
                format.cyan(),
                results.display()
            );
            report::generate_report(&results, &format, output.as_deref())?;
            return Ok(());
        }
    };

    let config = utils::Config::from_env();
    print_banner(&kinds, &config, &output, concurrent);

    let options = RunOptions {
        output_dir: output.output,
        junit: output.junit,
        concurrent,
    };
    let report = runner::run_suites(&kinds, &config, &options).await?;

    std::process::exit(report.exit_code());
}

fn print_banner(kinds: &[SuiteKind], config: &utils::Config, output: &OutputArgs, concurrent: bool) {
    let names: Vec<_> = kinds.iter().map(|k| k.label()).collect();
    println!(
        "{} Running suites: {}",
        "▶".green().bold(),
        names.join(", ").cyan()
    );
    if kinds.contains(&SuiteKind::Ui) {
        println!("  Web UI: {}", config.base_url.cyan());
    }
    if kinds.contains(&SuiteKind::Api) {
        println!("  Supabase: {}", config.supabase_url.cyan());
    }
    println!("  User: {}", config.login_email.cyan());
    println!("  Output: {}", output.output.display().to_string().cyan());
    if concurrent {
        println!("  Concurrent: {}", "Enabled".yellow());
    }
    if output.junit {
        println!("  JUnit: {}", "Enabled".green());
    }
    if config.timeout_retries > 0 {
        println!(
            "  Timeout retries: {}",
            config.timeout_retries.to_string().yellow()
        );
    }
}
