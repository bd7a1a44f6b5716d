mod aggregate;
mod browser;
mod bugzilla;
mod classify;
mod config;
mod extract;
mod links;
mod perma;
mod report;
mod score;

use aggregate::RunContext;
use bugzilla::BugzillaClient;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

/// Build a weekly triage report of intermittent and perma failures from
/// Bugzilla: score bugs by recent bot comments and write a static HTML page.
#[derive(Parser, Debug)]
#[command(name = "orange-triage", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "triage.toml")]
    config: PathBuf,

    /// Maximum number of concurrent Bugzilla fetches (overrides config)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Report output path (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Disable opening the browser after generating the report
    #[arg(long)]
    no_open: bool,

    /// Print the resolved config and exit without fetching
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (per-bug fetch and scoring decisions)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "orange_triage=debug"
    } else {
        "orange_triage=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "report generation failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();

    let mut config = config::load_config(&cli.config)?;
    config.apply(config::Overrides {
        concurrency: cli.concurrency,
        output: cli.output,
        no_open: cli.no_open,
    });

    if cli.dry_run {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("Generating Bugzilla report...");
    let now = chrono::Utc::now();
    let ctx = Arc::new(RunContext::from_config(&config, now));
    let client = Arc::new(BugzillaClient::new(&config.bugzilla)?);

    let intermittents = client.intermittent_bugs().await?;
    let results = aggregate::analyze_all(Arc::clone(&client), intermittents, Arc::clone(&ctx)).await;

    let perma_list = client.perma_bugs(ctx.links.window_start()).await?;
    let permas = perma::perma_bugs(&perma_list, &ctx.links, &ctx.unassigned);

    match publish(&results, &permas, now, &config.report.output)? {
        Outcome::NoMatches => println!("No matching bugs found."),
        Outcome::Written => {
            tracing::info!(
                intermittents = results.len(),
                permas = permas.len(),
                "report complete"
            );
            println!("Report written to {}", config.report.output.display());
            if config.report.open_browser {
                browser::open_in_browser(&config.report.output);
            }
        }
    }

    println!("Report generated in {:.2?}", start.elapsed());
    Ok(())
}

/// What `publish` did with the run's results.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    NoMatches,
    Written,
}

/// Render and write the report, unless there is nothing to report.
fn publish(
    results: &[aggregate::ScoredResult],
    permas: &[perma::PermaBug],
    now: chrono::DateTime<chrono::Utc>,
    output: &Path,
) -> Result<Outcome, report::ReportError> {
    if results.is_empty() && permas.is_empty() {
        return Ok(Outcome::NoMatches);
    }
    let html = report::render(results, permas, now);
    report::write_report(output, &html)?;
    Ok(Outcome::Written)
}
