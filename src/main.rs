use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use release_tracker::cli::orchestration::{
    execute_release, run_analysis, ProjectTarget, ReleaseOptions,
};
use release_tracker::config::{self, Config};
use release_tracker::git::Git2Repository;
use release_tracker::report::{self, CsvFormat};
use release_tracker::status::ActuatorClient;
use release_tracker::ui;

#[derive(Parser)]
#[command(
    name = "release-tracker",
    version,
    about = "Track environment divergence and cut ticket releases across repositories"
)]
struct Args {
    #[arg(short, long, global = true, help = "Enable debug logging")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compare what each environment runs and list the commits between them
    Analyze {
        #[arg(short, long, help = "Custom configuration file path")]
        config: Option<String>,

        #[arg(long, help = "Write a CSV ticket report to this path")]
        csv_output: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "summary", help = "CSV report layout")]
        csv_format: CsvFormat,

        #[arg(long, help = "Delete repository mirrors after the run")]
        cleanup: bool,
    },
    /// Create release branches and version tags for a ticket in every project
    Release {
        #[arg(short, long, help = "Custom configuration file path")]
        config: Option<String>,

        /// Ticket identifier, e.g. BWD-123
        ticket: String,

        #[arg(short, long, help = "Answer yes to every push confirmation")]
        yes: bool,

        #[arg(long, help = "Preview plans without creating branches, tags or pushes")]
        dry_run: bool,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let exit_code = match args.command {
        Command::Analyze {
            config,
            csv_output,
            csv_format,
            cleanup,
        } => analyze(config.as_deref(), csv_output, csv_format, cleanup)?,
        Command::Release {
            config,
            ticket,
            yes,
            dry_run,
        } => release(config.as_deref(), &ticket, yes, dry_run)?,
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

fn load(config_path: Option<&str>) -> Result<Config> {
    let config = config::load_config(config_path)?;
    if config.projects.is_empty() {
        anyhow::bail!("no projects configured");
    }
    Ok(config)
}

fn open_targets(config: &Config) -> Vec<ProjectTarget<Git2Repository>> {
    config
        .projects
        .iter()
        .map(|project| {
            let repo = Git2Repository::open(project, &config.workdir, config.git_timeout());
            ProjectTarget::new(project.clone(), repo)
        })
        .collect()
}

fn analyze(
    config_path: Option<&str>,
    csv_output: Option<PathBuf>,
    csv_format: CsvFormat,
    cleanup: bool,
) -> Result<i32> {
    let config = load(config_path)?;
    let mut targets = open_targets(&config);
    let source = ActuatorClient::new(config.http_timeout());

    ui::display_status(&format!("Analyzing {} project(s)...", targets.len()));
    let summary = run_analysis(&mut targets, &source, cleanup);

    for warning in &summary.warnings {
        ui::display_boundary_warning(warning);
    }
    ui::display_analysis(&summary);
    ui::display_statistics(&report::ticket_statistics(&summary.analyses));

    if let Some(path) = csv_output {
        let rows = report::write_csv_report(&summary.analyses, &path, csv_format)?;
        ui::display_success(&format!("CSV report written to {} ({} rows)", path.display(), rows));
    }

    if summary.is_total_failure() {
        ui::display_error("No project could be analyzed");
        return Ok(1);
    }
    Ok(0)
}

fn release(config_path: Option<&str>, ticket: &str, yes: bool, dry_run: bool) -> Result<i32> {
    let config = load(config_path)?;
    let mut targets = open_targets(&config);
    let options = ReleaseOptions { dry_run };

    if dry_run {
        ui::display_status("Dry run: no branches, tags or pushes will be made");
    }

    let summary = match execute_release(ticket, &mut targets, options, ui::confirmer(yes)) {
        Ok(summary) => summary,
        Err(e) => {
            ui::display_error(&e.to_string());
            return Ok(2);
        }
    };

    if dry_run {
        for plan in summary.outcomes.iter().filter_map(|o| o.plan.as_ref()) {
            ui::display_plan(plan);
        }
    }
    ui::display_release_summary(&summary);

    Ok(if summary.failed() > 0 { 1 } else { 0 })
}
