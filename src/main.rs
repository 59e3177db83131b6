// Entry point and high-level CLI flow.
//
// Subcommands run one report (or all of them) and exit. Without a
// subcommand the interactive menu starts:
// - Option [1] loads every configured source, printing diagnostics.
// - Option [2] generates the reports and a JSON summary.
// - After generating reports, the user can go back to the menu or exit.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use equity_report::config::{Config, RenderStyle};
use equity_report::loader::{load_dataset, Dataset, LoadReport};
use equity_report::output;
use equity_report::reports::{self, ClusterReport, InequalityReport, PolicyReport};
use equity_report::util::{format_int, format_number};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "equity-report", version, about = "Regional composite indicator reports")]
struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the source CSV files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory receiving the CSV and JSON exports
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Reference-ratio inequality index
    Inequality,
    /// Policy priority matrix and recommendations
    Policy,
    /// Equal-width development clusters
    Clusters,
    /// Per-metric statistics and correlations
    Insights,
    /// Every report plus summary.json
    All,
    /// Interactive load/generate menu
    Menu,
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> Option<String> {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Ask whether to go back to the menu after generating reports.
///
/// Returns `true` for `Y`, `false` for `N` or end of input.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to Report Selection (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        match io::stdin().read_line(&mut buf) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {}
        }
        match buf.trim().to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Load every configured source and print a short summary of the run.
fn handle_load(config: &Config) -> (Dataset, LoadReport) {
    let (data, load_report) = load_dataset(config);
    println!(
        "Processing dataset... ({} of {} sources loaded, {} regions, {}–{})",
        format_int(load_report.loaded),
        format_int(load_report.sources),
        format_int(load_report.regions),
        config.first_year,
        config.last_year
    );
    for (metric, reason) in &load_report.failed {
        println!("Note: {} unavailable: {}", config.label_of(metric), reason);
    }
    if !load_report.unknown_regions.is_empty() {
        println!(
            "Note: Unrecognized regions: {}",
            load_report.unknown_regions.join(", ")
        );
    }
    if load_report.ignored_columns > 0 {
        println!(
            "Info: Ignored {} non-year/non-region columns.",
            format_int(load_report.ignored_columns)
        );
    }
    println!();
    (data, load_report)
}

fn export<T: Serialize>(out_dir: &Path, file: &str, rows: &[T]) {
    let path = out_dir.join(file);
    match output::write_csv(&path, rows) {
        Ok(()) => debug!("Wrote {}", path.display()),
        Err(e) => eprintln!("Write error: {}", e),
    }
}

fn run_inequality(data: &Dataset, config: &Config) -> Option<InequalityReport> {
    let title = "Report 1: Regional Health Inequality Index";
    let report = match reports::generate_inequality(data, config) {
        Ok(r) => r,
        Err(e) => {
            output::print_unavailable(title, &e);
            return None;
        }
    };
    let file = "report1_inequality_index.csv";
    export(&config.out_dir, file, &report.rows);
    let note = format!(
        "{} = 100, {} basis",
        config.reference_region, config.analysis_year
    );
    output::preview_table(title, Some(&note), &report.rows, &config.render);
    println!(
        "Best: {} ({}) / Worst: {} ({}) / Gap: {} / Mean: {}",
        report.best.0,
        format_number(report.best.1, 1),
        report.worst.0,
        format_number(report.worst.1, 1),
        format_number(report.gap, 1),
        format_number(report.mean, 1)
    );
    println!("(Full table exported to {})\n", file);
    Some(report)
}

fn run_policy(data: &Dataset, config: &Config) -> Option<PolicyReport> {
    let title = "Report 2: Policy Priority Matrix";
    let report = match reports::generate_policy(data, config) {
        Ok(r) => r,
        Err(e) => {
            output::print_unavailable(title, &e);
            return None;
        }
    };
    let file = "report2_policy_priority.csv";
    let recs = "report2_policy_recommendations.csv";
    export(&config.out_dir, file, &report.rows);
    export(&config.out_dir, recs, &report.recommendations);
    output::preview_table(
        title,
        Some("Higher score = more urgent"),
        &report.rows,
        &config.render,
    );
    let top = RenderStyle {
        preview_rows: config.render.preview_rows.min(3),
        ..config.render.clone()
    };
    output::preview_table_rows(&report.recommendations, &top);
    println!("(Full tables exported to {} and {})\n", file, recs);
    Some(report)
}

fn run_clusters(data: &Dataset, config: &Config) -> Option<ClusterReport> {
    let title = "Report 3: Regional Development Clusters";
    let report = match reports::generate_clusters(data, config) {
        Ok(r) => r,
        Err(e) => {
            output::print_unavailable(title, &e);
            return None;
        }
    };
    let file = "report3_clusters.csv";
    export(&config.out_dir, file, &report.rows);
    let note = format!(
        "{} equal-width bins, width {}",
        report.classification.bins,
        format_number(report.classification.width(), 3)
    );
    output::preview_table(title, Some(&note), &report.rows, &config.render);
    for p in &report.profiles {
        println!(
            "[{}] {} regions, mean score {}: {}",
            p.tier.name,
            p.count(),
            format_number(p.mean_score, 3),
            p.regions.join(", ")
        );
    }
    println!("(Full table exported to {})\n", file);
    Some(report)
}

fn run_insights(data: &Dataset, config: &Config) {
    let title = "Report 4: Metric Insights";
    let report = match reports::generate_insights(data, config) {
        Ok(r) => r,
        Err(e) => {
            output::print_unavailable(title, &e);
            return;
        }
    };
    let metrics = "report4_metric_insights.csv";
    let correlations = "report4_correlations.csv";
    export(&config.out_dir, metrics, &report.metrics);
    export(&config.out_dir, correlations, &report.correlations);
    output::preview_table(title, Some("Multi-year regional means"), &report.metrics, &config.render);
    output::preview_table_rows(&report.correlations, &config.render);
    for (subject, reason) in &report.skipped {
        println!("Note: {} skipped: {}", subject, reason);
    }
    println!("(Full tables exported to {} and {})\n", metrics, correlations);
}

/// Generate every report and the JSON summary.
///
/// Side effects: writes the CSV exports and summary.json to the output
/// directory and prints previews of each report.
fn handle_generate_reports(data: &Dataset, load: &LoadReport, config: &Config) {
    println!("Generating reports...");
    println!("Outputs saved to {}\n", config.out_dir.display());

    let inequality = run_inequality(data, config);
    let policy = run_policy(data, config);
    let clusters = run_clusters(data, config);
    run_insights(data, config);

    let summary = reports::generate_summary(load, inequality.as_ref(), policy.as_ref(), clusters.as_ref());
    let path = config.out_dir.join("summary.json");
    if let Err(e) = output::write_json(&path, &summary) {
        eprintln!("Write error: {}", e);
    }
    println!("Summary Stats (summary.json):");
    println!(
        "{{\"regions\": {}, \"inequality_gap\": {}, \"policy_average\": {}}}\n",
        summary.regions,
        summary
            .inequality_gap
            .map(|g| format_number(g, 1))
            .unwrap_or_else(|| "null".to_string()),
        summary
            .policy_average
            .map(|a| format_number(a, 2))
            .unwrap_or_else(|| "null".to_string())
    );
}

fn run_menu(config: &Config) {
    // Loaded once, reused for every generate request of the session.
    let mut loaded: Option<(Dataset, LoadReport)> = None;
    loop {
        println!("Select Option:");
        println!("[1] Load the data");
        println!("[2] Generate Reports\n");
        let Some(choice) = read_choice() else {
            println!("Exiting the program.");
            break;
        };
        match choice.as_str() {
            "1" => {
                loaded = Some(handle_load(config));
            }
            "2" => {
                println!();
                let Some((data, load)) = loaded.as_ref() else {
                    println!("Error: No data loaded. Please load the data first (option 1).\n");
                    continue;
                };
                handle_generate_reports(data, load, config);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => {
                println!("Invalid choice. Please enter 1 or 2.\n");
            }
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = cli.out_dir {
        config.out_dir = dir;
    }
    fs::create_dir_all(&config.out_dir)
        .with_context(|| format!("Failed to create {}", config.out_dir.display()))?;
    info!(
        "Data directory {}, {} sources",
        config.data_dir.display(),
        format_int(config.sources.len())
    );

    let command = cli.command.unwrap_or(Command::Menu);
    if command == Command::Menu {
        run_menu(&config);
        return Ok(());
    }

    let (data, load) = handle_load(&config);
    if data.is_empty() {
        anyhow::bail!("No source could be loaded from {}", config.data_dir.display());
    }
    match command {
        Command::Inequality => {
            run_inequality(&data, &config);
        }
        Command::Policy => {
            run_policy(&data, &config);
        }
        Command::Clusters => {
            run_clusters(&data, &config);
        }
        Command::Insights => run_insights(&data, &config),
        Command::All | Command::Menu => handle_generate_reports(&data, &load, &config),
    }
    Ok(())
}
