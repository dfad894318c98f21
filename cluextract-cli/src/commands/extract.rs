//! Extract command - download the features inside an AOI.

use std::path::PathBuf;
use std::time::Duration;

use cluextract::config::ConfigFile;
use cluextract::display::format_count;
use cluextract::extract::{connect, ExtractConfig, ExtractJob, ExtractReport, ExtractStage};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::common::{load_aoi, resolve_credentials, FormatArg, StrategyArg};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the extract command.
pub struct ExtractArgs {
    pub aoi: PathBuf,
    pub output: Option<PathBuf>,
    pub format: Option<FormatArg>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub layer_url: Option<String>,
    pub parallel: Option<usize>,
    pub timeout: Option<u64>,
    pub retry_delay: Option<u64>,
    pub strategy: Option<StrategyArg>,
    pub split_margin: Option<u64>,
    pub keep_outside: bool,
}

/// Run the extract command.
pub fn run(args: ExtractArgs, verbose: bool) -> Result<(), CliError> {
    let runner = CliRunner::new(verbose)?;
    runner.log_startup("extract");

    let aoi = load_aoi(&args.aoi)?;
    let config = build_config(&args, runner.config());
    let credentials = resolve_credentials(
        args.token,
        args.username,
        runner.config(),
        config.timeout.as_secs(),
    )?;

    println!("Area of interest: {} ({})", aoi.name(), args.aoi.display());
    println!("Feature layer:    {}", config.layer_url);
    println!();

    let layer = connect(&config, credentials, aoi.spatial_reference())?;
    let job = ExtractJob::new(layer, config);

    let progress = progress_bar();
    let bar = progress.clone();
    let result = job.run(
        &aoi,
        Some(Box::new(move |stage: ExtractStage, completed: usize, total: usize| match stage {
            ExtractStage::Fetching | ExtractStage::Retrying => {
                bar.set_length(total as u64);
                bar.set_position(completed as u64);
                bar.set_message(stage.name());
            }
            _ => bar.set_message(stage.name()),
        })),
    );
    progress.finish_and_clear();

    let report = result?;
    print_summary(&report);
    Ok(())
}

/// Merge CLI overrides onto the configuration file.
fn build_config(args: &ExtractArgs, file: &ConfigFile) -> ExtractConfig {
    // CLI takes precedence, then config
    let mut config = ExtractConfig::from_config_file(file);
    if let Some(ref dir) = args.output {
        config = config.with_output_dir(dir.clone());
    }
    if let Some(format) = args.format {
        config = config.with_format(format.into());
    }
    if let Some(ref url) = args.layer_url {
        config = config.with_layer_url(url.clone());
    }
    if let Some(parallel) = args.parallel {
        config = config.with_parallel(parallel);
    }
    if let Some(timeout) = args.timeout {
        config = config.with_timeout(Duration::from_secs(timeout.max(1)));
    }
    if let Some(delay) = args.retry_delay {
        config = config.with_retry_delay(Duration::from_secs(delay));
    }
    if let Some(strategy) = args.strategy {
        config = config.with_strategy(strategy.into());
    }
    if let Some(margin) = args.split_margin {
        config = config.with_split_margin(margin);
    }
    if args.keep_outside {
        config = config.with_select_intersecting(false);
    }
    config
}

/// Progress bar on stdout; log lines go to stderr.
fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stdout());
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn print_summary(report: &ExtractReport) {
    if report.is_complete() {
        println!("Extract complete");
        println!("================");
    } else {
        println!("Extract finished with missing features");
        println!("======================================");
    }
    println!("  Output:            {}", report.output_path.display());
    println!("  Record limit:      {}", format_count(report.record_limit));
    if let Some(wkid) = report
        .layer_spatial_reference
        .and_then(|sr| sr.effective_wkid())
    {
        println!("  Layer WKID:        {}", wkid);
    }
    println!("  Requests:          {}", report.requests);
    println!(
        "  Estimated:         {} features",
        format_count(report.estimated_features)
    );
    println!("  Written:           {} features", format_count(report.features as u64));
    println!("  Duplicates:        {}", format_count(report.duplicates as u64));
    if report.outside_aoi > 0 {
        println!("  Outside AOI:       {}", format_count(report.outside_aoi as u64));
    }

    if !report.truncated.is_empty() {
        println!();
        println!("Partial results (service limit reached):");
        for key in &report.truncated {
            println!("  {}", key);
        }
    }

    if !report.abandoned.is_empty() {
        println!();
        println!("Abandoned regions (not fetched):");
        for region in &report.abandoned {
            println!("  {}", region.reason);
        }
    }

    if !report.failed.is_empty() {
        println!();
        println!("Failed requests (features missing from output):");
        for failure in &report.failed {
            println!("  {}: {}", failure.key, failure.reason);
        }
    }
}
