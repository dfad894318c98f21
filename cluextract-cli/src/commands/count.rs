//! Count command - report how many features an AOI contains.

use std::path::PathBuf;

use cluextract::display::format_count;
use cluextract::extract::{connect, ExtractConfig, ExtractJob};

use super::common::{load_aoi, resolve_credentials};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the count command.
pub fn run(
    aoi_path: PathBuf,
    token: Option<String>,
    username: Option<String>,
    layer_url: Option<String>,
    verbose: bool,
) -> Result<(), CliError> {
    let runner = CliRunner::new(verbose)?;
    runner.log_startup("count");

    let aoi = load_aoi(&aoi_path)?;
    let mut config = ExtractConfig::from_config_file(runner.config());
    if let Some(url) = layer_url {
        config = config.with_layer_url(url);
    }

    let credentials =
        resolve_credentials(token, username, runner.config(), config.timeout.as_secs())?;
    let layer = connect(&config, credentials, aoi.spatial_reference())?;
    let job = ExtractJob::new(layer, config);

    let count = job.count(&aoi)?;
    println!("{}: {} features", aoi.name(), format_count(count));
    Ok(())
}
