//! Common types and utilities shared across CLI commands.

use std::env;
use std::path::Path;

use clap::ValueEnum;
use cluextract::config::{ConfigFile, PASSWORD_ENV_VAR};
use cluextract::geometry::{Aoi, SubdivisionStrategy};
use cluextract::output::OutputFormat;
use cluextract::service::{Credentials, PortalTokenProvider, ReqwestClient, StaticToken};

use crate::error::CliError;

/// Output format selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum FormatArg {
    /// Esri JSON FeatureSet (.json)
    EsriJson,
    /// GeoJSON FeatureCollection (.geojson)
    GeoJson,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::EsriJson => OutputFormat::EsriJson,
            FormatArg::GeoJson => OutputFormat::GeoJson,
        }
    }
}

/// Subdivision strategy selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum StrategyArg {
    /// Strips of equal polygon area
    EqualArea,
    /// Strips of equal width
    Grid,
}

impl From<StrategyArg> for SubdivisionStrategy {
    fn from(strategy: StrategyArg) -> Self {
        match strategy {
            StrategyArg::EqualArea => SubdivisionStrategy::EqualArea,
            StrategyArg::Grid => SubdivisionStrategy::Grid,
        }
    }
}

/// Read the AOI file.
pub fn load_aoi(path: &Path) -> Result<Aoi, CliError> {
    Ok(Aoi::from_file(path)?)
}

/// Resolve credentials from CLI args, config, and the password variable.
pub fn resolve_credentials(
    cli_token: Option<String>,
    cli_username: Option<String>,
    config: &ConfigFile,
    timeout_secs: u64,
) -> Result<Credentials, CliError> {
    let password = env::var(PASSWORD_ENV_VAR).ok();
    credentials_for(cli_token, cli_username, password, config, timeout_secs)
}

/// Token beats username; with neither, queries are sent without a token.
fn credentials_for(
    cli_token: Option<String>,
    cli_username: Option<String>,
    password: Option<String>,
    config: &ConfigFile,
    timeout_secs: u64,
) -> Result<Credentials, CliError> {
    // CLI takes precedence, then config
    if let Some(token) = cli_token.or_else(|| config.auth.token.clone()) {
        return Ok(Credentials::new(Box::new(StaticToken::new(token))));
    }

    let Some(username) = cli_username.or_else(|| config.auth.username.clone()) else {
        return Ok(Credentials::anonymous());
    };

    let password = password.filter(|p| !p.is_empty()).ok_or_else(|| {
        CliError::Config(format!(
            "Portal user '{}' needs a password. Set {} in the environment.",
            username, PASSWORD_ENV_VAR
        ))
    })?;

    let http = ReqwestClient::with_timeout(timeout_secs)?;
    let provider = PortalTokenProvider::new(
        http,
        &config.service.portal_url,
        username,
        password,
        config.auth.referer.clone(),
    )?;
    Ok(Credentials::new(Box::new(provider)))
}
