//! Configuration loading and credential resolution
//!
//! Resolution priority for every setting:
//! 1. Command-line argument / environment variable (merged by the CLI parser)
//! 2. TOML config file
//! 3. Compiled default
//!
//! The resolved [`Config`] is immutable and passed by reference to every component.

use crate::model::{ColumnMap, Field};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an alternate config file
pub const CONFIG_ENV_VAR: &str = "FFR_CONFIG";

pub const DEFAULT_AIRTABLE_URL: &str = "https://api.airtable.com/v0";
pub const DEFAULT_AIRTABLE_BASE_ID: &str = "appgBl5EHB3qFtOPl";
pub const DEFAULT_AIRTABLE_TABLE: &str = "Post-Close Tracker";
pub const DEFAULT_AIRTABLE_VIEW: &str = "viww1LG42sIrTNGFc";
pub const DEFAULT_PAGE_DELAY_MS: u64 = 200;

pub const DEFAULT_VESTA_URL: &str = "https://multiply.beta.vesta.com/api";
pub const DEFAULT_VESTA_VERSION: &str = "_26_1";

pub const DEFAULT_PARSEUR_URL: &str = "https://api.parseur.com";
pub const DEFAULT_PARSEUR_MAILBOX: &str = "cherubic-select-alligator";

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_USER_AGENT: &str = "ffr/0.1.0 (funded file reconciler)";

pub const DEFAULT_TEMPLATE: &str = "Funded_File_Template.xlsx";
pub const DEFAULT_CHANNEL_IDENTIFIER: &str = "INDECOMM";

/// On-disk TOML config; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub channel_identifier: Option<String>,
    pub airtable: AirtableSection,
    pub vesta: VestaSection,
    pub parseur: ParseurSection,
    pub geocoder: GeocoderSection,
    pub output: OutputSection,
    /// Template column overrides keyed by field label
    pub columns: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AirtableSection {
    pub token: Option<String>,
    pub base_url: Option<String>,
    pub base_id: Option<String>,
    pub table: Option<String>,
    pub view: Option<String>,
    pub page_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VestaSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub api_version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParseurSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub mailbox: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GeocoderSection {
    pub base_url: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub template: Option<PathBuf>,
    pub directory: Option<PathBuf>,
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub airtable_token: Option<String>,
    pub vesta_api_key: Option<String>,
    pub parseur_api_key: Option<String>,
    pub view: Option<String>,
    pub template: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RecordTableConfig {
    pub token: String,
    pub base_url: String,
    pub base_id: String,
    pub table: String,
    pub view: String,
    pub page_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct LoanDataConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub api_version: String,
}

#[derive(Debug, Clone)]
pub struct DocumentConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub mailbox: String,
}

#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub template: PathBuf,
    pub directory: PathBuf,
}

/// Fully resolved run configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub channel_identifier: String,
    pub record_table: RecordTableConfig,
    pub loan_data: LoanDataConfig,
    pub documents: DocumentConfig,
    pub geocoder: GeocoderConfig,
    pub output: OutputConfig,
    pub columns: ColumnMap,
}

impl Config {
    /// Merge CLI/environment values over the TOML file over compiled defaults
    ///
    /// Fails when no record-table token is available or a column override is invalid.
    pub fn resolve(toml: TomlConfig, cli: CliOverrides) -> Result<Self> {
        let token = resolve_credential(
            "Airtable token",
            cli.airtable_token,
            toml.airtable.token.clone(),
        )
        .ok_or_else(|| {
            Error::Config(
                "AIRTABLE_TOKEN not configured. Set one of:\n\
                 1. Environment: AIRTABLE_TOKEN=your-token\n\
                 2. Command line: --airtable-token your-token\n\
                 3. TOML config: [airtable] token = \"your-token\""
                    .to_string(),
            )
        })?;

        let vesta_key = resolve_credential("Vesta API key", cli.vesta_api_key, toml.vesta.api_key);
        if vesta_key.is_none() {
            warn!("Vesta API key not configured; loan lookups will be unauthenticated");
        }

        let parseur_key =
            resolve_credential("Parseur API key", cli.parseur_api_key, toml.parseur.api_key);
        if parseur_key.is_none() {
            warn!("Parseur API key not configured; document lookups will be unauthenticated");
        }

        let channel_identifier = toml
            .channel_identifier
            .filter(|c| is_valid_key(c))
            .unwrap_or_else(|| DEFAULT_CHANNEL_IDENTIFIER.to_string());

        Ok(Self {
            channel_identifier,
            record_table: RecordTableConfig {
                token,
                base_url: toml
                    .airtable
                    .base_url
                    .unwrap_or_else(|| DEFAULT_AIRTABLE_URL.to_string()),
                base_id: toml
                    .airtable
                    .base_id
                    .unwrap_or_else(|| DEFAULT_AIRTABLE_BASE_ID.to_string()),
                table: toml
                    .airtable
                    .table
                    .unwrap_or_else(|| DEFAULT_AIRTABLE_TABLE.to_string()),
                view: cli
                    .view
                    .or(toml.airtable.view)
                    .unwrap_or_else(|| DEFAULT_AIRTABLE_VIEW.to_string()),
                page_delay: Duration::from_millis(
                    toml.airtable.page_delay_ms.unwrap_or(DEFAULT_PAGE_DELAY_MS),
                ),
            },
            loan_data: LoanDataConfig {
                api_key: vesta_key,
                base_url: toml
                    .vesta
                    .base_url
                    .unwrap_or_else(|| DEFAULT_VESTA_URL.to_string()),
                api_version: toml
                    .vesta
                    .api_version
                    .unwrap_or_else(|| DEFAULT_VESTA_VERSION.to_string()),
            },
            documents: DocumentConfig {
                api_key: parseur_key,
                base_url: toml
                    .parseur
                    .base_url
                    .unwrap_or_else(|| DEFAULT_PARSEUR_URL.to_string()),
                mailbox: toml
                    .parseur
                    .mailbox
                    .unwrap_or_else(|| DEFAULT_PARSEUR_MAILBOX.to_string()),
            },
            geocoder: GeocoderConfig {
                base_url: toml
                    .geocoder
                    .base_url
                    .unwrap_or_else(|| DEFAULT_NOMINATIM_URL.to_string()),
                user_agent: toml
                    .geocoder
                    .user_agent
                    .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            },
            output: OutputConfig {
                template: cli
                    .template
                    .or(toml.output.template)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE)),
                directory: cli
                    .output_dir
                    .or(toml.output.directory)
                    .unwrap_or_else(|| PathBuf::from(".")),
            },
            columns: column_map(&toml.columns)?,
        })
    }
}

/// Apply column overrides keyed by template label
fn column_map(overrides: &BTreeMap<String, u32>) -> Result<ColumnMap> {
    let mut map = ColumnMap::default();
    for (label, column) in overrides {
        let field = Field::from_label(label)
            .ok_or_else(|| Error::Config(format!("Unknown column label: {:?}", label)))?;
        map = map.with_column(field, *column).ok_or_else(|| {
            Error::Config(format!("Column for {:?} must be 1 or greater", label))
        })?;
    }
    Ok(map)
}

/// Resolve a secret from CLI/ENV then TOML
///
/// Blank values count as absent. Warns when more than one source provides a value.
pub fn resolve_credential(
    name: &str,
    cli_or_env: Option<String>,
    toml: Option<String>,
) -> Option<String> {
    let cli_or_env = cli_or_env.filter(|k| is_valid_key(k));
    let toml = toml.filter(|k| is_valid_key(k));

    if cli_or_env.is_some() && toml.is_some() {
        warn!(
            "{} found in multiple sources: command line/environment, TOML. Using command line/environment.",
            name
        );
    }

    if cli_or_env.is_some() {
        info!("{} loaded from command line/environment", name);
        return cli_or_env;
    }
    if toml.is_some() {
        info!("{} loaded from TOML config", name);
    }
    toml
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Load the TOML config file
///
/// An explicit path (argument, then `FFR_CONFIG`) must exist. Without one,
/// `<config dir>/ffr/config.toml` is read when present; otherwise defaults apply.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let explicit = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

    if let Some(path) = explicit {
        return read_toml_config(&path);
    }

    match default_config_path() {
        Some(path) if path.exists() => read_toml_config(&path),
        _ => {
            warn!("No config file found, using defaults");
            Ok(TomlConfig::default())
        }
    }
}

fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)?;
    info!("Config loaded from {}", path.display());
    Ok(config)
}

/// Platform config file location (`~/.config/ffr/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ffr").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with_token() -> CliOverrides {
        CliOverrides {
            airtable_token: Some("pat-123".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_airtable_token_is_fatal() {
        let err = Config::resolve(TomlConfig::default(), CliOverrides::default()).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("AIRTABLE_TOKEN")));
    }

    #[test]
    fn test_blank_token_counts_as_missing() {
        let cli = CliOverrides {
            airtable_token: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(Config::resolve(TomlConfig::default(), cli).is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve(TomlConfig::default(), cli_with_token()).unwrap();
        assert_eq!(config.channel_identifier, "INDECOMM");
        assert_eq!(config.record_table.view, DEFAULT_AIRTABLE_VIEW);
        assert_eq!(config.record_table.page_delay, Duration::from_millis(200));
        assert_eq!(config.loan_data.api_version, "_26_1");
        assert_eq!(config.documents.mailbox, DEFAULT_PARSEUR_MAILBOX);
        assert_eq!(config.output.template, PathBuf::from(DEFAULT_TEMPLATE));
        assert!(config.loan_data.api_key.is_none());
        assert_eq!(config.columns, ColumnMap::default());
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml: TomlConfig = toml::from_str(
            r#"
            [airtable]
            token = "toml-token"
            view = "toml-view"

            [output]
            template = "toml.xlsx"
            "#,
        )
        .unwrap();
        let cli = CliOverrides {
            airtable_token: Some("cli-token".to_string()),
            view: Some("cli-view".to_string()),
            ..Default::default()
        };

        let config = Config::resolve(toml, cli).unwrap();
        assert_eq!(config.record_table.token, "cli-token");
        assert_eq!(config.record_table.view, "cli-view");
        assert_eq!(config.output.template, PathBuf::from("toml.xlsx"));
    }

    #[test]
    fn test_toml_token_used_when_cli_missing() {
        let toml: TomlConfig = toml::from_str("[airtable]\ntoken = \"toml-token\"\n").unwrap();
        let config = Config::resolve(toml, CliOverrides::default()).unwrap();
        assert_eq!(config.record_table.token, "toml-token");
    }

    #[test]
    fn test_column_overrides() {
        let toml: TomlConfig =
            toml::from_str("[columns]\n\"Investor Name\" = 47\n").unwrap();
        let config = Config::resolve(toml, cli_with_token()).unwrap();
        assert_eq!(config.columns.column(Field::InvestorName), 47);
        assert_eq!(config.columns.column(Field::LoanNumber), 2);
    }

    #[test]
    fn test_unknown_column_label_rejected() {
        let toml: TomlConfig = toml::from_str("[columns]\n\"Bogus\" = 3\n").unwrap();
        assert!(matches!(
            Config::resolve(toml, cli_with_token()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_resolve_credential_priority() {
        assert_eq!(
            resolve_credential("k", Some("a".into()), Some("b".into())),
            Some("a".to_string())
        );
        assert_eq!(
            resolve_credential("k", Some("".into()), Some("b".into())),
            Some("b".to_string())
        );
        assert_eq!(resolve_credential("k", None, None), None);
    }
}
