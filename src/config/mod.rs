use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub fetch: FetchConfig,
    pub markers: MarkerConfig,
    pub resolver: ResolverConfig,
    pub storage: StorageConfig,
}

/// Bulk-retrieval configuration (disclosure index + PDF downloads)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    /// `{year}` placeholder is substituted at request time.
    #[serde(default = "default_index_url")]
    pub index_url: String,

    #[serde(default = "default_pdf_base_url")]
    pub pdf_base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Layout markers of the rendered transaction table. The format couples to
/// fixed sentinel strings; keeping them here makes format drift a
/// configuration change, not a code change.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarkerConfig {
    #[serde(default = "default_table_start")]
    pub table_start: String,

    #[serde(default = "default_trailer")]
    pub trailer: String,

    /// The line right after this sentinel names the filer's category
    /// abbreviation, which recurs as the row delimiter.
    #[serde(default = "default_category_sentinel")]
    pub category_sentinel: String,
}

/// Ticker/ISIN/price resolution services
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// `{ticker}` placeholder is substituted at request time.
    #[serde(default = "default_profile_url")]
    pub profile_url: String,

    #[serde(default = "default_chart_url")]
    pub chart_url: String,

    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_ledger_filename")]
    pub ledger_filename: String,

    /// Delete source PDFs that cannot be opened at all.
    #[serde(default)]
    pub delete_corrupt: bool,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_index_url() -> String {
    "https://disclosures-clerk.house.gov/public_disc/financial-pdfs/{year}FD.ZIP".to_string()
}
fn default_pdf_base_url() -> String {
    "https://disclosures-clerk.house.gov/public_disc/ptr-pdfs".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    1500
}
fn default_jitter_ms() -> u64 {
    500
}
fn default_max_retries() -> u32 {
    3
}
fn default_user_agent() -> String {
    "ptr-ledger/0.1 (research project; congressional trading analysis)".to_string()
}
fn default_table_start() -> String {
    "Owner".to_string()
}
fn default_trailer() -> String {
    "* For the complete list of asset type abbreviations, please visit \
     https://fd.house.gov/reference/asset-type-codes.aspx."
        .to_string()
}
fn default_category_sentinel() -> String {
    "ID".to_string()
}
fn default_search_url() -> String {
    "https://query2.finance.yahoo.com/v1/finance/search".to_string()
}
fn default_profile_url() -> String {
    "https://query2.finance.yahoo.com/v10/finance/quoteSummary/{ticker}?modules=summaryProfile"
        .to_string()
}
fn default_chart_url() -> String {
    "https://query1.finance.yahoo.com/v8/finance/chart".to_string()
}
fn default_cache_path() -> PathBuf {
    PathBuf::from("data/ticker_cache.json")
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data/filers")
}
fn default_ledger_filename() -> String {
    "current_position.json".to_string()
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("PTR").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());
        Ok(app_cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            markers: MarkerConfig::default(),
            resolver: ResolverConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            pdf_base_url: default_pdf_base_url(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            table_start: default_table_start(),
            trailer: default_trailer(),
            category_sentinel: default_category_sentinel(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            profile_url: default_profile_url(),
            chart_url: default_chart_url(),
            cache_path: default_cache_path(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            ledger_filename: default_ledger_filename(),
            delete_corrupt: false,
        }
    }
}
