pub mod audit;
pub mod config;
pub mod costs;
pub mod notify;
pub mod provider;
pub mod refresh;
pub mod requote;
pub mod store;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use costs::{extract_costs, CostBreakdown};
pub use refresh::{needs_manual, variance_pct, PriceRefresher, RefreshReport, MANUAL_THRESHOLD_PCT};
pub use requote::{LogParser, ProgressEvent, RequoteSupervisor, RunSummary};
