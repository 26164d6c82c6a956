/// Shared constants for provider access and fact tables.

/// Base URL of the FRED observations API. Overridable per client for tests.
pub const FRED_BASE_URL: &str = "https://api.stlouisfed.org/fred";

/// Environment variable holding the FRED API key.
pub const FRED_API_KEY_VAR: &str = "FRED_API_KEY";

/// Sentinel start date used when no explicit range is given; FRED has no
/// observations earlier than the 1800s, so this captures full history.
pub const HISTORY_START: &str = "1800-01-01";

/// Realtime bounds that make the observations endpoint return every vintage.
pub const REALTIME_ALL_START: &str = "1776-07-04";
pub const REALTIME_ALL_END: &str = "9999-12-31";

/// Fact tables known to the default catalog.
pub const ECONOMIC_INDICATORS_TABLE: &str = "economic_indicators";
pub const TREASURY_YIELDS_TABLE: &str = "treasury_yields";
pub const MARKET_DATA_TABLE: &str = "market_data";

/// Value FRED uses to mark a missing observation.
pub const MISSING_VALUE_MARKER: &str = ".";
