// Environment variables are read with this prefix, e.g. SWAPCALC_PRICE_API_KEY
pub const ENVIRONMENT_PREFIX: &str = "SWAPCALC_";

// Watch defaults
pub const DEFAULT_WATCH_UPDATES: usize = 0; // unlimited
