// Keys of the persisted client state. Values are JSON documents.
pub const TRIALS_CACHE: &str = "trials_cache";
pub const TRIALS_CACHE_TIMESTAMP: &str = "trials_cache_timestamp";
pub const COLUMN_SETTINGS: &str = "trialColumnSettings";
pub const FAVORITE_TRIALS: &str = "favoriteTrials";
pub const SAVED_QUERIES: &str = "unifiedSavedQueries";
pub const DRUG_NAMES: &str = "drugNames";
