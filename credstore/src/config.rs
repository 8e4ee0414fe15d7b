use serde::Deserialize;

/// Where stored credential records come from.
///
/// The store is owned by an external system; this crate only reads it.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Fixed table loaded from configuration. Intended for small
    /// deployments and tests.
    Static { records: Vec<StaticRecord> },
    /// Remote credential service queried over HTTP per lookup.
    Http { url: String },
}

/// One credential record in a static table.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StaticRecord {
    pub location_id: String,
    pub api_key: String,
    pub username: String,
    pub password: String,
}
