//! User-facing search request and response surface.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use vgate_cluster::wire::{PlaceholderGroup, ResultData, Status};
use vgate_common::Timestamp;

/// Parameter key naming the vector field to search.
pub const ANNS_FIELD_KEY: &str = "anns_field";
/// Parameter key for the per-query result limit.
pub const TOP_K_KEY: &str = "topk";
/// Parameter key for the pagination offset.
pub const OFFSET_KEY: &str = "offset";
/// Parameter key for the metric symbol.
pub const METRIC_TYPE_KEY: &str = "metric_type";
/// Parameter key for score rounding.
pub const ROUND_DECIMAL_KEY: &str = "round_decimal";
/// Parameter key for opaque algorithm parameters (JSON object).
pub const SEARCH_PARAMS_KEY: &str = "params";

/// One opaque request parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValuePair {
    /// Parameter key.
    pub key: String,
    /// Parameter value, unparsed.
    pub value: String,
}

impl KeyValuePair {
    /// Convenience constructor.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One user-issued search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Target collection name.
    pub collection_name: String,
    /// Target partition names; empty means every loaded partition.
    #[serde(default)]
    pub partition_names: Vec<String>,
    /// Opaque filter expression passed through to shards.
    #[serde(default)]
    pub expr: String,
    /// Fields to return alongside ids and scores. `*` expands to all scalar
    /// fields, `%` to all fields.
    #[serde(default)]
    pub output_fields: Vec<String>,
    /// Search parameters; recognized keys are the `*_KEY` constants.
    pub search_params: Vec<KeyValuePair>,
    /// The `nq` query vectors.
    pub placeholder_group: PlaceholderGroup,
    /// Point-in-time read timestamp; zero means latest.
    #[serde(default)]
    pub travel_timestamp: Timestamp,
    /// Lower bound on data visibility; zero defers to the gateway.
    #[serde(default)]
    pub guarantee_timestamp: Timestamp,
    /// Optional per-request timeout.
    #[serde(default)]
    pub timeout: Option<Duration>,
}

impl SearchRequest {
    /// First value registered for `key`, if any.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.search_params
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.as_str())
    }
}

/// Final merged answer returned to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    /// Overall status; a successful empty answer still carries success.
    pub status: Status,
    /// Merged `(nq × limit)` result set.
    pub results: ResultData,
}
