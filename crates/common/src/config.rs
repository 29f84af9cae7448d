use serde::{Deserialize, Serialize};

/// Gateway-wide request bounds shared by the validator and the task driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Maximum per-query top-K; `offset + topk` is bounded by the same value.
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    /// Maximum number of query vectors accepted in one request.
    #[serde(default = "default_max_nq")]
    pub max_nq: usize,
    /// Maximum collection/partition identifier length.
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
    /// Whether `%` output-field expansion (or an explicit name) may select a
    /// vector field. Off by default: vector columns dominate response size.
    #[serde(default)]
    pub allow_vector_output_fields: bool,
}

fn default_max_top_k() -> usize {
    16384
}

fn default_max_nq() -> usize {
    16384
}

fn default_max_name_length() -> usize {
    255
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_top_k: default_max_top_k(),
            max_nq: default_max_nq(),
            max_name_length: default_max_name_length(),
            allow_vector_output_fields: false,
        }
    }
}
