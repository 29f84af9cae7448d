//! Request validation and normalization.
//!
//! Turns one user-issued [`SearchRequest`] into an immutable
//! [`NormalizedQuery`] exactly once, before any shard RPC. Check order
//! matters and is fixed: name grammar, collection resolution, vector-field
//! resolution, output-field resolution, parameter bounds, deadline.

use tracing::debug;
use vgate_cluster::meta::MetadataCache;
use vgate_cluster::schema::CollectionSchema;
use vgate_cluster::wire::{MetricType, PlaceholderGroup};
use vgate_common::{timestamp, CollectionId, GatewayConfig, PartitionId, Result, Timestamp, VgateError};

use crate::request::{
    SearchRequest, ANNS_FIELD_KEY, METRIC_TYPE_KEY, OFFSET_KEY, ROUND_DECIMAL_KEY,
    SEARCH_PARAMS_KEY, TOP_K_KEY,
};

/// Immutable normalized form of one search request.
///
/// Built exactly once at validation; every later stage reads it without
/// mutation.
#[derive(Debug, Clone)]
pub struct NormalizedQuery {
    /// Collection name, kept for logging and metrics labels.
    pub collection_name: String,
    /// Resolved collection id.
    pub collection_id: CollectionId,
    /// Resolved partition ids; empty means every loaded partition.
    pub partition_ids: Vec<PartitionId>,
    /// Number of query vectors.
    pub nq: usize,
    /// User-facing per-query result limit.
    pub top_k: usize,
    /// Pagination offset.
    pub offset: usize,
    /// Metric governing result ordering.
    pub metric_type: MetricType,
    /// Final-score rounding; `-1` disables.
    pub round_decimal: i32,
    /// Vector field being searched.
    pub anns_field: String,
    /// Resolved output-field names, deduplicated, in request order.
    pub output_fields: Vec<String>,
    /// Schema field ids matching `output_fields`.
    pub output_field_ids: Vec<i64>,
    /// Opaque algorithm parameters (JSON object).
    pub search_params: serde_json::Value,
    /// Opaque filter expression.
    pub expr: String,
    /// The query vectors.
    pub placeholder_group: PlaceholderGroup,
    /// Point-in-time read timestamp; zero means latest.
    pub travel_timestamp: Timestamp,
    /// Data-visibility lower bound, defaulted to the current reading.
    pub guarantee_timestamp: Timestamp,
    /// Absolute deadline derived from the caller timeout; zero means none.
    pub timeout_timestamp: Timestamp,
}

impl NormalizedQuery {
    /// Per-query capacity requested from shards: the user limit plus the
    /// pagination rows trimmed again at merge time.
    pub fn shard_top_k(&self) -> usize {
        self.top_k + self.offset
    }
}

/// Validate a request against cached metadata and produce its normalized
/// form. No shard RPC is issued on any failure path.
pub async fn validate(
    request: &SearchRequest,
    cache: &MetadataCache,
    config: &GatewayConfig,
) -> Result<NormalizedQuery> {
    validate_identifier("collection name", &request.collection_name, config)?;
    for partition in &request.partition_names {
        validate_identifier("partition name", partition, config)?;
    }

    let info = cache.get_collection_info(&request.collection_name).await?;
    let partition_ids = cache
        .get_partition_ids(&request.collection_name, &request.partition_names)
        .await?;

    let schema = &info.schema;
    if !schema.has_vector_field() {
        return Err(VgateError::Validation(format!(
            "collection '{}' has no vector field",
            request.collection_name
        )));
    }
    let anns_field = request
        .param(ANNS_FIELD_KEY)
        .ok_or_else(|| {
            VgateError::Validation(format!("search parameter '{ANNS_FIELD_KEY}' is required"))
        })?
        .to_string();
    match schema.field(&anns_field) {
        None => {
            return Err(VgateError::Validation(format!(
                "vector field '{anns_field}' not found in schema"
            )));
        }
        Some(field) if !field.data_type.is_vector() => {
            return Err(VgateError::Validation(format!(
                "field '{anns_field}' is not a vector field"
            )));
        }
        Some(_) => {}
    }

    let (output_fields, output_field_ids) =
        resolve_output_fields(&request.output_fields, schema, config)?;

    let top_k = parse_int_param(request, TOP_K_KEY, None)?;
    if top_k < 1 || top_k as usize > config.max_top_k {
        return Err(VgateError::Validation(format!(
            "{TOP_K_KEY} must be in [1, {}], got {top_k}",
            config.max_top_k
        )));
    }
    let offset = parse_int_param(request, OFFSET_KEY, Some(0))?;
    if offset < 0 {
        return Err(VgateError::Validation(format!(
            "{OFFSET_KEY} must be non-negative, got {offset}"
        )));
    }
    if (top_k + offset) as usize > config.max_top_k {
        return Err(VgateError::Validation(format!(
            "{OFFSET_KEY} + {TOP_K_KEY} must not exceed {}, got {}",
            config.max_top_k,
            top_k + offset
        )));
    }
    let metric_type: MetricType = request
        .param(METRIC_TYPE_KEY)
        .ok_or_else(|| {
            VgateError::Validation(format!("search parameter '{METRIC_TYPE_KEY}' is required"))
        })?
        .parse()?;
    let round_decimal = parse_int_param(request, ROUND_DECIMAL_KEY, Some(-1))?;
    if !(-1..=6).contains(&round_decimal) {
        return Err(VgateError::Validation(format!(
            "{ROUND_DECIMAL_KEY} must be in [-1, 6], got {round_decimal}"
        )));
    }
    let search_params = match request.param(SEARCH_PARAMS_KEY) {
        None => serde_json::json!({}),
        Some(raw) => {
            let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
                VgateError::Validation(format!("{SEARCH_PARAMS_KEY} is not valid JSON: {e}"))
            })?;
            if !value.is_object() {
                return Err(VgateError::Validation(format!(
                    "{SEARCH_PARAMS_KEY} must be a JSON object"
                )));
            }
            value
        }
    };

    let nq = request.placeholder_group.nq();
    if nq == 0 {
        return Err(VgateError::Validation(
            "placeholder group holds no query vectors".to_string(),
        ));
    }
    if nq > config.max_nq {
        return Err(VgateError::Validation(format!(
            "nq must not exceed {}, got {nq}",
            config.max_nq
        )));
    }

    let now = timestamp::now();
    if request.travel_timestamp > 0 && request.travel_timestamp > now {
        return Err(VgateError::Validation(
            "travel timestamp is ahead of the current clock".to_string(),
        ));
    }
    let guarantee_timestamp = if request.guarantee_timestamp == 0 {
        now
    } else {
        request.guarantee_timestamp
    };
    let timeout_timestamp = request
        .timeout
        .map(timestamp::deadline_after)
        .unwrap_or(timestamp::ZERO_TIMESTAMP);

    debug!(
        collection = %request.collection_name,
        collection_id = %info.collection_id,
        nq,
        top_k,
        offset,
        metric = %metric_type,
        output_fields = output_fields.len(),
        operator = "SearchValidate",
        "search request normalized"
    );

    Ok(NormalizedQuery {
        collection_name: request.collection_name.clone(),
        collection_id: info.collection_id,
        partition_ids,
        nq,
        top_k: top_k as usize,
        offset: offset as usize,
        metric_type,
        round_decimal: round_decimal as i32,
        anns_field,
        output_fields,
        output_field_ids,
        search_params,
        expr: request.expr.clone(),
        placeholder_group: request.placeholder_group.clone(),
        travel_timestamp: request.travel_timestamp,
        guarantee_timestamp,
        timeout_timestamp,
    })
}

fn validate_identifier(kind: &str, name: &str, config: &GatewayConfig) -> Result<()> {
    if name.is_empty() {
        return Err(VgateError::Validation(format!("{kind} must not be empty")));
    }
    if name.len() > config.max_name_length {
        return Err(VgateError::Validation(format!(
            "{kind} '{name}' exceeds {} characters",
            config.max_name_length
        )));
    }
    let mut chars = name.chars();
    let first = chars.next().expect("non-empty name");
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(VgateError::Validation(format!(
            "{kind} '{name}' must start with a letter or underscore"
        )));
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(VgateError::Validation(format!(
            "{kind} '{name}' contains invalid character '{bad}'"
        )));
    }
    Ok(())
}

fn resolve_output_fields(
    requested: &[String],
    schema: &CollectionSchema,
    config: &GatewayConfig,
) -> Result<(Vec<String>, Vec<i64>)> {
    let mut names = Vec::new();
    let mut ids = Vec::new();
    let mut push = |name: &str, field_id: i64| {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
            ids.push(field_id);
        }
    };

    for requested_name in requested {
        match requested_name.as_str() {
            "*" => {
                for field in schema.scalar_fields() {
                    push(&field.name, field.field_id);
                }
            }
            "%" => {
                for field in &schema.fields {
                    if field.data_type.is_vector() && !config.allow_vector_output_fields {
                        return Err(VgateError::Validation(format!(
                            "output field '{}' is a vector field",
                            field.name
                        )));
                    }
                    push(&field.name, field.field_id);
                }
            }
            name => {
                let field = schema.field(name).ok_or_else(|| {
                    VgateError::Validation(format!("output field '{name}' not found in schema"))
                })?;
                if field.data_type.is_vector() && !config.allow_vector_output_fields {
                    return Err(VgateError::Validation(format!(
                        "output field '{name}' is a vector field"
                    )));
                }
                push(&field.name, field.field_id);
            }
        }
    }
    Ok((names, ids))
}

fn parse_int_param(request: &SearchRequest, key: &str, default: Option<i64>) -> Result<i64> {
    match request.param(key) {
        None => default.ok_or_else(|| {
            VgateError::Validation(format!("search parameter '{key}' is required"))
        }),
        Some(raw) => raw.parse::<i64>().map_err(|_| {
            VgateError::Validation(format!("search parameter '{key}' is not an integer: '{raw}'"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GatewayConfig {
        GatewayConfig::default()
    }

    #[test]
    fn identifier_grammar_accepts_word_names() {
        let cfg = config();
        assert!(validate_identifier("collection name", "docs_v2", &cfg).is_ok());
        assert!(validate_identifier("collection name", "_hidden", &cfg).is_ok());
    }

    #[test]
    fn identifier_grammar_rejects_bad_names() {
        let cfg = config();
        for name in ["", "$", "0abc", "has space", "emoji✨"] {
            assert!(
                validate_identifier("collection name", name, &cfg).is_err(),
                "expected rejection for {name:?}"
            );
        }
    }

    #[test]
    fn identifier_grammar_enforces_max_length() {
        let cfg = config();
        let long = "a".repeat(cfg.max_name_length + 1);
        assert!(validate_identifier("collection name", &long, &cfg).is_err());
        let at_limit = "a".repeat(cfg.max_name_length);
        assert!(validate_identifier("collection name", &at_limit, &cfg).is_ok());
    }

    #[test]
    fn output_field_expansion_skips_vectors_for_star() {
        use vgate_cluster::schema::{DataType, FieldSchema};
        let schema = CollectionSchema {
            name: "docs".to_string(),
            description: String::new(),
            fields: vec![
                FieldSchema {
                    field_id: 100,
                    name: "id".to_string(),
                    data_type: DataType::Int64,
                    is_primary_key: true,
                    dim: None,
                },
                FieldSchema {
                    field_id: 101,
                    name: "embedding".to_string(),
                    data_type: DataType::FloatVector,
                    is_primary_key: false,
                    dim: Some(4),
                },
            ],
        };
        let cfg = config();

        let (names, ids) = resolve_output_fields(&["*".to_string()], &schema, &cfg).unwrap();
        assert_eq!(names, vec!["id".to_string()]);
        assert_eq!(ids, vec![100]);

        // `%` names the vector field explicitly, so the default config rejects it.
        assert!(resolve_output_fields(&["%".to_string()], &schema, &cfg).is_err());

        let mut permissive = config();
        permissive.allow_vector_output_fields = true;
        let (names, _) = resolve_output_fields(&["%".to_string()], &schema, &permissive).unwrap();
        assert_eq!(names, vec!["id".to_string(), "embedding".to_string()]);
    }
}
