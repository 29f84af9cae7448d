//! Partial-result decoding and shape gating.

use tracing::debug;
use vgate_cluster::wire::{ResultData, SubSearchResponse};
use vgate_common::{Result, VgateError};

/// Decode one partial result blob and verify its shape against the declared
/// `(nq, topK)`.
///
/// An empty payload is a legitimate "no matches on this shard" answer and
/// decodes to `None`. Any structural violation is protocol drift and fails
/// the whole request.
pub fn decode_partial_result(resp: &SubSearchResponse) -> Result<Option<ResultData>> {
    if resp.payload.is_empty() {
        debug!(
            nq = resp.num_queries,
            operator = "SearchDecode",
            "empty partial result dropped"
        );
        return Ok(None);
    }

    let data: ResultData = serde_json::from_slice(&resp.payload)
        .map_err(|e| VgateError::MalformedResult(format!("result blob decode: {e}")))?;

    if data.num_queries != resp.num_queries {
        return Err(VgateError::MalformedResult(format!(
            "blob answers {} queries, envelope declares {}",
            data.num_queries, resp.num_queries
        )));
    }
    if data.top_k != resp.top_k {
        return Err(VgateError::MalformedResult(format!(
            "blob top_k {} does not match declared {}",
            data.top_k, resp.top_k
        )));
    }
    if data.topks.len() != data.num_queries {
        return Err(VgateError::MalformedResult(format!(
            "topks holds {} entries for {} queries",
            data.topks.len(),
            data.num_queries
        )));
    }
    if let Some(bad) = data.topks.iter().find(|t| **t > data.top_k) {
        return Err(VgateError::MalformedResult(format!(
            "per-query count {bad} exceeds top_k {}",
            data.top_k
        )));
    }

    let rows = data.total_rows();
    if rows > data.num_queries * data.top_k {
        return Err(VgateError::MalformedResult(format!(
            "total rows {rows} exceed nq*top_k {}",
            data.num_queries * data.top_k
        )));
    }
    if data.ids.len() != rows {
        return Err(VgateError::MalformedResult(format!(
            "ids hold {} entries for {rows} rows",
            data.ids.len()
        )));
    }
    if data.scores.len() != rows {
        return Err(VgateError::MalformedResult(format!(
            "scores hold {} entries for {rows} rows",
            data.scores.len()
        )));
    }
    for field in &data.fields {
        if field.values.rows() != rows {
            return Err(VgateError::MalformedResult(format!(
                "output field '{}' holds {} rows, result holds {rows}",
                field.field_name,
                field.values.rows()
            )));
        }
    }

    Ok(Some(data))
}
