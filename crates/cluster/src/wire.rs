//! Message types exchanged with shard leaders.
//!
//! Payloads that cross the node boundary (the placeholder group and the
//! per-shard result blob) travel as JSON bytes so the sub-search envelope
//! stays transport-agnostic. Decoding happens exactly once, in the result
//! decoder, and shape violations are surfaced as
//! [`VgateError::MalformedResult`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use vgate_common::{CollectionId, PartitionId, Result, SegmentId, Timestamp, VgateError};

/// Status codes recognized across the search path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    /// Operation succeeded.
    Success,
    /// Generic failure on the remote side.
    UnexpectedError,
    /// The contacted node no longer leads the addressed shard.
    NotShardLeader,
    /// The addressed collection does not exist.
    CollectionNotExists,
    /// The addressed collection is not fully loaded.
    CollectionNotLoaded,
}

/// Status envelope carried by collaborator responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    /// Machine-readable code.
    pub code: StatusCode,
    /// Optional human-readable reason.
    #[serde(default)]
    pub reason: String,
}

impl Status {
    /// Success status with an empty reason.
    pub fn success() -> Self {
        Self {
            code: StatusCode::Success,
            reason: String::new(),
        }
    }

    /// Failure status with a reason.
    pub fn error(code: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Returns whether the code is [`StatusCode::Success`].
    pub fn is_success(&self) -> bool {
        self.code == StatusCode::Success
    }
}

/// Similarity/distance metrics recognized by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricType {
    /// Euclidean distance (smaller is better).
    L2,
    /// Inner product (larger is better).
    Ip,
    /// Cosine similarity (larger is better).
    Cosine,
    /// Hamming distance over binary vectors (smaller is better).
    Hamming,
    /// Jaccard distance over binary vectors (smaller is better).
    Jaccard,
    /// Tanimoto distance over binary vectors (smaller is better).
    Tanimoto,
}

impl MetricType {
    /// Returns whether smaller raw values mean better matches.
    pub fn is_distance(self) -> bool {
        matches!(
            self,
            MetricType::L2 | MetricType::Hamming | MetricType::Jaccard | MetricType::Tanimoto
        )
    }
}

impl FromStr for MetricType {
    type Err = VgateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "L2" => Ok(MetricType::L2),
            "IP" => Ok(MetricType::Ip),
            "COSINE" => Ok(MetricType::Cosine),
            "HAMMING" => Ok(MetricType::Hamming),
            "JACCARD" => Ok(MetricType::Jaccard),
            "TANIMOTO" => Ok(MetricType::Tanimoto),
            other => Err(VgateError::Validation(format!(
                "unrecognized metric type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MetricType::L2 => "L2",
            MetricType::Ip => "IP",
            MetricType::Cosine => "COSINE",
            MetricType::Hamming => "HAMMING",
            MetricType::Jaccard => "JACCARD",
            MetricType::Tanimoto => "TANIMOTO",
        };
        f.write_str(s)
    }
}

/// One query vector inside a placeholder group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryVector {
    /// Dense float vector.
    Float(Vec<f32>),
    /// Packed binary vector.
    Binary(Vec<u8>),
}

/// The `nq` query vectors of one search request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceholderGroup {
    /// Query vectors in request order.
    pub vectors: Vec<QueryVector>,
}

impl PlaceholderGroup {
    /// Number of query vectors.
    pub fn nq(&self) -> usize {
        self.vectors.len()
    }

    /// Encode to the JSON byte payload carried by sub-search requests.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| VgateError::Unexpected(format!("encode placeholder group failed: {e}")))
    }

    /// Decode from the JSON byte payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| VgateError::MalformedResult(format!("placeholder group decode: {e}")))
    }
}

/// Homogeneous result-ID sequence; the variant is fixed per collection by
/// the primary-key type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdList {
    /// Integer primary keys.
    Int64(Vec<i64>),
    /// String primary keys.
    Str(Vec<String>),
}

/// Owned ID value used for cross-shard deduplication during merge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdKey {
    /// Integer primary key.
    Int64(i64),
    /// String primary key.
    Str(String),
}

impl IdList {
    /// Number of ids held.
    pub fn len(&self) -> usize {
        match self {
            IdList::Int64(v) => v.len(),
            IdList::Str(v) => v.len(),
        }
    }

    /// Returns whether no ids are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns whether `other` carries the same ID variant.
    pub fn same_variant(&self, other: &IdList) -> bool {
        matches!(
            (self, other),
            (IdList::Int64(_), IdList::Int64(_)) | (IdList::Str(_), IdList::Str(_))
        )
    }

    /// Empty list of the same variant.
    pub fn empty_like(&self) -> IdList {
        match self {
            IdList::Int64(_) => IdList::Int64(Vec::new()),
            IdList::Str(_) => IdList::Str(Vec::new()),
        }
    }

    /// Owned dedup key for position `i`.
    ///
    /// Panics if `i` is out of bounds; callers index through validated
    /// `topks` prefix sums.
    pub fn key_at(&self, i: usize) -> IdKey {
        match self {
            IdList::Int64(v) => IdKey::Int64(v[i]),
            IdList::Str(v) => IdKey::Str(v[i].clone()),
        }
    }

    /// Append position `i` of `src` onto `self`.
    pub fn append_from(&mut self, src: &IdList, i: usize) -> Result<()> {
        match (self, src) {
            (IdList::Int64(dst), IdList::Int64(s)) => {
                dst.push(s[i]);
                Ok(())
            }
            (IdList::Str(dst), IdList::Str(s)) => {
                dst.push(s[i].clone());
                Ok(())
            }
            _ => Err(VgateError::MalformedResult(
                "mixed int64/string result ids across partials".to_string(),
            )),
        }
    }
}

/// Column payload of one output field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarColumn {
    /// Boolean values.
    Bool(Vec<bool>),
    /// 32-bit integer values.
    Int32(Vec<i32>),
    /// 64-bit integer values.
    Int64(Vec<i64>),
    /// 32-bit float values.
    Float(Vec<f32>),
    /// 64-bit float values.
    Double(Vec<f64>),
    /// String values.
    VarChar(Vec<String>),
}

impl ScalarColumn {
    /// Number of rows held.
    pub fn rows(&self) -> usize {
        match self {
            ScalarColumn::Bool(v) => v.len(),
            ScalarColumn::Int32(v) => v.len(),
            ScalarColumn::Int64(v) => v.len(),
            ScalarColumn::Float(v) => v.len(),
            ScalarColumn::Double(v) => v.len(),
            ScalarColumn::VarChar(v) => v.len(),
        }
    }

    /// Empty column of the same variant.
    pub fn empty_like(&self) -> ScalarColumn {
        match self {
            ScalarColumn::Bool(_) => ScalarColumn::Bool(Vec::new()),
            ScalarColumn::Int32(_) => ScalarColumn::Int32(Vec::new()),
            ScalarColumn::Int64(_) => ScalarColumn::Int64(Vec::new()),
            ScalarColumn::Float(_) => ScalarColumn::Float(Vec::new()),
            ScalarColumn::Double(_) => ScalarColumn::Double(Vec::new()),
            ScalarColumn::VarChar(_) => ScalarColumn::VarChar(Vec::new()),
        }
    }

    /// Append row `i` of `src` onto `self`.
    pub fn append_from(&mut self, src: &ScalarColumn, i: usize) -> Result<()> {
        match (self, src) {
            (ScalarColumn::Bool(dst), ScalarColumn::Bool(s)) => dst.push(s[i]),
            (ScalarColumn::Int32(dst), ScalarColumn::Int32(s)) => dst.push(s[i]),
            (ScalarColumn::Int64(dst), ScalarColumn::Int64(s)) => dst.push(s[i]),
            (ScalarColumn::Float(dst), ScalarColumn::Float(s)) => dst.push(s[i]),
            (ScalarColumn::Double(dst), ScalarColumn::Double(s)) => dst.push(s[i]),
            (ScalarColumn::VarChar(dst), ScalarColumn::VarChar(s)) => dst.push(s[i].clone()),
            _ => {
                return Err(VgateError::MalformedResult(
                    "mismatched output-field column types across partials".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// One output-field column of a result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldColumn {
    /// Stable field id from the collection schema.
    pub field_id: i64,
    /// Field name.
    pub field_name: String,
    /// Row values; row count equals the owning result's total row count.
    pub values: ScalarColumn,
}

/// Flat top-K result set for `num_queries` query vectors.
///
/// Layout: the `ids`/`scores` arrays are packed per-query blocks whose start
/// offsets are the prefix sums of `topks`; `topks[q]` is the valid row count
/// for query `q` and consumers never read past it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultData {
    /// Number of query vectors this set answers.
    pub num_queries: usize,
    /// Per-query result capacity the producer was asked for.
    pub top_k: usize,
    /// Matched ids, all queries concatenated.
    pub ids: IdList,
    /// Match scores, parallel to `ids`.
    pub scores: Vec<f32>,
    /// Actual per-query result counts.
    pub topks: Vec<usize>,
    /// Output-field columns, parallel to `ids`.
    #[serde(default)]
    pub fields: Vec<FieldColumn>,
}

impl ResultData {
    /// Total row count across all queries.
    pub fn total_rows(&self) -> usize {
        self.topks.iter().sum()
    }

    /// Encode to the JSON blob carried by [`SubSearchResponse::payload`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| VgateError::Unexpected(format!("encode result data failed: {e}")))
    }
}

/// Sub-search request sent to one shard leader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubSearchRequest {
    /// Target collection.
    pub collection_id: CollectionId,
    /// Target partitions; empty means every loaded partition.
    pub partition_ids: Vec<PartitionId>,
    /// Shard channels owned by the addressed leader.
    pub channels: Vec<String>,
    /// Number of query vectors.
    pub nq: usize,
    /// Per-query result capacity requested from the shard; includes the
    /// pagination headroom (`offset` rows beyond the user limit).
    pub top_k: usize,
    /// Metric governing result ordering.
    pub metric_type: MetricType,
    /// Vector field being searched.
    pub anns_field: String,
    /// Opaque filter expression.
    pub expr: String,
    /// Encoded [`PlaceholderGroup`].
    pub placeholder_group: Vec<u8>,
    /// Schema field ids to return as output columns.
    pub output_field_ids: Vec<i64>,
    /// Opaque algorithm parameters (JSON object).
    pub search_params: serde_json::Value,
    /// Point-in-time read timestamp; zero means latest.
    pub travel_timestamp: Timestamp,
    /// Lower bound on data visibility required by the caller.
    pub guarantee_timestamp: Timestamp,
    /// Absolute deadline; zero means none.
    pub timeout_timestamp: Timestamp,
}

/// Partial top-K answer computed by one shard leader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubSearchResponse {
    /// Shard-side status; anything but success gates the merge.
    pub status: Status,
    /// Metric the shard ordered by.
    pub metric_type: MetricType,
    /// Declared number of queries answered.
    pub num_queries: usize,
    /// Declared per-query capacity.
    pub top_k: usize,
    /// Sealed segments consulted, for diagnostics.
    #[serde(default)]
    pub sealed_segment_ids: Vec<SegmentId>,
    /// Encoded [`ResultData`]; empty when the shard had no matches.
    #[serde(default)]
    pub payload: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_type_parses_recognized_symbols() {
        assert_eq!("L2".parse::<MetricType>().unwrap(), MetricType::L2);
        assert_eq!("ip".parse::<MetricType>().unwrap(), MetricType::Ip);
        assert_eq!("COSINE".parse::<MetricType>().unwrap(), MetricType::Cosine);
        assert!("EUCLID".parse::<MetricType>().is_err());
    }

    #[test]
    fn distance_metrics_are_classified() {
        assert!(MetricType::L2.is_distance());
        assert!(MetricType::Hamming.is_distance());
        assert!(MetricType::Jaccard.is_distance());
        assert!(MetricType::Tanimoto.is_distance());
        assert!(!MetricType::Ip.is_distance());
        assert!(!MetricType::Cosine.is_distance());
    }

    #[test]
    fn placeholder_group_roundtrips_through_bytes() {
        let group = PlaceholderGroup {
            vectors: vec![
                QueryVector::Float(vec![0.5, 0.25]),
                QueryVector::Binary(vec![0b1010_0001]),
            ],
        };
        let bytes = group.to_bytes().unwrap();
        assert_eq!(PlaceholderGroup::from_bytes(&bytes).unwrap(), group);
        assert_eq!(group.nq(), 2);
    }

    #[test]
    fn id_list_append_rejects_variant_mismatch() {
        let mut ids = IdList::Int64(vec![1]);
        let other = IdList::Str(vec!["a".to_string()]);
        assert!(ids.append_from(&other, 0).is_err());
        assert!(!ids.same_variant(&other));
    }

    #[test]
    fn scalar_column_gathers_rows_across_sources() {
        let src = ScalarColumn::VarChar(vec!["x".to_string(), "y".to_string()]);
        let mut dst = src.empty_like();
        dst.append_from(&src, 1).unwrap();
        dst.append_from(&src, 0).unwrap();
        assert_eq!(
            dst,
            ScalarColumn::VarChar(vec!["y".to_string(), "x".to_string()])
        );
    }
}
