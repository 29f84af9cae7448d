//! Metric-aware k-way merge of per-shard partial results.
//!
//! The merge always selects by maximum wire score; shards deliver each
//! per-query block best-first in that orientation. For distance-like metrics
//! the user-visible scores are emitted sign-flipped, which keeps one merge
//! implementation serving every metric. Rounding applies to the final
//! user-visible value.

use std::collections::HashSet;

use tracing::debug;
use vgate_cluster::wire::{FieldColumn, IdList, MetricType, ResultData};
use vgate_common::{Result, VgateError};

/// Merge parameters fixed by the normalized query.
#[derive(Debug, Clone)]
pub struct MergeParams {
    /// Number of query vectors.
    pub nq: usize,
    /// User-facing per-query result limit.
    pub limit: usize,
    /// Rows to skip per query before keeping `limit` rows.
    pub offset: usize,
    /// Metric governing score orientation.
    pub metric_type: MetricType,
    /// Final-score rounding; `-1` disables.
    pub round_decimal: i32,
}

/// Merge decoded partial results into one `(nq × limit)` answer.
///
/// Deterministic for a fixed input set: the best remaining row wins each
/// output slot, ties go to the smaller partial index, and duplicate ids seen
/// through a worse-or-equal row are dropped.
pub fn reduce_search_results(partials: &[ResultData], params: &MergeParams) -> Result<ResultData> {
    let Some(template) = partials.first() else {
        return Ok(empty_result(params));
    };
    for partial in &partials[1..] {
        if !partial.ids.same_variant(&template.ids) {
            return Err(VgateError::MalformedResult(
                "mixed int64/string result ids across partials".to_string(),
            ));
        }
        if partial.fields.len() != template.fields.len()
            || partial
                .fields
                .iter()
                .zip(&template.fields)
                .any(|(a, b)| a.field_id != b.field_id)
        {
            return Err(VgateError::MalformedResult(
                "output-field layout differs across partials".to_string(),
            ));
        }
    }

    // Block starts per partial: prefix sums of its per-query counts.
    let starts: Vec<Vec<usize>> = partials
        .iter()
        .map(|p| {
            let mut acc = 0;
            let mut v = Vec::with_capacity(p.topks.len());
            for t in &p.topks {
                v.push(acc);
                acc += t;
            }
            v
        })
        .collect();

    let mut ids = template.ids.empty_like();
    let mut scores = Vec::new();
    let mut topks = Vec::with_capacity(params.nq);
    let mut provenance: Vec<(usize, usize)> = Vec::new();
    let mut dropped_duplicates = 0usize;
    let budget = params.offset + params.limit;

    for q in 0..params.nq {
        let mut cursors = vec![0usize; partials.len()];
        let mut emitted: Vec<(usize, usize)> = Vec::new();
        let mut seen = HashSet::new();

        while emitted.len() < budget {
            let mut best: Option<(usize, usize, f32)> = None;
            for (p, partial) in partials.iter().enumerate() {
                let block_len = partial.topks.get(q).copied().unwrap_or(0);
                if cursors[p] >= block_len {
                    continue;
                }
                let flat = starts[p][q] + cursors[p];
                let score = partial.scores[flat];
                if best.map_or(true, |(_, _, s)| score > s) {
                    best = Some((p, flat, score));
                }
            }
            let Some((p, flat, _)) = best else {
                break;
            };
            cursors[p] += 1;
            if !seen.insert(partials[p].ids.key_at(flat)) {
                dropped_duplicates += 1;
                continue;
            }
            emitted.push((p, flat));
        }

        let kept = &emitted[params.offset.min(emitted.len())..];
        topks.push(kept.len());
        for &(p, flat) in kept {
            ids.append_from(&partials[p].ids, flat)?;
            let mut score = partials[p].scores[flat];
            if params.metric_type.is_distance() {
                score = -score;
            }
            scores.push(round_score(score, params.round_decimal));
            provenance.push((p, flat));
        }
    }

    if dropped_duplicates > 0 {
        debug!(
            dropped_duplicates,
            operator = "SearchReduce",
            "cross-shard duplicate ids dropped"
        );
    }

    let fields = gather_fields(partials, template, &provenance)?;
    Ok(ResultData {
        num_queries: params.nq,
        top_k: params.limit,
        ids,
        scores,
        topks,
        fields,
    })
}

fn empty_result(params: &MergeParams) -> ResultData {
    ResultData {
        num_queries: params.nq,
        top_k: params.limit,
        ids: IdList::Int64(Vec::new()),
        scores: Vec::new(),
        topks: vec![0; params.nq],
        fields: Vec::new(),
    }
}

fn gather_fields(
    partials: &[ResultData],
    template: &ResultData,
    provenance: &[(usize, usize)],
) -> Result<Vec<FieldColumn>> {
    let mut out = Vec::with_capacity(template.fields.len());
    for (f, field) in template.fields.iter().enumerate() {
        let mut values = field.values.empty_like();
        for &(p, flat) in provenance {
            values.append_from(&partials[p].fields[f].values, flat)?;
        }
        out.push(FieldColumn {
            field_id: field.field_id,
            field_name: field.field_name.clone(),
            values,
        });
    }
    Ok(out)
}

fn round_score(score: f32, round_decimal: i32) -> f32 {
    if round_decimal < 0 {
        return score;
    }
    let factor = 10f32.powi(round_decimal);
    (score * factor).round() / factor
}

#[cfg(test)]
#[path = "reduce_tests.rs"]
mod tests;
