use thiserror::Error;

/// Canonical vectorgate error taxonomy used across crates.
///
/// Classification guidance:
/// - [`VgateError::Validation`]: request shape/name/bound issues discovered before any RPC
/// - [`VgateError::CollectionNotExists`] / [`VgateError::CollectionNotLoaded`]: terminal
///   answers from the metadata cache or cluster coordinator
/// - [`VgateError::InvalidShardLeaders`]: stale leader view; recoverable by exactly one
///   refresh-and-redispatch in the task driver
/// - [`VgateError::InsufficientShardLeaders`]: a shard has no live leader at all
/// - [`VgateError::Transport`] / [`VgateError::Unexpected`]: sub-search RPC failures;
///   the whole request fails and partial results are never merged
/// - [`VgateError::MalformedResult`]: a shard answered with a blob whose shape
///   contradicts its declared `(nq, topK)`; indicates protocol drift
#[derive(Debug, Error)]
pub enum VgateError {
    /// Invalid search request rejected before any RPC was issued.
    ///
    /// Examples:
    /// - collection/partition name outside the identifier grammar
    /// - `topk`/`offset`/`round_decimal` outside configured bounds
    /// - output field missing from the schema, or naming a vector field
    #[error("invalid search request: {0}")]
    Validation(String),

    /// The named collection is unknown to the metadata service.
    #[error("collection not exists: {0}")]
    CollectionNotExists(String),

    /// The collection (or one of its requested partitions) is not fully loaded.
    #[error("collection not loaded: {0}")]
    CollectionNotLoaded(String),

    /// At least one shard has no live leader to serve reads.
    #[error("insufficient shard leaders: {0}")]
    InsufficientShardLeaders(String),

    /// A shard leader rejected the sub-search because leadership moved.
    ///
    /// The only recoverable classification: the task driver deprecates the
    /// cached shard-leader map and re-enters dispatch once. A second
    /// occurrence is surfaced to the caller as terminal.
    #[error("invalid shard leaders: {0}")]
    InvalidShardLeaders(String),

    /// A partial result's payload contradicts its declared shape.
    #[error("malformed partial result: {0}")]
    MalformedResult(String),

    /// Raw RPC/connection failure talking to a collaborator.
    #[error("transport error: {0}")]
    Transport(String),

    /// A collaborator answered with an unexpected-error status.
    #[error("unexpected error: {0}")]
    Unexpected(String),

    /// The caller's deadline expired before the request completed.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The request was canceled before completion.
    #[error("canceled: {0}")]
    Canceled(String),
}

impl VgateError {
    /// Returns whether this error is the stale-shard-leader classification
    /// that permits the single dispatch retry.
    pub fn is_stale_shard_leaders(&self) -> bool {
        matches!(self, VgateError::InvalidShardLeaders(_))
    }
}

/// Standard vectorgate result alias.
pub type Result<T> = std::result::Result<T, VgateError>;
