//! The vectorgate search task: one user request in, one globally ordered
//! top-K answer out.
//!
//! Architecture role:
//! - validates and normalizes requests against cached collection metadata
//! - fails fast when the target collection/partitions are not loaded
//! - fans sub-searches out to shard leaders under a selection policy, with
//!   one retry after a leadership change
//! - decodes heterogeneous partial results and merges them under a
//!   metric-aware ordering with offset/limit trimming
//!
//! Key modules:
//! - [`request`]
//! - [`validate`]
//! - [`load`]
//! - [`dispatch`]
//! - [`decode`]
//! - [`reduce`]
//! - [`task`]

pub mod decode;
pub mod dispatch;
pub mod load;
pub mod reduce;
pub mod request;
pub mod task;
pub mod validate;

pub use decode::decode_partial_result;
pub use dispatch::dispatch_sub_searches;
pub use load::check_fully_loaded;
pub use reduce::{reduce_search_results, MergeParams};
pub use request::{
    KeyValuePair, SearchRequest, SearchResults, ANNS_FIELD_KEY, METRIC_TYPE_KEY, OFFSET_KEY,
    ROUND_DECIMAL_KEY, SEARCH_PARAMS_KEY, TOP_K_KEY,
};
pub use task::{SearchGateway, SearchTask, TaskPhase};
pub use validate::{validate, NormalizedQuery};
