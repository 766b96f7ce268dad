//! Greedy face-embedding clustering and a cancellable batch pipeline that
//! sorts photos into per-person buckets.

pub mod clustering;
pub mod embedding;
pub mod input;
pub mod pipeline;
pub mod routing;
pub mod shared;
