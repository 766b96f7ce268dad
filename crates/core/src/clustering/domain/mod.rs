pub mod cluster_error;
pub mod cluster_store;
pub mod clustering_engine;
pub mod distance;
