pub mod buckets;
pub mod catalog;
pub mod crypto;
pub mod object_store;
pub mod replication;
pub mod sbom;
