pub mod ingest;
pub mod seed;
pub mod serve;
