/// Database plumbing: connection pool and embedded migrations
///
/// Row-level operations live on the models (`models::user`, `models::task`);
/// the storage traits in `store` are the seam the services call through.

pub mod migrations;
pub mod pool;
