pub mod batch;

pub use batch::{build_batch_script, update_statement, BatchItem, Dialect};
