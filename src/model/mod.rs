pub mod index;
pub mod types;
pub mod validate;

pub use index::{AssocEdge, AssocIndex};
pub use types::*;
pub use validate::validate;
