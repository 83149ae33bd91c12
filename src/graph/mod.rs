pub mod builder;
pub mod types;

pub use builder::GraphBuilder;
pub use types::{Relationship, Table, TemporalTable};
