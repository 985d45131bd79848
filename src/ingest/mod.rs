//! Input readers for seeding the work queue.

pub mod ids;

pub use ids::{read_ids, read_ids_from};
