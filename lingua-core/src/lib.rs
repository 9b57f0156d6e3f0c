pub mod clock;
pub mod days;
pub mod errors;
pub mod filters;
pub mod models;
pub mod repo;
pub mod scheduler;
pub mod stats;
pub mod streak;
pub mod workflow;

pub use clock::*;
pub use errors::*;
pub use filters::*;
pub use models::*;
pub use repo::*;
pub use scheduler::*;
pub use stats::*;
pub use streak::*;
