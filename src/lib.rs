pub mod api;
pub mod bundle;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod matrix;
pub mod preprocessing;

pub use bundle::{ModelBundle, TrainingOptions};
pub use config::Config;
pub use corpus::Review;
