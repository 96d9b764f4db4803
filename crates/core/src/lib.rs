pub mod config;
pub mod error;
pub mod feature;
pub mod publisher;

pub use config::Config;
pub use error::*;
pub use feature::*;
pub use publisher::*;
