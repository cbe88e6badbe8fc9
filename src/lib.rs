pub mod builder;
pub mod disk;
pub mod fs;
pub mod packaging;
pub mod utils;

pub use builder::AdfBuilder;
pub use fs::error::{AdfError, Result};
