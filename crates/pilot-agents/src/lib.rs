pub mod adapter;
pub mod error;
pub mod prompt;

pub use adapter::*;
pub use error::*;
pub use prompt::*;
