pub mod command;
pub mod error;
pub mod workspace;

pub use command::*;
pub use error::*;
pub use workspace::*;
