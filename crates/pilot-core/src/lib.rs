pub mod config;
pub mod process;
pub mod state;
pub mod trigger;
pub mod types;
pub mod validation;

pub use config::*;
pub use process::*;
pub use state::*;
pub use trigger::*;
pub use types::*;
pub use validation::*;
