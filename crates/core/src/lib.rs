pub mod backup;
pub mod config;
pub mod convert;
pub mod diff;
pub mod error;
pub mod human;
pub mod ignore;
pub mod logging;
pub mod model;
pub mod report;
pub mod scanner;
pub mod state;
pub mod switch;

pub use error::{Result, SwitchError};
pub use state::Variant;
