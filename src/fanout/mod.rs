pub mod engine;
pub mod template;

pub use engine::{FanOutConfig, FanOutEngine, FanOutOutcome};
