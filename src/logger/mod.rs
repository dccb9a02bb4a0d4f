//! Process-wide `tracing` subscriber. Credentials never reach a log line
//! directly; see `domain_model::fingerprint`.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
