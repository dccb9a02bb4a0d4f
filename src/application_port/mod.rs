mod authentication;
mod session_coordinator;
mod token_issuer;

pub use authentication::*;
pub use session_coordinator::*;
pub use token_issuer::*;
