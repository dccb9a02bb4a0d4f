mod authenticator;
mod jwt_token_issuer;
mod session_coordinator_impl;

pub use authenticator::*;
pub use jwt_token_issuer::*;
pub use session_coordinator_impl::*;
