mod clock;
mod refresh_token_store;

pub use clock::*;
pub use refresh_token_store::*;
