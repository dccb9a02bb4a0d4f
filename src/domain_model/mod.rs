mod refresh;
mod token;
mod user;

pub use refresh::*;
pub use token::*;
pub use user::*;
