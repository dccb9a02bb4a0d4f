//! Layered settings: a TOML file selected by build profile or `--settings`,
//! overridden by `COCKTAIL_AUTH_*` environment variables, then validated.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
