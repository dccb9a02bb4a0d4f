use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "cocktail-auth", about = "Session and credential lifecycle service")]
pub struct Cli {
    /// Path to the settings file, without or with the `.toml` extension
    #[arg(long)]
    pub settings: Option<String>,
}
