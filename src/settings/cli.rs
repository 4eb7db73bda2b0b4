use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "tokenkeeper", about = "Access/refresh token service")]
pub struct Cli {
    /// Path to a settings file; defaults to the build profile's file.
    #[arg(long)]
    pub settings: Option<String>,
}
