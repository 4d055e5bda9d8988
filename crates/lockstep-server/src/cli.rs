use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "lockstep-server", about = "Synchronized video playback server")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/lockstep.toml")]
    pub config: String,

    /// Path to directory containing the built viewer page (overrides config)
    #[arg(long)]
    pub web_dir: Option<String>,
}
