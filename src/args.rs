use clap::Parser;

use crate::util::env::Env;

/// Command-line overrides for the environment configuration.
#[derive(Parser, Debug, Default)]
#[command(version, about)]
pub struct Cli {
    /// Port the API listens on (overrides SERVER_API_PORT)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to the campaign SQLite file (overrides DATABASE_PATH)
    #[arg(short, long)]
    pub database: Option<String>,

    /// Seconds between scheduled campaign refreshes, 0 disables (overrides CAMPAIGN_POLL_SECS)
    #[arg(long)]
    pub poll_secs: Option<u64>,
}

impl Cli {
    pub fn apply(&self, env: &mut Env) {
        if let Some(port) = self.port {
            env.server_api_port = port;
        }

        if let Some(database) = &self.database {
            env.database_path = database.clone();
        }

        if let Some(secs) = self.poll_secs {
            env.campaign_poll_secs = secs;
        }
    }
}

pub fn parse_cli_args() -> Cli {
    Cli::parse()
}
