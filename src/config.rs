use clap::Parser;

/// Small-league tracker API with derived player market values
#[derive(Parser, Debug, Clone)]
#[command(name = "league-tracker", version, about)]
pub struct Config {
    /// HTTP listen address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "league.db")]
    pub database_path: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            anyhow::bail!(
                "listen_addr must be a valid socket address, got '{}'",
                self.listen_addr
            );
        }
        if self.database_path.trim().is_empty() {
            anyhow::bail!("database_path must not be empty");
        }
        Ok(())
    }
}
