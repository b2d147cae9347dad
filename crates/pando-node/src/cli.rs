//! CLI argument parsing for pando-node

use clap::Parser;
use std::net::SocketAddr;

/// Pando overlay node
#[derive(Parser, Debug, Clone)]
#[command(name = "pando")]
#[command(about = "Pando overlay node")]
#[command(version)]
pub struct Cli {
    /// Overlay listen address
    #[arg(long, default_value = "0.0.0.0:9440")]
    pub listen: SocketAddr,

    /// Bootstrap peers (comma-separated, e.g. "1.2.3.4:9440,seed.example.com:9440")
    #[arg(long, default_value = "")]
    pub bootstrap: String,

    /// Value this node answers queries with
    #[arg(long, default_value = "ok")]
    pub answer: String,

    /// Broadcast this query once the bootstrap peers connect, print the
    /// replies as JSON, and exit
    #[arg(long)]
    pub ask: Option<String>,

    /// Seconds to wait for replies to --ask
    #[arg(long, default_value = "10")]
    pub ask_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Bootstrap entries split out of the comma-separated flag
    pub fn bootstrap_peers(&self) -> Vec<String> {
        self.bootstrap
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["pando"]);
        assert_eq!(cli.listen.to_string(), "0.0.0.0:9440");
        assert_eq!(cli.bootstrap, "");
        assert_eq!(cli.answer, "ok");
        assert!(cli.ask.is_none());
        assert_eq!(cli.ask_timeout, 10);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_cli_custom_values() {
        let cli = Cli::parse_from([
            "pando",
            "--listen", "127.0.0.1:9441",
            "--bootstrap", "10.0.0.1:9440,seed.example.com:9440",
            "--answer", "survey says",
            "--ask", "who is out there?",
            "--ask-timeout", "3",
            "--log-level", "debug",
        ]);
        assert_eq!(cli.listen.to_string(), "127.0.0.1:9441");
        assert_eq!(cli.answer, "survey says");
        assert_eq!(cli.ask.as_deref(), Some("who is out there?"));
        assert_eq!(cli.ask_timeout, 3);
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn test_bootstrap_peers_splitting() {
        let cli = Cli::parse_from(["pando", "--bootstrap", " a:1 , b:2 ,,c:3, "]);
        assert_eq!(cli.bootstrap_peers(), vec!["a:1", "b:2", "c:3"]);

        let cli = Cli::parse_from(["pando"]);
        assert!(cli.bootstrap_peers().is_empty());
    }
}
