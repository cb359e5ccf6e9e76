//! Command-line interface for the `parley` binary.

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the chat server.
    Server(ServerArgs),
    /// Connect to a server and chat from the terminal.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Interface to listen on.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on. Use 0 for an ephemeral port.
    #[arg(short, long, default_value_t = 7080)]
    pub port: u16,

    /// Seconds of silence before a session is disconnected.
    #[arg(long, default_value_t = 10)]
    pub heartbeat_secs: u64,
}

impl ServerArgs {
    pub fn bind_addr(&self) -> String {
        host_port(&self.host, self.port)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Server host.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port.
    #[arg(short, long, default_value_t = 7080)]
    pub port: u16,

    /// Display name to claim right after connecting.
    #[arg(short, long)]
    pub name: Option<String>,
}

impl ClientArgs {
    pub fn server_addr(&self) -> String {
        host_port(&self.host, self.port)
    }
}

fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_defaults() {
        let cli = Cli::parse_from(["parley", "server"]);
        let Command::Server(args) = cli.command else {
            panic!("expected server command");
        };
        assert_eq!(args.bind_addr(), "127.0.0.1:7080");
        assert_eq!(args.heartbeat_secs, 10);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_parse_client_with_name() {
        let cli = Cli::parse_from([
            "parley", "client", "--host", "::1", "--port", "9000", "--name", "alice",
        ]);
        let Command::Client(args) = cli.command else {
            panic!("expected client command");
        };
        assert_eq!(args.server_addr(), "[::1]:9000");
        assert_eq!(args.name.as_deref(), Some("alice"));
    }

    #[test]
    fn test_log_level_is_global() {
        let cli = Cli::parse_from(["parley", "server", "--log-level", "debug"]);
        assert_eq!(cli.log_level, "debug");
    }
}
