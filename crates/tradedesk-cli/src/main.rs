//! Tradedesk CLI - account and trading commands through the gateway.
//!
//! This is the entry point for the `tradedesk` binary.

mod commands;
mod session;

use std::path::PathBuf;

use clap::Parser;

use commands::Command;
use session::Session;

/// Tradedesk CLI - sign in and trade through the gateway.
#[derive(Parser, Debug)]
#[command(name = "tradedesk")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Gateway URL.
    #[arg(
        long,
        env = "TRADEDESK_GATEWAY_URL",
        default_value = "http://localhost:5000"
    )]
    gateway_url: String,

    /// Where the session token is kept between runs.
    #[arg(long, env = "TRADEDESK_SESSION_FILE")]
    session_file: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    fn session_file(&self) -> PathBuf {
        self.session_file.clone().unwrap_or_else(default_session_file)
    }
}

/// `$HOME/.tradedesk/session.json`, or the working directory without a home.
fn default_session_file() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".tradedesk")
        .join("session.json")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.debug {
        tracing_subscriber::fmt()
            .with_env_filter("tradedesk_cli=debug,tradedesk_session=debug,warn")
            .with_writer(std::io::stderr)
            .init();
    }

    let store_path = args.session_file();
    tracing::debug!(gateway = %args.gateway_url, session_file = %store_path.display(), "Starting");

    let mut session = Session::open(&args.gateway_url, &store_path);
    commands::execute(&mut session, args.command).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_and_subcommand() {
        let args = Args::try_parse_from([
            "tradedesk",
            "--gateway-url",
            "http://gw:5000",
            "--session-file",
            "/tmp/s.json",
            "transactions",
            "--page",
            "2",
        ])
        .unwrap();

        assert_eq!(args.gateway_url, "http://gw:5000");
        assert_eq!(args.session_file(), PathBuf::from("/tmp/s.json"));
        assert_eq!(args.command, Command::Transactions { page: 2, size: 10 });
    }

    #[test]
    fn prices_accepts_comma_list() {
        let args = Args::try_parse_from(["tradedesk", "prices", "bitcoin,solana"]).unwrap();
        assert_eq!(
            args.command,
            Command::Prices {
                ids: vec!["bitcoin".into(), "solana".into()],
                currency: "usd".into(),
            }
        );
    }

    #[test]
    fn register_collects_extra_fields() {
        let args = Args::try_parse_from([
            "tradedesk",
            "register",
            "alice",
            "alice@example.com",
            "--password",
            "pw",
            "--field",
            "firstName=Alice",
        ])
        .unwrap();

        let Command::Register { fields, password, .. } = args.command else {
            panic!("expected register");
        };
        assert_eq!(password.as_deref(), Some("pw"));
        assert_eq!(fields, vec![("firstName".to_string(), "Alice".to_string())]);
    }

    #[test]
    fn default_session_file_lives_under_dot_dir() {
        assert!(default_session_file().ends_with(".tradedesk/session.json"));
    }
}
