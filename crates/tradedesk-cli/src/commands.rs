//! Subcommands and their execution.

use std::io::{self, BufRead, Write};

use anyhow::Context;
use clap::Subcommand;
use serde_json::Value;

use tradedesk_session::{
    BuyRequest, RegisterRequest, RequestError, SellRequest, SessionState, DEFAULT_CRYPTO_IDS,
};

use crate::session::{Session, LOGIN_GUIDANCE};

/// What to do in this invocation.
#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Sign in and persist the session.
    Login {
        /// Account username.
        username: String,
        /// Password; prompted on stdin when omitted.
        #[arg(long, env = "TRADEDESK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account and sign in.
    Register {
        /// Desired username.
        username: String,
        /// Contact email.
        email: String,
        /// Password; prompted on stdin when omitted.
        #[arg(long, env = "TRADEDESK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Extra registration fields as `key=value`.
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Forget the stored session.
    Logout,

    /// Show who is signed in.
    Whoami,

    /// Current coin prices.
    Prices {
        /// Coin ids; defaults to bitcoin, ethereum and cardano.
        #[arg(value_delimiter = ',')]
        ids: Vec<String>,
        /// Quote currency.
        #[arg(long, default_value = "usd")]
        currency: String,
    },

    /// Spend fiat on a coin.
    Buy {
        /// Coin id, e.g. `bitcoin`.
        crypto: String,
        /// Fiat amount to spend.
        amount: f64,
        /// Fiat currency code.
        #[arg(long, default_value = "USD")]
        currency: String,
    },

    /// Sell an amount of a coin.
    Sell {
        /// Coin id.
        crypto: String,
        /// Coin amount to sell.
        amount: f64,
        /// Fiat currency to credit.
        #[arg(long, default_value = "USD")]
        currency: String,
    },

    /// Coin holdings.
    Portfolio,

    /// Fiat accounts.
    Accounts,

    /// Trade history.
    Transactions {
        /// Page number, starting at 0.
        #[arg(long, default_value_t = 0)]
        page: u32,
        /// Page size.
        #[arg(long, default_value_t = 10)]
        size: u32,
    },
}

impl Command {
    /// Whether the command needs a verified session first.
    pub fn is_protected(&self) -> bool {
        !matches!(
            self,
            Self::Login { .. } | Self::Register { .. } | Self::Logout | Self::Whoami
        )
    }
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got `{raw}`")),
    }
}

/// Run one command against the session.
///
/// # Errors
///
/// Returns an error describing what failed; the caller prints it.
pub async fn execute(session: &mut Session, command: Command) -> anyhow::Result<()> {
    if command.is_protected() {
        let user = session.require_login().await?;
        tracing::debug!(username = %user.username, "Session verified");
    }

    let result = match command {
        Command::Login { username, password } => {
            let password = password_or_prompt(password)?;
            let user = session.manager().login(&username, &password).await?;
            println!("Logged in as {}", user.username);
            return Ok(());
        }
        Command::Register {
            username,
            email,
            password,
            fields,
        } => {
            let req = RegisterRequest {
                username,
                email,
                password: password_or_prompt(password)?,
                extra: fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect(),
            };
            let user = session.manager().register(&req).await?;
            println!("Registered and logged in as {}", user.username);
            return Ok(());
        }
        Command::Logout => {
            session.manager().logout();
            println!("Logged out");
            return Ok(());
        }
        Command::Whoami => {
            match session.manager().verify_startup_token().await {
                SessionState::Authenticated(user) => println!(
                    "{} (session stored at {})",
                    user.username,
                    session.store_path().display()
                ),
                SessionState::Unauthenticated | SessionState::Verifying => {
                    println!("Not logged in. {LOGIN_GUIDANCE}");
                }
            }
            return Ok(());
        }
        Command::Prices { ids, currency } => {
            let ids: Vec<&str> = if ids.is_empty() {
                DEFAULT_CRYPTO_IDS.to_vec()
            } else {
                ids.iter().map(String::as_str).collect()
            };
            session.account().prices(&ids, &currency).await
        }
        Command::Buy {
            crypto,
            amount,
            currency,
        } => {
            let req = BuyRequest {
                crypto_currency: crypto,
                fiat_amount: amount,
                fiat_currency: currency,
            };
            session.account().buy(&req).await
        }
        Command::Sell {
            crypto,
            amount,
            currency,
        } => {
            let req = SellRequest {
                crypto_currency: crypto,
                crypto_amount: amount,
                fiat_currency: currency,
            };
            session.account().sell(&req).await
        }
        Command::Portfolio => session.account().portfolio().await,
        Command::Accounts => session.account().my_accounts().await,
        Command::Transactions { page, size } => {
            session.account().transactions(page, size).await
        }
    };

    match result {
        Ok(value) => {
            println!("{}", render(&value)?);
            Ok(())
        }
        Err(e) => Err(account_failure(session, e)),
    }
}

/// Turn a failed account call into the message the user sees.
fn account_failure(session: &mut Session, error: RequestError) -> anyhow::Error {
    if error.is_unauthorized() {
        let path = session.drain_invalidations().unwrap_or_default();
        tracing::info!(path = %path, "Session ended by backend");
        return anyhow::anyhow!("Session expired. {LOGIN_GUIDANCE}");
    }
    anyhow::Error::new(error)
}

fn render(value: &Value) -> anyhow::Result<String> {
    serde_json::to_string_pretty(value).context("Failed to format response")
}

fn password_or_prompt(password: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    eprint!("Password: ");
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn protected_commands() {
        assert!(Command::Portfolio.is_protected());
        assert!(Command::Accounts.is_protected());
        assert!(Command::Transactions { page: 0, size: 10 }.is_protected());
        assert!(!Command::Logout.is_protected());
        assert!(!Command::Whoami.is_protected());
        assert!(!Command::Login {
            username: "alice".into(),
            password: None
        }
        .is_protected());
    }

    #[test]
    fn field_parsing() {
        assert_eq!(
            parse_field("firstName=Alice").unwrap(),
            ("firstName".to_string(), "Alice".to_string())
        );
        assert_eq!(
            parse_field("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_field("=x").is_err());
        assert!(parse_field("novalue").is_err());
    }

    #[test]
    fn render_is_pretty_json() {
        let out = render(&json!({"bitcoin": {"usd": 1}})).unwrap();
        assert!(out.contains('\n'));
        assert!(out.contains("\"bitcoin\""));
    }
}
