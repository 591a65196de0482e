//! Account-scoped operations.
//!
//! Thin wrappers over [`AuthorizedClient`]. Payloads belong to the account
//! backend and are passed through as JSON; the only thing this layer adds
//! is the request shape.

use serde::Serialize;
use serde_json::Value;

use crate::authorized::AuthorizedClient;
use crate::error::RequestError;

/// Default coins for a price query.
pub const DEFAULT_CRYPTO_IDS: [&str; 3] = ["bitcoin", "ethereum", "cardano"];

/// Body for a buy order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyRequest {
    /// Coin to buy, e.g. `"bitcoin"`.
    pub crypto_currency: String,
    /// Amount of fiat to spend.
    pub fiat_amount: f64,
    /// Fiat currency code, e.g. `"USD"`.
    pub fiat_currency: String,
}

/// Body for a sell order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellRequest {
    /// Coin to sell.
    pub crypto_currency: String,
    /// Amount of the coin to sell.
    pub crypto_amount: f64,
    /// Fiat currency to credit.
    pub fiat_currency: String,
}

/// Account backend operations behind the gateway's `/api/account` route.
#[derive(Clone)]
pub struct AccountApi {
    client: AuthorizedClient,
}

impl AccountApi {
    /// Wrap an authorized client.
    #[must_use]
    pub fn new(client: AuthorizedClient) -> Self {
        Self { client }
    }

    /// The underlying authorized client.
    #[must_use]
    pub fn client(&self) -> &AuthorizedClient {
        &self.client
    }

    /// Current prices for `crypto_ids` in `currency`.
    ///
    /// # Errors
    ///
    /// Returns `RequestError` if the request fails; a 401 also ends the session.
    pub async fn prices(&self, crypto_ids: &[&str], currency: &str) -> Result<Value, RequestError> {
        let query = [
            ("cryptoIds", crypto_ids.join(",")),
            ("currency", currency.to_string()),
        ];
        self.client
            .get_json("/crypto/trading/prices", &query)
            .await
    }

    /// Place a buy order.
    ///
    /// # Errors
    ///
    /// Returns `RequestError` if the request fails; a 401 also ends the session.
    pub async fn buy(&self, req: &BuyRequest) -> Result<Value, RequestError> {
        let body = to_body(req)?;
        self.client.post_json("/crypto/trading/buy", &body).await
    }

    /// Place a sell order.
    ///
    /// # Errors
    ///
    /// Returns `RequestError` if the request fails; a 401 also ends the session.
    pub async fn sell(&self, req: &SellRequest) -> Result<Value, RequestError> {
        let body = to_body(req)?;
        self.client.post_json("/crypto/trading/sell", &body).await
    }

    /// Crypto holdings of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `RequestError` if the request fails; a 401 also ends the session.
    pub async fn portfolio(&self) -> Result<Value, RequestError> {
        self.client.get_json("/crypto/trading/portfolio", &[]).await
    }

    /// Fiat accounts of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `RequestError` if the request fails; a 401 also ends the session.
    pub async fn my_accounts(&self) -> Result<Value, RequestError> {
        self.client.get_json("/accounts/my-accounts", &[]).await
    }

    /// One page of trade history.
    ///
    /// # Errors
    ///
    /// Returns `RequestError` if the request fails; a 401 also ends the session.
    pub async fn transactions(&self, page: u32, size: u32) -> Result<Value, RequestError> {
        let query = [("page", page.to_string()), ("size", size.to_string())];
        self.client
            .get_json("/crypto/trading/transactions", &query)
            .await
    }
}

fn to_body<T: Serialize>(value: &T) -> Result<Value, RequestError> {
    serde_json::to_value(value).map_err(|e| RequestError::Parse(e.to_string()))
}
