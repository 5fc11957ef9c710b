//! Static token and currency catalog.
//!
//! Flows reference catalog entries by token id and currency code; the first
//! entry of each list is the default selection.

use serde::{Deserialize, Serialize};

pub const DEFAULT_TOKEN_ID: &str = "eth";
pub const DEFAULT_CURRENCY_CODE: &str = "EUR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub network: String,
    pub decimals: u8,
    /// Smallest token amount accepted for a withdrawal.
    pub min_amount: f64,
    pub max_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    pub code: String,
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    pub id: String,
    pub bank_name: String,
    pub account_holder: String,
    /// Masked IBAN, e.g. `DE89 •••• •••• 3000`.
    pub iban: String,
    pub currency: String,
    pub is_default: bool,
}

fn token(
    id: &str,
    symbol: &str,
    name: &str,
    network: &str,
    decimals: u8,
    min: f64,
    max: f64,
) -> Token {
    Token {
        id: id.to_owned(),
        symbol: symbol.to_owned(),
        name: name.to_owned(),
        network: network.to_owned(),
        decimals,
        min_amount: min,
        max_amount: max,
    }
}

fn currency(code: &str, name: &str, symbol: &str) -> Currency {
    Currency {
        code: code.to_owned(),
        name: name.to_owned(),
        symbol: symbol.to_owned(),
    }
}

pub fn tokens() -> Vec<Token> {
    vec![
        token("eth", "ETH", "Ethereum", "Ethereum", 18, 0.005, 5.0),
        token("btc", "BTC", "Bitcoin", "Bitcoin", 8, 0.0002, 0.25),
        token("usdc", "USDC", "USD Coin", "Ethereum", 6, 10.0, 10_000.0),
        token("usdt", "USDT", "Tether", "Ethereum", 6, 10.0, 10_000.0),
    ]
}

pub fn currencies() -> Vec<Currency> {
    vec![
        currency("EUR", "Euro", "€"),
        currency("USD", "US Dollar", "$"),
        currency("GBP", "British Pound", "£"),
    ]
}

pub fn token_by_id(id: &str) -> Option<Token> {
    tokens().into_iter().find(|token| token.id == id)
}

pub fn token_by_symbol(symbol: &str) -> Option<Token> {
    tokens()
        .into_iter()
        .find(|token| token.symbol.eq_ignore_ascii_case(symbol))
}

pub fn currency_by_code(code: &str) -> Option<Currency> {
    currencies()
        .into_iter()
        .find(|currency| currency.code.eq_ignore_ascii_case(code))
}
