//! Step-local input checks shared by both wizards.

use rw_api_types::Token;

use crate::FlowError;

pub const AMOUNT_FIELD: &str = "amount";
pub const TOKEN_AMOUNT_FIELD: &str = "tokenAmount";
pub const TOKEN_FIELD: &str = "token";
pub const CURRENCY_FIELD: &str = "currency";
pub const BANK_ACCOUNT_FIELD: &str = "bankAccount";

/// Parses a user-entered decimal; `None` for blank, malformed or non-finite input.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Fiat amount for a deposit, inclusive of both bounds.
pub fn validate_deposit_amount(
    raw: &str,
    min: f64,
    max: f64,
    currency: &str,
) -> Result<f64, FlowError> {
    if raw.trim().is_empty() {
        return Err(FlowError::validation(AMOUNT_FIELD, "Enter an amount"));
    }
    let Some(amount) = parse_amount(raw) else {
        return Err(FlowError::validation(AMOUNT_FIELD, "Enter a valid amount"));
    };
    if amount <= 0.0 {
        return Err(FlowError::validation(
            AMOUNT_FIELD,
            "Amount must be greater than zero",
        ));
    }
    if amount < min {
        return Err(FlowError::validation(
            AMOUNT_FIELD,
            format!("Minimum deposit amount is {min} {currency}"),
        ));
    }
    if amount > max {
        return Err(FlowError::validation(
            AMOUNT_FIELD,
            format!("Maximum deposit amount is {max} {currency}"),
        ));
    }
    Ok(amount)
}

/// Optional token amount for a withdrawal; blank input is allowed.
pub fn validate_token_amount(raw: &str, token: &Token) -> Result<Option<f64>, FlowError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let Some(amount) = parse_amount(raw).filter(|value| *value > 0.0) else {
        return Err(FlowError::validation(
            TOKEN_AMOUNT_FIELD,
            "Enter a valid token amount",
        ));
    };
    if amount < token.min_amount {
        return Err(FlowError::validation(
            TOKEN_AMOUNT_FIELD,
            format!("Minimum withdrawal is {} {}", token.min_amount, token.symbol),
        ));
    }
    if amount > token.max_amount {
        return Err(FlowError::validation(
            TOKEN_AMOUNT_FIELD,
            format!("Maximum withdrawal is {} {}", token.max_amount, token.symbol),
        ));
    }
    Ok(Some(amount))
}
