/// Fiat price of one unit of the token.
pub fn fiat_price(token_symbol: &str, currency: &str) -> Option<f64> {
    let usd = match token_symbol.to_ascii_uppercase().as_str() {
        "ETH" => 3420.0,
        "BTC" => 66_000.0,
        "USDC" | "USDT" => 1.0,
        _ => return None,
    };
    let per_usd = match currency.to_ascii_uppercase().as_str() {
        "USD" => 1.0,
        "EUR" => 0.92,
        "GBP" => 0.79,
        _ => return None,
    };
    Some(usd * per_usd)
}

/// Percentage fee charged on the fiat side of a deposit.
pub(crate) const DEPOSIT_FEE_RATE: f64 = 0.015;
/// Flat fiat network fee for deposits.
pub(crate) const DEPOSIT_NETWORK_FEE: f64 = 1.5;
pub(crate) const WITHDRAWAL_FEE_RATE: f64 = 0.01;
pub(crate) const WITHDRAWAL_NETWORK_FEE: f64 = 2.0;
