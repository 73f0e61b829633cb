//! Display formatting for prices.

/// Format a minor-unit amount for display.
///
/// The amount is divided by 100 and rendered with two decimals and
/// thousands grouping. USD, EUR and GBP get their symbol as prefix; any
/// other currency falls back to `"<CODE> "` with the code uppercased.
///
/// ```
/// use cadence_billing::pricing::format_price;
///
/// assert_eq!(format_price(1999, "USD"), "$19.99");
/// assert_eq!(format_price(500, "JPY"), "JPY 5.00");
/// ```
pub fn format_price(amount_minor: i64, currency: &str) -> String {
    let code = currency.to_uppercase();
    let prefix = match code.as_str() {
        "USD" => "$".to_string(),
        "EUR" => "\u{20ac}".to_string(),
        "GBP" => "\u{a3}".to_string(),
        _ => format!("{code} "),
    };

    let negative = amount_minor < 0;
    let abs = amount_minor.unsigned_abs();
    let units = abs / 100;
    let cents = abs % 100;

    format!(
        "{prefix}{}{}.{cents:02}",
        if negative { "-" } else { "" },
        group_thousands(units)
    )
}

/// Insert comma separators into a whole-unit amount.
fn group_thousands(units: u64) -> String {
    let digits = units.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_currency_symbols() {
        assert_eq!(format_price(1999, "USD"), "$19.99");
        assert_eq!(format_price(0, "EUR"), "\u{20ac}0.00");
        assert_eq!(format_price(250, "GBP"), "\u{a3}2.50");
    }

    #[test]
    fn fallback_uses_uppercase_code_prefix() {
        assert_eq!(format_price(500, "JPY"), "JPY 5.00");
        assert_eq!(format_price(500, "jpy"), "JPY 5.00");
        assert_eq!(format_price(123, "chf"), "CHF 1.23");
    }

    #[test]
    fn lowercase_known_codes_match() {
        assert_eq!(format_price(1999, "usd"), "$19.99");
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(format_price(123_456, "USD"), "$1,234.56");
        assert_eq!(format_price(100_000_000, "USD"), "$1,000,000.00");
    }

    #[test]
    fn negative_amounts_for_credits() {
        assert_eq!(format_price(-1999, "USD"), "$-19.99");
    }
}
