use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Largest amount a NUMERIC(10,2) column holds.
pub fn max_amount() -> Decimal {
    Decimal::new(99_999_999_99, 2)
}

/// Whole nights between check-in and check-out.
pub fn nights(check_in: NaiveDate, check_out: NaiveDate) -> i64 {
    (check_out - check_in).num_days()
}

/// Nightly rate times the number of nights, kept at two decimal places.
pub fn total_price(price_per_night: Decimal, check_in: NaiveDate, check_out: NaiveDate) -> Decimal {
    (price_per_night * Decimal::from(nights(check_in, check_out))).round_dp(2)
}

/// Rejects amounts the money columns cannot store.
pub fn ensure_storable(amount: Decimal) -> Result<Decimal, String> {
    if amount > max_amount() {
        Err(format!(
            "Total price {} exceeds the maximum of {}",
            amount,
            max_amount()
        ))
    } else {
        Ok(amount)
    }
}
