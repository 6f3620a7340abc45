use thiserror::Error;

pub const MAX_AMOUNT: f64 = 1_000_000_000.0;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountError {
    #[error("Please enter an amount")]
    Empty,

    #[error("Invalid number")]
    NotANumber,

    #[error("Amount must be positive")]
    Negative,

    #[error("Amount too large")]
    TooLarge,
}

/// Parses the longest numeric prefix of `raw`, ignoring leading whitespace.
/// `"12abc"` parses as 12, `"abc"` does not parse.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let text = raw.trim_start();
    let bytes = text.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }

    let unsigned = &text[end..];
    if unsigned.starts_with("Infinity") {
        return text[..end + "Infinity".len()].parse::<f64>().ok();
    }

    let integer_end = digits_from(end);
    let mut mantissa_digits = integer_end - end;
    end = integer_end;

    if bytes.get(end) == Some(&b'.') {
        let fraction_end = digits_from(end + 1);
        mantissa_digits += fraction_end - end - 1;
        end = fraction_end;
    }

    if mantissa_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent = end + 1;
        if matches!(bytes.get(exponent), Some(b'+' | b'-')) {
            exponent += 1;
        }

        let exponent_end = digits_from(exponent);
        if exponent_end > exponent {
            end = exponent_end;
        }
    }

    text[..end].parse::<f64>().ok()
}

/// Checks a raw amount and returns its value.
pub fn validate_amount(raw: &str) -> Result<f64, AmountError> {
    if raw.trim().is_empty() {
        return Err(AmountError::Empty);
    }

    let value = parse_amount(raw).ok_or(AmountError::NotANumber)?;

    if value < 0.0 {
        return Err(AmountError::Negative);
    }

    if value > MAX_AMOUNT {
        return Err(AmountError::TooLarge);
    }

    Ok(value)
}
