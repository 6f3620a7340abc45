//! Rendering of amounts for display and normalization of raw user input.

use crate::validation::parse_amount;

const MAX_INPUT_DECIMALS: u8 = 8;

/// Keeps digits and the first decimal point. Digits following later points are appended
/// to the fractional part.
pub fn parse_numeric_input(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();

    match cleaned.split_once('.') {
        Some((integer, fraction)) => format!("{}.{}", integer, fraction.replace('.', "")),
        None => cleaned,
    }
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    grouped
}

fn fixed(value: f64, decimals: usize, grouping: bool) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let text = format!("{:.*}", decimals, value.abs());
    if !grouping {
        return format!("{}{}", sign, text);
    }

    match text.split_once('.') {
        Some((integer, fraction)) => format!("{}{}.{}", sign, group_thousands(integer), fraction),
        None => format!("{}{}", sign, group_thousands(&text)),
    }
}

/// Fixed-point form with `decimals` digits, widened to two significant digits when
/// `decimals` would round a nonzero value down to zero.
fn fixed_nonzero(value: f64, decimals: usize) -> String {
    let magnitude = value.abs();
    if magnitude == 0.0 || magnitude >= 10f64.powi(-(decimals as i32)) {
        return format!("{:.*}", decimals, value);
    }

    let digits = (-magnitude.log10()).ceil() as usize + 1;
    trim_fraction(format!("{:.*}", digits, value))
}

fn trim_fraction(text: String) -> String {
    if !text.contains('.') {
        return text;
    }

    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Fixed `decimals` digits, optionally grouped by thousands. Zero and NaN render as `"0"`.
pub fn format_number(value: f64, decimals: usize, grouping: bool) -> String {
    if value.is_nan() || value == 0.0 {
        return "0".to_string();
    }

    fixed(value, decimals, grouping)
}

pub fn format_usd(value: f64) -> String {
    if value.is_nan() {
        return "$0.00".to_string();
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}${}", sign, fixed(value.abs(), 2, true))
}

/// Picks the precision from the magnitude of `value`, never exceeding what the token can
/// represent.
pub fn format_token_amount(value: f64, token_decimals: u8) -> String {
    let magnitude = value.abs();
    let decimals = if magnitude < 0.01 {
        6
    } else if magnitude < 1.0 {
        4
    } else {
        2
    };

    let decimals = decimals.min(token_decimals as usize);
    if magnitude > 0.0 && magnitude < 10f64.powi(-(decimals as i32)) {
        return fixed_nonzero(value, decimals);
    }

    format_number(value, decimals, true)
}

pub fn format_abbreviated_usd(value: f64) -> String {
    if value.is_nan() || value == 0.0 {
        return "0".to_string();
    }

    let sign = if value < 0.0 { "-" } else { "" };
    let magnitude = value.abs();

    if magnitude >= 1e12 {
        format!("{}{:.2}T", sign, magnitude / 1e12)
    } else if magnitude >= 1e9 {
        format!("{}{:.2}B", sign, magnitude / 1e9)
    } else if magnitude >= 1e6 {
        format!("{}{:.2}M", sign, magnitude / 1e6)
    } else {
        format!("{:.2}", value)
    }
}

/// Display form of a USD field. Unparsable input renders empty.
pub fn display_usd_amount(raw: &str) -> String {
    match parse_amount(raw) {
        Some(value) if value.abs() >= 1000.0 => format_abbreviated_usd(value),
        Some(value) => fixed_nonzero(value, 2),
        None => String::new(),
    }
}

/// Editable, ungrouped form of a derived token amount.
pub fn format_input_amount(value: f64, decimals: u8) -> String {
    if !value.is_finite() {
        return String::new();
    }

    trim_fraction(fixed_nonzero(value, decimals.min(MAX_INPUT_DECIMALS) as usize))
}

/// Editable form of a derived USD amount: cents, or more digits for sub-cent values.
pub fn format_usd_input(value: f64) -> String {
    if !value.is_finite() {
        return String::new();
    }

    fixed_nonzero(value, 2)
}
