/// Token amount worth `usd` at `unit_price`. Zero whenever either input is not positive.
pub fn token_amount_from_usd(usd: f64, unit_price: f64) -> f64 {
    if unit_price <= 0.0 || usd <= 0.0 || unit_price.is_nan() || usd.is_nan() {
        return 0.0;
    }

    usd / unit_price
}

pub fn usd_from_token_amount(amount: f64, unit_price: f64) -> f64 {
    amount * unit_price
}

/// Units of the target token obtained for one unit of the source token.
pub fn exchange_rate(source_price: Option<f64>, target_price: Option<f64>) -> Option<f64> {
    match (source_price, target_price) {
        (Some(source), Some(target)) if target > 0.0 && source.is_finite() => Some(source / target),
        _ => None,
    }
}

/// Both token amounts bought by the same USD value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SwapAmounts {
    pub source_amount: f64,
    pub target_amount: f64,
}

pub fn swap_amounts_from_usd(usd: f64, source_price: f64, target_price: f64) -> SwapAmounts {
    SwapAmounts {
        source_amount: token_amount_from_usd(usd, source_price),
        target_amount: token_amount_from_usd(usd, target_price),
    }
}

/// The four amounts of a trade, seen from the side whose field was edited.
/// Both sides always carry the same USD value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Amounts {
    pub token_amount: f64,
    pub usd_amount: f64,
    pub counter_token_amount: f64,
    pub counter_usd_amount: f64,
}

fn usable(price: Option<f64>) -> Option<f64> {
    price.filter(|x| x.is_finite() && *x > 0.0)
}

/// Derives every amount from a token amount on one side. `None` when a price is missing
/// or the amount is not positive.
pub fn amounts_from_token_amount(amount: f64, price: Option<f64>, counter_price: Option<f64>) -> Option<Amounts> {
    let (price, counter_price) = (usable(price)?, usable(counter_price)?);
    if !(amount > 0.0) {
        return None;
    }

    let usd_amount = usd_from_token_amount(amount, price);

    Some(Amounts {
        token_amount: amount,
        usd_amount,
        counter_token_amount: token_amount_from_usd(usd_amount, counter_price),
        counter_usd_amount: usd_amount,
    })
}

/// Derives every amount from a USD value on one side. `None` when a price is missing
/// or the value is not positive.
pub fn amounts_from_usd(usd: f64, price: Option<f64>, counter_price: Option<f64>) -> Option<Amounts> {
    let (price, counter_price) = (usable(price)?, usable(counter_price)?);
    if !(usd > 0.0) {
        return None;
    }

    let amounts = swap_amounts_from_usd(usd, price, counter_price);

    Some(Amounts {
        token_amount: amounts.source_amount,
        usd_amount: usd,
        counter_token_amount: amounts.target_amount,
        counter_usd_amount: usd,
    })
}
