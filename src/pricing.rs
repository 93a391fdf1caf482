//! Payment amounts: the EUR base price, its conversion to the student's
//! currency and the split (two installments) rules.
//!
//! Amounts are always integers in the minor unit of their currency. XOF and
//! XAF have no minor unit, so one minor unit is one franc.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::base::{SRError, SRResult};
use crate::model::{Payment, PaymentMethod, Settings};

/// Franc CFA per euro, times 1000 (fixed peg 655.957).
const CFA_PER_EUR_MILLI: i64 = 655_957;

/// WAEMU members, paying in XOF.
const XOF_COUNTRIES: &[&str] = &["BJ", "BF", "CI", "GW", "ML", "NE", "SN", "TG"];
/// CEMAC members, paying in XAF.
const XAF_COUNTRIES: &[&str] = &["CM", "CF", "TD", "CG", "GQ", "GA"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Eur,
    Xof,
    Xaf,
}

impl Currency {
    pub fn for_country(country: &str) -> Currency {
        if XOF_COUNTRIES.contains(&country) {
            Currency::Xof
        } else if XAF_COUNTRIES.contains(&country) {
            Currency::Xaf
        } else {
            Currency::Eur
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Xof => "XOF",
            Currency::Xaf => "XAF",
        }
    }

    pub fn decimals(&self) -> u32 {
        match self {
            Currency::Eur => 2,
            Currency::Xof | Currency::Xaf => 0,
        }
    }

    fn is_cfa(&self) -> bool {
        matches!(self, Currency::Xof | Currency::Xaf)
    }

    /// Converts an amount in euro cents to this currency's minor unit.
    pub fn from_eur_cents(&self, cents: i64) -> i64 {
        if self.is_cfa() {
            // cents * 655.957 / 100, rounded up, then up to a multiple of 5
            let francs = ceil_div(cents * CFA_PER_EUR_MILLI, 100_000);
            ceil_div(francs, 5) * 5
        } else {
            cents
        }
    }

    /// Whole major units, rounded up, as the gateway only takes integers.
    pub fn to_major_units(&self, minor: i64) -> i64 {
        ceil_div(minor, 10i64.pow(self.decimals()))
    }

    /// Human readable amount, e.g. `125.50 EUR` or `82 000 XOF`.
    pub fn format(&self, minor: i64) -> String {
        match self.decimals() {
            0 => format!("{} {}", group_thousands(minor), self.code()),
            d => {
                let unit = 10i64.pow(d);
                format!("{}.{:0width$} {}", group_thousands(minor / unit), minor % unit, self.code(), width = d as usize)
            }
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.code())
    }
}

fn ceil_div(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}

fn group_thousands(n: i64) -> String {
    let digits = n.to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

/// Upper-cases and checks an ISO 3166 alpha-2 country code.
pub fn normalize_country(country: &str) -> Option<String> {
    let c = country.trim().to_ascii_uppercase();
    if c.len() == 2 && c.chars().all(|ch| ch.is_ascii_alphabetic()) {
        Some(c)
    } else {
        None
    }
}

/// Which part of the fee a payment covers, stored as 0, 1 or 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Installment {
    Full,
    FirstHalf,
    SecondHalf,
}

impl Installment {
    pub fn as_db(&self) -> i16 {
        match self {
            Installment::Full => 0,
            Installment::FirstHalf => 1,
            Installment::SecondHalf => 2,
        }
    }

    pub fn from_db(v: i16) -> Option<Installment> {
        match v {
            0 => Some(Installment::Full),
            1 => Some(Installment::FirstHalf),
            2 => Some(Installment::SecondHalf),
            _ => None,
        }
    }

    /// Share of the EUR price covered by this installment.
    pub fn eur_cents(&self, price_cents: i64) -> i64 {
        let first = ceil_div(price_cents, 2);
        match self {
            Installment::Full => price_cents,
            Installment::FirstHalf => first,
            Installment::SecondHalf => price_cents - first,
        }
    }
}

/// Payment request as sent by the client.
#[derive(Deserialize, Serialize, Debug, Default, Clone)]
pub struct PaymentRequest {
    pub country: Option<String>,
    pub method: Option<String>,
    #[serde(default)]
    pub split: bool,
}

/// What the server decided to charge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentPlan {
    pub country: String,
    pub method: PaymentMethod,
    pub currency: Currency,
    pub amount: i64,
    pub installment: Installment,
}

/// Split applies only when the global setting and the student's own flag both
/// allow it; the client's wish alone never halves a price.
pub fn split_eligible(settings: &Settings, split_payment_allowed: bool) -> bool {
    settings.split_payment_enabled && split_payment_allowed
}

/// Picks the installment for a new payment from the succeeded ones.
pub fn next_installment(succeeded: &[Payment], wants_split: bool, eligible: bool) -> SRResult<Installment> {
    let paid: Vec<Installment> = succeeded
        .iter()
        .filter(|p| p.is_succeeded())
        .filter_map(|p| Installment::from_db(p.installment))
        .collect();
    let full = paid.contains(&Installment::Full);
    let first = paid.contains(&Installment::FirstHalf);
    let second = paid.contains(&Installment::SecondHalf);

    if full || (first && second) {
        Err(SRError::Conflict(String::from("The fee has already been paid")))
    } else if first {
        Ok(Installment::SecondHalf)
    } else if wants_split && eligible {
        Ok(Installment::FirstHalf)
    } else {
        Ok(Installment::Full)
    }
}

/// Validates the request and computes what to charge.
pub fn plan_payment(req: &PaymentRequest, settings: &Settings, split_payment_allowed: bool, succeeded: &[Payment]) -> SRResult<PaymentPlan> {
    let country = match req.country.as_deref().map(str::trim) {
        None | Some("") => return Err(SRError::BadRequest(String::from("country is required"))),
        Some(c) => normalize_country(c).ok_or_else(|| SRError::BadRequest(format!("invalid country: {}", c)))?,
    };
    let method: PaymentMethod = match req.method.as_deref().map(str::trim) {
        None | Some("") => return Err(SRError::BadRequest(String::from("method is required"))),
        Some(m) => m.parse()?,
    };
    let currency = Currency::for_country(&country);
    if method == PaymentMethod::MobileMoney && !currency.is_cfa() {
        return Err(SRError::BadRequest(format!("mobile money is not available in {}", country)));
    }
    if settings.price_cents <= 0 {
        return Err(SRError::InternalError(String::from("price is not configured")));
    }

    let eligible = split_eligible(settings, split_payment_allowed);
    let installment = next_installment(succeeded, req.split, eligible)?;
    let amount = currency.from_eur_cents(installment.eur_cents(settings.price_cents));

    Ok(PaymentPlan { country, method, currency, amount, installment })
}

/// Price shown on the paywall for a given country.
#[derive(Debug, Serialize, PartialEq)]
pub struct PriceQuote {
    pub currency: Currency,
    pub amount: i64,
    pub display: String,
    pub split_eligible: bool,
    pub installment_display: Option<String>,
}

pub fn quote(settings: &Settings, country: Option<&str>, split_payment_allowed: bool) -> PriceQuote {
    let currency = country.and_then(normalize_country).map(|c| Currency::for_country(&c)).unwrap_or(Currency::Eur);
    let amount = currency.from_eur_cents(settings.price_cents);
    let eligible = split_eligible(settings, split_payment_allowed);
    PriceQuote {
        currency,
        amount,
        display: currency.format(amount),
        split_eligible: eligible,
        installment_display: if eligible {
            Some(currency.format(currency.from_eur_cents(Installment::FirstHalf.eur_cents(settings.price_cents))))
        } else {
            None
        },
    }
}
