//! Client for the hosted payment gateway's checkout API.
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use slog_scope::{info, warn};
use std::time::Duration;

use crate::base::{Config, SRError, SRResult};
use crate::model::{PaymentMethod, PaymentStatus};
use crate::pricing::PaymentPlan;

pub struct Gateway {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    site_id: String,
    notify_url: String,
    return_url: String,
}

/// Body of the checkout creation call.
#[derive(Serialize, Debug, PartialEq)]
pub struct CheckoutRequest<'a> {
    pub apikey: &'a str,
    pub site_id: &'a str,
    pub transaction_id: &'a str,
    pub amount: i64,
    pub currency: &'static str,
    pub description: String,
    pub notify_url: &'a str,
    pub return_url: &'a str,
    pub channels: &'static str,
    pub customer_name: &'a str,
    pub customer_email: &'a str,
}

#[derive(Serialize, Debug)]
struct CheckRequest<'a> {
    apikey: &'a str,
    site_id: &'a str,
    transaction_id: &'a str,
}

#[derive(Deserialize, Debug)]
pub struct GatewayResponse<T> {
    pub code: String,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Deserialize, Debug)]
pub struct CheckoutData {
    pub payment_url: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct CheckData {
    pub status: String,
}

/// Who is paying, as shown on the gateway's checkout page.
pub struct Customer<'a> {
    pub name: &'a str,
    pub email: &'a str,
}

impl Gateway {
    pub fn new(config: &Config) -> SRResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Gateway {
            http,
            base_url: config.gateway_url.trim_end_matches('/').to_owned(),
            api_key: config.gateway_api_key.clone(),
            site_id: config.gateway_site_id.clone(),
            notify_url: config.app_link("/api/payments/webhook"),
            return_url: config.app_link("/payments/return"),
        })
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn checkout_request<'a>(&'a self, transaction_id: &'a str, plan: &PaymentPlan, customer: &Customer<'a>) -> CheckoutRequest<'a> {
        CheckoutRequest {
            apikey: &self.api_key,
            site_id: &self.site_id,
            transaction_id,
            amount: plan.currency.to_major_units(plan.amount),
            currency: plan.currency.code(),
            description: format!("Sooro Campus accompaniment ({})", plan.currency.format(plan.amount)),
            notify_url: &self.notify_url,
            return_url: &self.return_url,
            channels: channel(plan.method),
            customer_name: customer.name,
            customer_email: customer.email,
        }
    }

    /// Opens a checkout and returns the URL the student must be sent to.
    pub async fn create_checkout(&self, transaction_id: &str, plan: &PaymentPlan, customer: &Customer<'_>) -> SRResult<String> {
        let body = self.checkout_request(transaction_id, plan, customer);
        let resp: GatewayResponse<CheckoutData> = self.http
            .post(format!("{}/v2/payment", self.base_url))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        let url = checkout_url(resp)?;
        info!("checkout opened for {}", transaction_id);
        Ok(url)
    }

    /// Asks the gateway for the outcome of a transaction.
    pub async fn check(&self, transaction_id: &str) -> SRResult<PaymentStatus> {
        let body = CheckRequest { apikey: &self.api_key, site_id: &self.site_id, transaction_id };
        let resp: GatewayResponse<CheckData> = self.http
            .post(format!("{}/v2/payment/check", self.base_url))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        match resp.data {
            Some(data) => Ok(status_from_gateway(&data.status)),
            None => {
                warn!("no status for {}: {} {}", transaction_id, resp.code, resp.message);
                Ok(PaymentStatus::Pending)
            }
        }
    }
}

fn channel(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::MobileMoney => "MOBILE_MONEY",
        PaymentMethod::Card => "CREDIT_CARD",
        PaymentMethod::Whatsapp => "ALL",
    }
}

/// A checkout is usable only with code 201 and a payment URL.
pub fn checkout_url(resp: GatewayResponse<CheckoutData>) -> SRResult<String> {
    if resp.code != "201" {
        return Err(SRError::GatewayError(format!("{} {}", resp.code, resp.message)));
    }
    resp.data
        .and_then(|d| d.payment_url)
        .filter(|u| u.starts_with("https://") || u.starts_with("http://"))
        .ok_or_else(|| SRError::GatewayError(String::from("no payment url in response")))
}

pub fn status_from_gateway(status: &str) -> PaymentStatus {
    match status {
        "ACCEPTED" => PaymentStatus::Succeeded,
        "REFUSED" | "CANCELLED" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

/// `SC` + UTC timestamp + 6 random alphanumerics, upper-cased.
pub fn new_transaction_id(now: DateTime<Utc>) -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("SC{}{}", now.format("%Y%m%d%H%M%S"), suffix).to_uppercase()
}
