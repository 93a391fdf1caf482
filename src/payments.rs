use rocket::{Route, State};
use crate::base::*;
use rocket::form::Form;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use crate::gateway::{new_transaction_id, Customer, Gateway};
use crate::model::{Payment, PaymentMethod, PaymentStatus, Profile, Settings};
use crate::paywall::{has_paid, is_premium};
use crate::pricing::{plan_payment, PaymentPlan, PaymentRequest};
use crate::schema::payments::dsl::payments;
use crate::schema::payments as pmts;
use crate::schema::profiles::dsl::profiles;
use crate::schema::profiles as pfls;
use crate::schema::settings::dsl::settings;
use slog_scope::{error, info, warn};
use uuid::Uuid;

use chrono::Utc;
use diesel::prelude::*;

/// What the client needs to continue the payment.
#[derive(Serialize, Deserialize, Debug)]
pub struct PaymentCreated {
    pub id: Uuid,
    pub transaction_id: String,
    pub amount: i64,
    pub currency: String,
    pub display: String,
    pub installment: i16,
    pub status: String,
    pub redirect_url: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Access {
    pub premium: bool,
}

/// Notification posted by the gateway when a transaction moves.
#[derive(FromForm, Debug)]
struct Notification {
    cpm_trans_id: String,
    cpm_site_id: Option<String>,
}

pub async fn load_settings(conn: &MainDbConn) -> SRResult<Settings> {
    let s: Settings = conn.run(|c| settings.first(c)).await?;
    Ok(s)
}

pub fn new_pending(user_id: Uuid, transaction_id: String, plan: &PaymentPlan) -> Payment {
    Payment {
        id: Uuid::new_v4(),
        user_id,
        transaction_id,
        method: plan.method.as_str().to_owned(),
        country: plan.country.clone(),
        amount: plan.amount,
        currency: plan.currency.code().to_owned(),
        installment: plan.installment.as_db(),
        status: PaymentStatus::Pending.as_str().to_owned(),
        payment_url: None,
        created: Utc::now(),
        updated: Utc::now(),
    }
}

/// Link opening a WhatsApp chat with staff, prefilled with the payment reference.
pub fn whatsapp_link(number: &str, transaction_id: &str, plan: &PaymentPlan) -> SRResult<String> {
    let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(SRError::InternalError(String::from("WhatsApp number is not configured")));
    }
    let text = format!(
        "Bonjour, je souhaite régler mon accompagnement Sooro Campus. Référence : {} - Montant : {}",
        transaction_id,
        plan.currency.format(plan.amount)
    );
    let url = reqwest::Url::parse_with_params(&format!("https://wa.me/{}", digits), &[("text", text)])
        .map_err(|e| SRError::InternalError(e.to_string()))?;
    Ok(url.to_string())
}

async fn set_status(id: Uuid, status: PaymentStatus, payment_url: Option<String>, conn: &MainDbConn) -> SRResult<()> {
    conn.run(move |c| {
        diesel::update(payments.filter(pmts::id.eq(id)))
            .set((pmts::status.eq(status.as_str()),
                pmts::payment_url.eq(payment_url),
                pmts::updated.eq(Utc::now())))
            .execute(c)
    }).await?;
    Ok(())
}

#[post("/", data = "<req>")]
async fn create_payment(ctx: UserContext, req: Json<PaymentRequest>, gateway: &State<Gateway>, conn: MainDbConn) -> SRResult<Json<PaymentCreated>>{
    let req = req.into_inner();
    let (profile, current, succeeded) = conn.run(move |c| {
        let profile: Profile = profiles.filter(pfls::id.eq(ctx.user_id)).first(c)?;
        let current: Settings = settings.first(c)?;
        let succeeded: Vec<Payment> = payments
            .filter(pmts::user_id.eq(ctx.user_id))
            .filter(pmts::status.eq(PaymentStatus::Succeeded.as_str()))
            .load(c)?;
        Ok::<_, diesel::result::Error>((profile, current, succeeded))
    }).await?;

    let plan = plan_payment(&req, &current, profile.split_payment_allowed, &succeeded)?;
    let transaction_id = new_transaction_id(Utc::now());
    let whatsapp = if plan.method.uses_gateway() {
        None
    } else {
        Some(whatsapp_link(&current.whatsapp_number, &transaction_id, &plan)?)
    };
    let payment = new_pending(ctx.user_id, transaction_id.clone(), &plan);
    let id = payment.id;
    conn.run(move |c| {
        diesel::insert_into(payments).values(&payment).execute(c)
    }).await?;
    info!("payment {} created for {}: {} {:?} via {}", transaction_id, ctx.user_id, plan.currency.format(plan.amount), plan.installment, plan.method);

    let redirect_url = if let Some(link) = whatsapp {
        link
    } else {
        let customer = Customer { name: &profile.full_name, email: &profile.email };
        match gateway.create_checkout(&transaction_id, &plan, &customer).await {
            Ok(url) => {
                set_status(id, PaymentStatus::Pending, Some(url.clone()), &conn).await?;
                url
            },
            Err(e) => {
                error!("checkout failed for {}: {}", transaction_id, e);
                set_status(id, PaymentStatus::Failed, None, &conn).await?;
                return Err(e);
            },
        }
    };

    Ok(Json(PaymentCreated {
        id,
        transaction_id,
        amount: plan.amount,
        currency: plan.currency.code().to_owned(),
        display: plan.currency.format(plan.amount),
        installment: plan.installment.as_db(),
        status: PaymentStatus::Pending.as_str().to_owned(),
        redirect_url,
    }))
}

#[get("/")]
async fn get_payments(ctx: UserContext, conn: MainDbConn) -> SRResult<Json<Vec<Payment>>>{
    let ps = conn.run(move |c| {
        payments.filter(pmts::user_id.eq(ctx.user_id))
            .order(pmts::created.desc())
            .load::<Payment>(c)
    }).await?;
    Ok(Json(ps))
}

#[get("/access")]
async fn get_access(ctx: UserContext, conn: MainDbConn) -> SRResult<Json<Access>>{
    let paid = if ctx.admin { true } else { has_paid(ctx.user_id, &conn).await? };
    Ok(Json(Access { premium: is_premium(&ctx, paid) }))
}

pub async fn find_by_transaction(transaction_id: String, conn: &MainDbConn) -> SRResult<Option<Payment>> {
    let p = conn.run(move |c| {
        payments.filter(pmts::transaction_id.eq(transaction_id)).first::<Payment>(c).optional()
    }).await?;
    Ok(p)
}

/// Re-checks a pending gateway payment and records a final outcome. Rows
/// that already left `pending` are never touched.
pub async fn sync_with_gateway(payment: Payment, gateway: &Gateway, conn: &MainDbConn) -> SRResult<Payment> {
    let method: PaymentMethod = payment.method.parse()?;
    if payment.status != PaymentStatus::Pending.as_str() || !method.uses_gateway() {
        return Ok(payment);
    }
    let status = gateway.check(&payment.transaction_id).await?;
    if status == PaymentStatus::Pending {
        return Ok(payment);
    }
    let id = payment.id;
    let updated: Option<Payment> = conn.run(move |c| {
        diesel::update(payments.filter(pmts::id.eq(id)).filter(pmts::status.eq(PaymentStatus::Pending.as_str())))
            .set((pmts::status.eq(status.as_str()), pmts::updated.eq(Utc::now())))
            .get_result(c)
            .optional()
    }).await?;
    match updated {
        Some(p) => {
            info!("payment {} is now {}", p.transaction_id, p.status);
            Ok(p)
        },
        None => Ok(payment),
    }
}

#[post("/webhook", data = "<notification>")]
async fn webhook(notification: Form<Notification>, gateway: &State<Gateway>, conn: MainDbConn) -> SRResult<Status>{
    let notification = notification.into_inner();
    if let Some(site) = notification.cpm_site_id.as_deref() {
        if site != gateway.site_id() {
            warn!("notification for foreign site {} ignored", site);
            return Ok(Status::Ok);
        }
    }
    let payment = find_by_transaction(notification.cpm_trans_id, &conn).await?
        .ok_or(SRError::NotFoundError)?;
    sync_with_gateway(payment, gateway, &conn).await?;
    Ok(Status::Ok)
}

pub fn routes() -> Vec<Route> {
    routes![create_payment, get_payments, get_access, webhook]
}
