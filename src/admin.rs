//! Back-office APIs. Every route requires a staff session.
use rocket::{Route, State};
use crate::base::*;
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use crate::docs::list_documents;
use crate::messages::{list_threads, load_thread, parse_since, post_message, MessageView, NewMessage};
use crate::model::{Dossier, DossierStatus, DossierStatusForm, DocumentView, Payment, PaymentStatus, PaymentStatusForm,
    Profile, ProfileAdminForm, Role, Settings, SettingsForm, ThreadSummary};
use crate::payments::load_settings;
use crate::pricing::Currency;
use crate::schema::dossiers::dsl::dossiers;
use crate::schema::dossiers as dsrs;
use crate::schema::payments::dsl::payments;
use crate::schema::payments as pmts;
use crate::schema::profiles::dsl::profiles;
use crate::schema::profiles as pfls;
use crate::schema::settings::dsl::settings;
use crate::schema::settings as stgs;
use crate::storage::Storage;
use slog_scope::{info, warn};
use std::collections::BTreeMap;
use uuid::Uuid;

use chrono::Utc;
use diesel::dsl::count_star;
use diesel::pg::Pg;
use diesel::prelude::*;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct Revenue {
    pub currency: String,
    pub amount: i64,
    pub display: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AdminStats {
    pub students: i64,
    pub dossiers: BTreeMap<String, i64>,
    pub pending_payments: i64,
    pub succeeded_payments: i64,
    pub revenue: Vec<Revenue>,
}

/// A dossier with the student it belongs to.
#[derive(Serialize, Deserialize, Debug)]
pub struct DossierRow {
    #[serde(flatten)]
    pub dossier: Dossier,
    pub email: String,
    pub full_name: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PaymentRow {
    #[serde(flatten)]
    pub payment: Payment,
    pub email: String,
    pub full_name: String,
}

/// Every dossier status with its count, zero included.
pub fn dossier_counts(rows: Vec<(String, i64)>) -> BTreeMap<String, i64> {
    let mut counts: BTreeMap<String, i64> = DossierStatus::ALL.iter().map(|s| (s.as_str().to_owned(), 0)).collect();
    for (status, cnt) in rows {
        *counts.entry(status).or_insert(0) += cnt;
    }
    counts
}

/// Sums succeeded amounts per currency.
pub fn revenue_by_currency(rows: Vec<(String, i64)>) -> Vec<Revenue> {
    let mut sums: BTreeMap<String, i64> = BTreeMap::new();
    for (currency, amount) in rows {
        *sums.entry(currency).or_insert(0) += amount;
    }
    sums.into_iter()
        .map(|(currency, amount)| {
            let display = match currency.as_str() {
                "XOF" => Currency::Xof.format(amount),
                "XAF" => Currency::Xaf.format(amount),
                "EUR" => Currency::Eur.format(amount),
                other => format!("{} {}", amount, other),
            };
            Revenue { currency, amount, display }
        })
        .collect()
}

pub async fn load_stats(conn: &MainDbConn) -> SRResult<AdminStats> {
    let stats = conn.run(|c| {
        let students: i64 = profiles.filter(pfls::role.eq(Role::Student.as_str())).count().get_result(c)?;
        let per_status = dossiers
            .group_by(dsrs::status)
            .select((dsrs::status, count_star()))
            .load::<(String, i64)>(c)?;
        let pending_payments: i64 = payments.filter(pmts::status.eq(PaymentStatus::Pending.as_str())).count().get_result(c)?;
        let succeeded = payments
            .filter(pmts::status.eq(PaymentStatus::Succeeded.as_str()))
            .select((pmts::currency, pmts::amount))
            .load::<(String, i64)>(c)?;
        Ok::<_, diesel::result::Error>(AdminStats {
            students,
            dossiers: dossier_counts(per_status),
            pending_payments,
            succeeded_payments: succeeded.len() as i64,
            revenue: revenue_by_currency(succeeded),
        })
    }).await?;
    Ok(stats)
}

#[get("/stats")]
async fn get_stats(_admin: AdminContext, conn: MainDbConn) -> SRResult<Json<AdminStats>>{
    Ok(Json(load_stats(&conn).await?))
}

fn parse_filter<T: std::str::FromStr<Err = crate::model::UnknownVariant>>(value: Option<&str>) -> SRResult<Option<T>> {
    Ok(match non_blank(value.map(String::from)) {
        Some(v) => Some(v.parse()?),
        None => None,
    })
}

#[get("/dossiers?<status>&<limit>&<offset>")]
async fn get_dossiers(_admin: AdminContext, status: Option<&str>, limit: Option<usize>, offset: Option<i64>, conn: MainDbConn) -> SRResult<Json<Vec<DossierRow>>>{
    let status: Option<DossierStatus> = parse_filter(status)?;
    let (limit, offset) = page(limit, offset);
    let rows = conn.run(move |c| {
        let mut q = dossiers.inner_join(profiles)
            .select((dsrs::all_columns, pfls::email, pfls::full_name))
            .into_boxed::<Pg>();
        if let Some(s) = status {
            q = q.filter(dsrs::status.eq(s.as_str()));
        }
        q.order(dsrs::updated.desc())
            .limit(limit)
            .offset(offset)
            .load::<(Dossier, String, String)>(c)
    }).await?;
    Ok(Json(rows.into_iter().map(|(dossier, email, full_name)| DossierRow { dossier, email, full_name }).collect()))
}

#[get("/dossiers/count?<status>")]
async fn count_dossiers(_admin: AdminContext, status: Option<&str>, conn: MainDbConn) -> SRResult<Json<i64>>{
    let status: Option<DossierStatus> = parse_filter(status)?;
    let cnt: i64 = conn.run(move |c| {
        let mut q = dossiers.into_boxed::<Pg>();
        if let Some(s) = status {
            q = q.filter(dsrs::status.eq(s.as_str()));
        }
        q.count().get_result(c)
    }).await?;
    Ok(Json(cnt))
}

#[put("/dossiers/<id>/status", data = "<form>")]
async fn update_dossier_status(admin: AdminContext, id: &str, form: Json<DossierStatusForm>, conn: MainDbConn) -> SRResult<Json<Dossier>>{
    let id = Uuid::parse_str(id)?;
    let form = form.into_inner();
    let status: DossierStatus = form.status.parse()?;
    let note = non_blank(form.note);
    let d: Dossier = conn.run(move |c| {
        let target = dossiers.filter(dsrs::id.eq(id));
        match note {
            Some(note) => diesel::update(target)
                .set((dsrs::status.eq(status.as_str()), dsrs::staff_note.eq(note), dsrs::updated.eq(Utc::now())))
                .get_result(c),
            None => diesel::update(target)
                .set((dsrs::status.eq(status.as_str()), dsrs::updated.eq(Utc::now())))
                .get_result(c),
        }
    }).await?;
    info!("dossier {} set to {} by {}", id, status, admin.0.user_id);
    Ok(Json(d))
}

#[get("/payments?<status>&<limit>&<offset>")]
async fn get_payments(_admin: AdminContext, status: Option<&str>, limit: Option<usize>, offset: Option<i64>, conn: MainDbConn) -> SRResult<Json<Vec<PaymentRow>>>{
    let status: Option<PaymentStatus> = parse_filter(status)?;
    let (limit, offset) = page(limit, offset);
    let rows = conn.run(move |c| {
        let mut q = payments.inner_join(profiles)
            .select((pmts::all_columns, pfls::email, pfls::full_name))
            .into_boxed::<Pg>();
        if let Some(s) = status {
            q = q.filter(pmts::status.eq(s.as_str()));
        }
        q.order(pmts::created.desc())
            .limit(limit)
            .offset(offset)
            .load::<(Payment, String, String)>(c)
    }).await?;
    Ok(Json(rows.into_iter().map(|(payment, email, full_name)| PaymentRow { payment, email, full_name }).collect()))
}

/// Manual confirmation, used for WhatsApp payments and gateway disputes.
#[put("/payments/<id>/status", data = "<form>")]
async fn update_payment_status(admin: AdminContext, id: &str, form: Json<PaymentStatusForm>, conn: MainDbConn) -> SRResult<Json<Payment>>{
    let id = Uuid::parse_str(id)?;
    let status: PaymentStatus = form.status.parse()?;
    let (before, after): (Payment, Payment) = conn.run(move |c| {
        let before: Payment = payments.filter(pmts::id.eq(id)).first(c)?;
        let after = diesel::update(payments.filter(pmts::id.eq(id)))
            .set((pmts::status.eq(status.as_str()), pmts::updated.eq(Utc::now())))
            .get_result(c)?;
        Ok::<_, diesel::result::Error>((before, after))
    }).await?;
    if before.is_succeeded() && !after.is_succeeded() {
        warn!("payment {} reverted from succeeded to {} by {}", after.transaction_id, status, admin.0.user_id);
    } else {
        info!("payment {} set to {} by {}", after.transaction_id, status, admin.0.user_id);
    }
    Ok(Json(after))
}

#[get("/users?<limit>&<offset>")]
async fn get_users(_admin: AdminContext, limit: Option<usize>, offset: Option<i64>, conn: MainDbConn) -> SRResult<Json<Vec<Profile>>>{
    let (limit, offset) = page(limit, offset);
    let ps = conn.run(move |c| {
        profiles.order(pfls::created.desc())
            .limit(limit)
            .offset(offset)
            .load::<Profile>(c)
    }).await?;
    Ok(Json(ps))
}

/// Validates a role change; staff cannot remove their own access.
pub fn clean_admin_form(admin_id: Uuid, user_id: Uuid, form: ProfileAdminForm) -> SRResult<ProfileAdminForm> {
    let role = match non_blank(form.role) {
        Some(r) => Some(r.parse::<Role>()?),
        None => None,
    };
    if admin_id == user_id && role == Some(Role::Student) {
        return bad_request("you cannot remove your own admin role");
    }
    Ok(ProfileAdminForm { role: role.map(|r| r.as_str().to_owned()), split_payment_allowed: form.split_payment_allowed })
}

#[put("/users/<id>", data = "<form>")]
async fn update_user(admin: AdminContext, id: &str, form: Json<ProfileAdminForm>, conn: MainDbConn) -> SRResult<Json<Profile>>{
    let id = Uuid::parse_str(id)?;
    let form = clean_admin_form(admin.0.user_id, id, form.into_inner())?;
    let log = format!("{:?}", form);
    let u: Profile = conn.run(move |c| {
        if form.role.is_none() && form.split_payment_allowed.is_none() {
            profiles.filter(pfls::id.eq(id)).first(c)
        } else {
            diesel::update(profiles.filter(pfls::id.eq(id)))
                .set(&form)
                .get_result(c)
        }
    }).await?;
    info!("user {} updated by {}: {}", id, admin.0.user_id, log);
    Ok(Json(u))
}

#[get("/users/<id>/docs")]
async fn get_user_docs(_admin: AdminContext, id: &str, storage: &State<Storage>, conn: MainDbConn) -> SRResult<Json<Vec<DocumentView>>>{
    let id = Uuid::parse_str(id)?;
    Ok(Json(list_documents(id, storage, &conn).await?))
}

#[get("/settings")]
async fn get_settings(_admin: AdminContext, conn: MainDbConn) -> SRResult<Json<Settings>>{
    Ok(Json(load_settings(&conn).await?))
}

pub fn clean_settings_form(form: SettingsForm) -> SRResult<SettingsForm> {
    if form.price_cents <= 0 {
        return bad_request("price must be positive");
    }
    let whatsapp_number = form.whatsapp_number.trim().to_owned();
    if !whatsapp_number.chars().any(|c| c.is_ascii_digit())
        || !whatsapp_number.chars().all(|c| c.is_ascii_digit() || c == '+' || c == ' ') {
        return bad_request("invalid WhatsApp number");
    }
    Ok(SettingsForm { whatsapp_number, ..form })
}

#[put("/settings", data = "<form>")]
async fn update_settings(admin: AdminContext, form: Json<SettingsForm>, conn: MainDbConn) -> SRResult<Json<Settings>>{
    let form = clean_settings_form(form.into_inner())?;
    let s: Settings = conn.run(move |c| {
        diesel::update(settings.filter(stgs::id.eq(1)))
            .set((&form, stgs::updated.eq(Utc::now())))
            .get_result(c)
    }).await?;
    info!("settings updated by {}: price {} cents, split {}", admin.0.user_id, s.price_cents, s.split_payment_enabled);
    Ok(Json(s))
}

#[get("/messages")]
async fn get_threads(_admin: AdminContext, conn: MainDbConn) -> SRResult<Json<Vec<ThreadSummary>>>{
    Ok(Json(list_threads(&conn).await?))
}

#[get("/messages/<student>?<since>")]
async fn get_thread(_admin: AdminContext, student: &str, since: Option<&str>, conn: MainDbConn) -> SRResult<Json<Vec<MessageView>>>{
    let student = Uuid::parse_str(student)?;
    let since = parse_since(since)?;
    Ok(Json(load_thread(student, since, true, &conn).await?))
}

#[post("/messages/<student>", data = "<msg>")]
async fn reply(admin: AdminContext, student: &str, msg: Json<NewMessage>, conn: MainDbConn) -> SRResult<Json<MessageView>>{
    let student = Uuid::parse_str(student)?;
    let exists: bool = conn.run(move |c| {
        diesel::select(diesel::dsl::exists(profiles.filter(pfls::id.eq(student)))).get_result(c)
    }).await?;
    if !exists {
        return Err(SRError::NotFoundError);
    }
    Ok(Json(post_message(student, admin.0.user_id, &msg.body, &conn).await?))
}

pub fn routes() -> Vec<Route> {
    routes![get_stats, get_dossiers, count_dossiers, update_dossier_status, get_payments, update_payment_status,
        get_users, update_user, get_user_docs, get_settings, update_settings, get_threads, get_thread, reply]
}
