use rocket::serde::DeserializeOwned;
use rocket::local::blocking::{Client, LocalRequest};
use std::env;

use diesel::prelude::*;
use sooro::base::UserContext;
use sooro::model::{Profile, Role};
use sooro::schema::{documents, dossiers, messages, payments, profiles, settings};
use rocket::http::{ContentType, Cookie, Status};
use uuid::Uuid;

pub const TEST_USERS: [u8; 3] = [1, 2, 3];

pub fn user_id(user_idx: u8) -> Uuid {
    Uuid::parse_str(&format!("b9518d55-3256-4b96-81d0-65b1d7c4fb3{}", user_idx)).unwrap()
}

/// Full application, database included. Runs the migrations.
pub fn setup() -> Client {
    env::set_var("ROCKET_PROFILE", "test");

    let rocket = sooro::rocket();
    let client = Client::tracked(rocket).unwrap();
    reset_data();
    client
}

/// Full application talking to the local stub gateway.
pub fn setup_with_gateway() -> Client {
    env::set_var("ROCKET_PROFILE", "test");

    let url = crate::gateway_stub::gateway().url();
    let rocket = sooro::app(sooro::figment().merge(("gateway_url", url)));
    let client = Client::tracked(rocket).unwrap();
    reset_data();
    client
}

/// Routes, templates and services without a database.
pub fn setup_site() -> Client {
    env::set_var("ROCKET_PROFILE", "test");

    let rocket = sooro::site(rocket::custom(sooro::figment()));
    Client::tracked(rocket).unwrap()
}

pub fn with_test_login(req: LocalRequest, user_idx: u8) -> LocalRequest {
    let ctx = UserContext::new(user_id(user_idx), user_idx == 1);
    req.private_cookie(Cookie::new("user", serde_json::to_string(&ctx).unwrap()))
}

pub fn json_ok_response<T>(req: LocalRequest) -> T
where T: Send + DeserializeOwned + 'static {
    let response = req.dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.content_type(), Some(ContentType::JSON));
    response.into_json().unwrap()
}

pub fn json_error(req: LocalRequest, status: Status) -> String {
    let response = req.dispatch();
    assert_eq!(response.status(), status);
    assert_eq!(response.content_type(), Some(ContentType::JSON));
    let body: serde_json::Value = response.into_json().unwrap();
    body["error"].as_str().unwrap().to_owned()
}

pub fn connection() -> PgConnection {
    let url: String = sooro::figment().extract_inner("databases.postgres_main.url").unwrap();
    PgConnection::establish(&url).unwrap()
}

/// Test users 1 (admin), 2 (Senegal) and 3 (France), with no activity and
/// default settings.
pub fn reset_data() {
    let mut c = connection();
    let ids: Vec<Uuid> = TEST_USERS.iter().map(|i| user_id(*i)).collect();

    diesel::delete(payments::table.filter(payments::user_id.eq_any(&ids))).execute(&mut c).unwrap();
    diesel::delete(messages::table.filter(messages::student_id.eq_any(&ids))).execute(&mut c).unwrap();
    diesel::delete(documents::table.filter(documents::owner.eq_any(&ids))).execute(&mut c).unwrap();
    diesel::delete(dossiers::table.filter(dossiers::student_id.eq_any(&ids))).execute(&mut c).unwrap();
    diesel::delete(profiles::table.filter(profiles::id.eq_any(&ids))).execute(&mut c).unwrap();

    for idx in TEST_USERS {
        let (role, country) = match idx {
            1 => (Role::Admin, None),
            2 => (Role::Student, Some(String::from("SN"))),
            _ => (Role::Student, Some(String::from("FR"))),
        };
        let mut p = Profile::new_registration(format!("test{}@sooro.test", idx), format!("Test User {}", idx), String::new(), country, role);
        p.id = user_id(idx);
        diesel::insert_into(profiles::table).values(&p).execute(&mut c).unwrap();
    }

    diesel::update(settings::table.filter(settings::id.eq(1)))
        .set((settings::price_cents.eq(25000_i64),
            settings::split_payment_enabled.eq(false),
            settings::whatsapp_number.eq("33600000000")))
        .execute(&mut c)
        .unwrap();
}
