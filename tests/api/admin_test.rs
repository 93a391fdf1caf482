use sooro::admin::{AdminStats, DossierRow};
use sooro::model::{Dossier, Profile, Settings};
use crate::common::{json_error, json_ok_response, setup, user_id, with_test_login};
use rocket::http::{ContentType, Status};
use serial_test::serial;

#[test]
#[serial]
#[ignore = "needs the test database"]
fn dossier_review() {
    let client = setup();
    let d: Dossier = json_ok_response(with_test_login(client.put("/api/dossier"), 2)
        .header(ContentType::JSON)
        .body(r#"{"program":"BTS Commerce"}"#));

    let stats: AdminStats = json_ok_response(with_test_login(client.get("/api/admin/stats"), 1));
    assert!(stats.students >= 2);
    assert!(stats.dossiers["draft"] >= 1);

    let d2: Dossier = json_ok_response(with_test_login(client.put(format!("/api/admin/dossiers/{}/status", d.id)), 1)
        .header(ContentType::JSON)
        .body(r#"{"status":"interview_scheduled","note":"Entretien le 12 mars à 10h"}"#));
    assert_eq!("interview_scheduled", d2.status);
    assert_eq!(Some(String::from("Entretien le 12 mars à 10h")), d2.staff_note);

    let rows: Vec<DossierRow> = json_ok_response(with_test_login(client.get("/api/admin/dossiers?status=interview_scheduled"), 1));
    assert!(rows.iter().any(|r| r.dossier.id == d.id && r.email == "test2@sooro.test"));
    let count: i64 = json_ok_response(with_test_login(client.get("/api/admin/dossiers/count?status=interview_scheduled"), 1));
    assert!(count >= 1);

    json_error(with_test_login(client.put(format!("/api/admin/dossiers/{}/status", d.id)), 1)
        .header(ContentType::JSON)
        .body(r#"{"status":"approved"}"#), Status::BadRequest);
    json_error(with_test_login(client.get("/api/admin/dossiers?status=approved"), 1), Status::BadRequest);
}

#[test]
#[serial]
#[ignore = "needs the test database"]
fn user_management() {
    let client = setup();
    let u: Profile = json_ok_response(with_test_login(client.put(format!("/api/admin/users/{}", user_id(3))), 1)
        .header(ContentType::JSON)
        .body(r#"{"split_payment_allowed":true}"#));
    assert!(u.split_payment_allowed);
    assert!(!u.is_admin());

    let err = json_error(with_test_login(client.put(format!("/api/admin/users/{}", user_id(1))), 1)
        .header(ContentType::JSON)
        .body(r#"{"role":"student"}"#), Status::BadRequest);
    assert_eq!("you cannot remove your own admin role", err);

    let users: Vec<Profile> = json_ok_response(with_test_login(client.get("/api/admin/users?limit=100"), 1));
    assert!(users.iter().any(|u| u.id == user_id(2)));

    json_error(with_test_login(client.put(format!("/api/admin/users/{}", uuid::Uuid::new_v4())), 1)
        .header(ContentType::JSON)
        .body(r#"{"role":"admin"}"#), Status::NotFound);
}

#[test]
#[serial]
#[ignore = "needs the test database"]
fn settings_update() {
    let client = setup();
    let s: Settings = json_ok_response(with_test_login(client.get("/api/admin/settings"), 1));
    assert_eq!(25000, s.price_cents);

    json_error(with_test_login(client.put("/api/admin/settings"), 1)
        .header(ContentType::JSON)
        .body(r#"{"price_cents":0,"split_payment_enabled":true,"whatsapp_number":"33600000000"}"#), Status::BadRequest);

    let s: Settings = json_ok_response(with_test_login(client.put("/api/admin/settings"), 1)
        .header(ContentType::JSON)
        .body(r#"{"price_cents":30000,"split_payment_enabled":true,"whatsapp_number":"221770000000"}"#));
    assert_eq!(30000, s.price_cents);
    assert!(s.split_payment_enabled);

    let response = client.get("/pricing").dispatch();
    assert!(response.into_string().unwrap().contains("300.00 EUR"));

    let response = with_test_login(client.get("/admin"), 1).dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert!(response.into_string().unwrap().contains("221770000000"));
}
