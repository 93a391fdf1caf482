use sooro::model::Profile;
use crate::common::{json_error, json_ok_response, setup, with_test_login};
use rocket::http::{ContentType, Status};
use serial_test::serial;

#[test]
#[serial]
#[ignore = "needs the test database"]
fn get_profile() {
    let client = setup();
    let u: Profile = json_ok_response(with_test_login(client.get("/api/profile"), 1));
    assert_eq!("b9518d55-3256-4b96-81d0-65b1d7c4fb31", &u.id.to_string());
    assert_eq!("test1@sooro.test", &u.email);
    assert_eq!("Test User 1", &u.full_name);
    assert!(u.is_admin());
}

#[test]
#[serial]
#[ignore = "needs the test database"]
fn update_profile() {
    let client = setup();
    let u: Profile = json_ok_response(with_test_login(client.put("/api/profile"), 2)
        .header(ContentType::JSON)
        .body(r#"{"full_name":" Awa Diop ","phone":"+221770000000","country":"ci"}"#));
    assert_eq!("Awa Diop", &u.full_name);
    assert_eq!(Some(String::from("+221770000000")), u.phone);
    assert_eq!(Some(String::from("CI")), u.country);

    let u: Profile = json_ok_response(with_test_login(client.put("/api/profile"), 2)
        .header(ContentType::JSON)
        .body("{}"));
    assert_eq!("Awa Diop", &u.full_name);

    let err = json_error(with_test_login(client.put("/api/profile"), 2)
        .header(ContentType::JSON)
        .body(r#"{"country":"Senegal"}"#), Status::BadRequest);
    assert!(err.contains("invalid country"));
}
