use sooro::messages::MessageView;
use sooro::model::ThreadSummary;
use crate::common::{json_error, json_ok_response, setup, user_id, with_test_login};
use rocket::http::{ContentType, Status};
use serial_test::serial;

#[test]
#[serial]
#[ignore = "needs the test database"]
fn student_and_staff_exchange() {
    let client = setup();
    let sent: MessageView = json_ok_response(with_test_login(client.post("/api/messages"), 2)
        .header(ContentType::JSON)
        .body(r#"{"body":"  Bonjour, mon relevé de notes est-il suffisant ?  "}"#));
    assert_eq!("Bonjour, mon relevé de notes est-il suffisant ?", sent.message.body);
    assert!(!sent.from_staff);

    let threads: Vec<ThreadSummary> = json_ok_response(with_test_login(client.get("/api/admin/messages"), 1));
    let thread = threads.iter().find(|t| t.student_id == user_id(2)).unwrap();
    assert_eq!(1, thread.unread);
    assert_eq!("test2@sooro.test", thread.email);

    let ms: Vec<MessageView> = json_ok_response(with_test_login(client.get(format!("/api/admin/messages/{}", user_id(2))), 1));
    assert_eq!(1, ms.len());
    let threads: Vec<ThreadSummary> = json_ok_response(with_test_login(client.get("/api/admin/messages"), 1));
    assert_eq!(0, threads.iter().find(|t| t.student_id == user_id(2)).unwrap().unread);

    let reply: MessageView = json_ok_response(with_test_login(client.post(format!("/api/admin/messages/{}", user_id(2))), 1)
        .header(ContentType::JSON)
        .body(r#"{"body":"Oui, il est complet."}"#));
    assert!(reply.from_staff);

    let unread: i64 = json_ok_response(with_test_login(client.get("/api/messages/unread"), 2));
    assert_eq!(1, unread);
    let since = sent.message.created.to_rfc3339();
    let newer: Vec<MessageView> = json_ok_response(with_test_login(client.get(format!("/api/messages?since={}", urlencode(&since))), 2));
    assert_eq!(vec![reply.clone()], newer);
    let unread: i64 = json_ok_response(with_test_login(client.get("/api/messages/unread"), 2));
    assert_eq!(0, unread);
}

#[test]
#[serial]
#[ignore = "needs the test database"]
fn polling_marks_only_fetched_messages() {
    let client = setup();
    let reply = |body: &'static str| -> MessageView {
        json_ok_response(with_test_login(client.post(format!("/api/admin/messages/{}", user_id(3))), 1)
            .header(ContentType::JSON)
            .body(format!("{{\"body\":\"{}\"}}", body)))
    };
    let first = reply("Votre dossier est en cours d'examen.");
    let second = reply("Pensez à ajouter votre passeport.");

    let since = first.message.created.to_rfc3339();
    let newer: Vec<MessageView> = json_ok_response(with_test_login(client.get(format!("/api/messages?since={}", urlencode(&since))), 3));
    assert_eq!(vec![second], newer);
    let unread: i64 = json_ok_response(with_test_login(client.get("/api/messages/unread"), 3));
    assert_eq!(1, unread);

    let all: Vec<MessageView> = json_ok_response(with_test_login(client.get("/api/messages"), 3));
    assert_eq!(2, all.len());
    let unread: i64 = json_ok_response(with_test_login(client.get("/api/messages/unread"), 3));
    assert_eq!(0, unread);
}

#[test]
#[serial]
#[ignore = "needs the test database"]
fn messages_are_validated() {
    let client = setup();
    json_error(with_test_login(client.post("/api/messages"), 2)
        .header(ContentType::JSON)
        .body(r#"{"body":"   "}"#), Status::BadRequest);
    json_error(with_test_login(client.get("/api/messages?since=yesterday"), 2), Status::BadRequest);
    json_error(with_test_login(client.post(format!("/api/admin/messages/{}", uuid::Uuid::new_v4())), 1)
        .header(ContentType::JSON)
        .body(r#"{"body":"Hello"}"#), Status::NotFound);
}

fn urlencode(s: &str) -> String {
    s.replace('+', "%2B").replace(':', "%3A")
}
