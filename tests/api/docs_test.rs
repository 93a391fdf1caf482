use sooro::docs::DocumentUpload;
use sooro::model::DocumentView;
use crate::common::{json_error, json_ok_response, setup, user_id, with_test_login};
use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::{Client, LocalRequest};
use serial_test::serial;

const BOUNDARY: &str = "---------------------------3511489321811197009899980000";

fn multipart(kind: &str, files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut cnt = vec![];
    cnt.extend(format!("--{}\r\n", BOUNDARY).as_bytes());
    cnt.extend("Content-Disposition: form-data; name=\"kind\"\r\n\r\n".as_bytes());
    cnt.extend(kind.as_bytes());
    for (name, mime, data) in files {
        cnt.extend(format!("\r\n--{}\r\n", BOUNDARY).as_bytes());
        cnt.extend(format!("Content-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n", name).as_bytes());
        cnt.extend(format!("Content-Type: {}\r\n\r\n", mime).as_bytes());
        cnt.extend(*data);
    }
    cnt.extend(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    cnt
}

fn upload<'c>(client: &'c Client, user_idx: u8, cnt: Vec<u8>) -> LocalRequest<'c> {
    with_test_login(client.post("/api/docs"), user_idx)
        .header(ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY)))
        .header(Header::new("Content-Length", format!("{}", cnt.len())))
        .body(cnt)
}

fn count(client: &Client, user_idx: u8) -> i64 {
    json_ok_response(with_test_login(client.get("/api/docs/count"), user_idx))
}

#[test]
#[serial]
#[ignore = "needs the test database"]
fn unsupported_files_are_rejected() {
    let client = setup();
    let cnt = multipart("transcript", &[("notes.txt", "text/plain", &b"18/20 en mathematiques"[..])]);
    let results: Vec<DocumentUpload> = json_ok_response(upload(&client, 2, cnt));
    assert_eq!(vec![DocumentUpload::Rejected { name: String::from("notes.txt") }], results);

    assert_eq!(0, count(&client, 2));
    let docs: Vec<DocumentView> = json_ok_response(with_test_login(client.get("/api/docs"), 2));
    assert!(docs.is_empty());
}

#[test]
#[serial]
#[ignore = "needs the test database"]
fn unknown_kinds_and_documents() {
    let client = setup();
    let cnt = multipart("selfie", &[("me.png", "image/png", &b"\x89PNG"[..])]);
    json_error(upload(&client, 2, cnt), Status::BadRequest);

    json_error(with_test_login(client.delete(format!("/api/docs/{}", uuid::Uuid::new_v4())), 2), Status::NotFound);
}

#[test]
#[serial]
#[ignore = "needs the test database and object store"]
fn upload_get_delete() {
    let client = setup();
    let cnt = multipart("passport", &[("passeport.pdf", "application/pdf", &b"%PDF-1.4 passeport"[..])]);
    let results: Vec<DocumentUpload> = json_ok_response(upload(&client, 2, cnt));
    assert_eq!(1, results.len());
    let id = results[0].get_id().unwrap();
    assert_eq!(1, count(&client, 2));
    assert_eq!(0, count(&client, 3));

    let docs: Vec<DocumentView> = json_ok_response(with_test_login(client.get("/api/docs"), 2));
    assert_eq!(1, docs.len());
    assert_eq!(id, docs[0].document.id);
    assert_eq!("passeport.pdf", docs[0].document.name);
    assert_eq!("passport", docs[0].document.kind);
    assert_eq!(Some(String::from("application/pdf")), docs[0].document.mime);
    assert!(docs[0].url.contains(&id.to_string()));

    let docs: Vec<DocumentView> = json_ok_response(with_test_login(client.get(format!("/api/admin/users/{}/docs", user_id(2))), 1));
    assert_eq!(1, docs.len());
    json_error(with_test_login(client.get(format!("/api/admin/users/{}/docs", user_id(2))), 3), Status::Forbidden);

    json_error(with_test_login(client.delete(format!("/api/docs/{}", id)), 3), Status::NotFound);
    assert_eq!(1, count(&client, 2));

    let response = with_test_login(client.delete(format!("/api/docs/{}", id)), 2).dispatch();
    assert_eq!(response.status(), Status::NoContent);
    assert_eq!(0, count(&client, 2));
    json_error(with_test_login(client.delete(format!("/api/docs/{}", id)), 2), Status::NotFound);
}

#[test]
#[serial]
#[ignore = "needs the test database and object store"]
fn oversized_file_does_not_sink_the_batch() {
    let client = setup();
    // the test profile allows 1 MiB per file
    let scan = vec![0u8; 3 * 1024 * 1024];
    let cnt = multipart("transcript", &[
        ("releve-complet.pdf", "application/pdf", scan.as_slice()),
        ("releve.pdf", "application/pdf", &b"%PDF-1.4 releve"[..]),
    ]);
    let results: Vec<DocumentUpload> = json_ok_response(upload(&client, 3, cnt));
    assert_eq!(2, results.len());
    assert_eq!(DocumentUpload::TooLarge { name: String::from("releve-complet.pdf") }, results[0]);
    assert!(results[1].get_id().is_some());
    assert_eq!(1, count(&client, 3));
}
