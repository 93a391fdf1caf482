use crate::common::{json_error, json_ok_response, setup_site, with_test_login};
use rocket::http::{ContentType, Status};
use serde_json::Value;

#[test]
fn index_logged_out_returns_ok(){
    let client = setup_site();
    let response = client.get("/").dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.content_type(), Some(ContentType::HTML));
    let cnt = response.into_string().unwrap();
    assert!(cnt.contains("The Études en France calendar, month by month"));
    assert!(cnt.contains("/articles/entretien-campus-france"));
    assert!(cnt.contains("/articles/budget-etudiant"));
    assert!(!cnt.contains("/articles/choisir-sa-formation"));
}

#[test]
fn index_logged_in_redirects(){
    let client = setup_site();
    let response = with_test_login(client.get("/"), 2).dispatch();
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(response.headers().get_one("Location"), Some("/dashboard"));

    let response = with_test_login(client.get("/"), 1).dispatch();
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(response.headers().get_one("Location"), Some("/admin"));
}

#[test]
fn pricing_without_database(){
    let client = setup_site();
    let response = client.get("/pricing").dispatch();
    assert_eq!(response.status(), Status::Ok);
    let cnt = response.into_string().unwrap();
    assert!(cnt.contains("momentanément indisponible"));
    assert!(cnt.contains("href=\"/register\""));
}

#[test]
fn articles_are_public(){
    let client = setup_site();
    let response = client.get("/articles").dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert!(response.into_string().unwrap().contains("/articles/choisir-sa-formation"));

    let response = client.get("/articles/entretien-campus-france").dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert!(response.into_string().unwrap().contains("Preparing the Campus France interview"));

    let response = client.get("/articles/nope").dispatch();
    assert_eq!(response.status(), Status::NotFound);
    assert_eq!(response.content_type(), Some(ContentType::HTML));
}

#[test]
fn articles_api(){
    let client = setup_site();
    let articles: Vec<Value> = json_ok_response(client.get("/api/articles"));
    assert_eq!(4, articles.len());
    assert_eq!("calendrier-eef", articles[0]["slug"]);
    assert!(articles[0].get("body").is_none());

    let article: Value = json_ok_response(client.get("/api/articles/budget-etudiant"));
    assert!(article["body"].as_array().map_or(false, |b| !b.is_empty()));

    assert_eq!("Not Found", json_error(client.get("/api/articles/nope"), Status::NotFound));
}

#[test]
fn api_unauthorized(){
    let client = setup_site();
    assert_eq!("Unauthorized", json_error(client.get("/api/profile"), Status::Unauthorized));
    json_error(client.get("/api/payments"), Status::Unauthorized);
    json_error(client.get("/api/resources"), Status::Unauthorized);
    json_error(client.get("/api/messages"), Status::Unauthorized);
}

#[test]
fn api_forbidden_for_students(){
    let client = setup_site();
    json_error(with_test_login(client.get("/api/admin/stats"), 2), Status::Forbidden);
    json_error(with_test_login(client.put("/api/admin/settings"), 3), Status::Forbidden);
}

#[test]
fn site_unauthorized(){
    let client = setup_site();
    for page in ["/dashboard", "/profile", "/documents", "/messages", "/paywall", "/resources", "/admin"] {
        let response = client.get(page).dispatch();
        assert_eq!(response.status(), Status::SeeOther, "{}", page);
        assert_eq!(response.headers().get_one("Location"), Some("/login"), "{}", page);
    }
}

#[test]
fn admin_page_forbidden_for_students(){
    let client = setup_site();
    let response = with_test_login(client.get("/admin"), 2).dispatch();
    assert_eq!(response.status(), Status::Forbidden);
    assert_eq!(response.content_type(), Some(ContentType::HTML));
}

#[test]
fn login_and_register_pages(){
    let client = setup_site();
    let response = client.get("/login").dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert!(response.into_string().unwrap().contains("<input id=\"email\" name=\"email\" type=\"email\""));

    let response = client.get("/register").dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert!(response.into_string().unwrap().contains("name=\"password_confirm\""));

    let response = with_test_login(client.get("/login"), 2).dispatch();
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(response.headers().get_one("Location"), Some("/dashboard"));
}

#[test]
fn logout_redirects_home(){
    let client = setup_site();
    let response = with_test_login(client.get("/logout"), 2).dispatch();
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(response.headers().get_one("Location"), Some("/"));
}

#[test]
fn gateway_return_is_redirected(){
    let client = setup_site();
    let response = client.post("/payments/return")
        .header(ContentType::Form)
        .body("transaction_id=SC20240901120000ABC123")
        .dispatch();
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(response.headers().get_one("Location"), Some("/payments/return?transaction_id=SC20240901120000ABC123"));
}

#[test]
fn static_files_are_served(){
    let client = setup_site();
    let response = client.get("/static/style.css").dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.content_type(), Some(ContentType::CSS));
}

#[test]
fn database_routes_fail_cleanly_without_database(){
    let client = setup_site();
    assert_eq!("Internal Server Error", json_error(with_test_login(client.get("/api/profile"), 2), Status::InternalServerError));
    let response = with_test_login(client.get("/dashboard"), 2).dispatch();
    assert_eq!(response.status(), Status::InternalServerError);
    assert_eq!(response.content_type(), Some(ContentType::HTML));
}
