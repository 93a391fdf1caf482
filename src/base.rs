use rocket::serde::{Deserialize, Serialize};
use rocket::serde::json::Json;

use std::io::Error as IOError;
use diesel::result::Error as DieselError;
use rocket::fairing::Fairing;
use rocket::http::Status;
use rocket::outcome::IntoOutcome;
use rocket::request::{self, FromRequest, Request};
use rocket::response::{self, status, Responder};
use rocket::{Phase, Rocket};
use rocket_sync_db_pools::database;
use rusoto_core::RusotoError;
use slog_scope::{error, warn};
use thiserror::Error;
use uuid::Uuid;

use crate::model::UnknownVariant;

pub const COOKIE: &str = "user";

/// The signed-in user, kept in a private cookie.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct UserContext {
    pub user_id: Uuid,
    pub admin: bool,
}

impl UserContext {
    pub fn new(user_id: Uuid, admin: bool) -> Self {
        UserContext { user_id, admin }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UserContext {
    type Error = SRError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let ouc = request
            .cookies()
            .get_private(COOKIE)
            .and_then(|s| serde_json::from_str::<UserContext>(s.value()).ok());

        if request.uri().path().as_str() == "/" {
            ouc.or_forward(Status::Unauthorized)
        } else {
            ouc.or_error((Status::Unauthorized, SRError::UnauthorizedError))
        }
    }
}

/// A signed-in staff member.
#[derive(Debug, Clone, Copy)]
pub struct AdminContext(pub UserContext);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminContext {
    type Error = SRError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match request.guard::<UserContext>().await {
            request::Outcome::Success(ctx) if ctx.admin => request::Outcome::Success(AdminContext(ctx)),
            request::Outcome::Success(_) => request::Outcome::Error((Status::Forbidden, SRError::Forbidden)),
            request::Outcome::Error(e) => request::Outcome::Error(e),
            request::Outcome::Forward(s) => request::Outcome::Forward(s),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub app_url: String,
    pub gateway_url: String,
    pub gateway_api_key: String,
    pub gateway_site_id: String,
    pub storage_bucket: String,
    pub storage_region: String,
    pub storage_endpoint: Option<String>,
    pub storage_access_key: String,
    pub storage_secret_key: String,
    pub signed_url_minutes: u64,
    pub max_upload_mb: u64,
    #[serde(default)]
    pub admin_emails: Vec<String>,
}

impl Config {
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|a| a.eq_ignore_ascii_case(email))
    }

    pub fn app_link(&self, path: &str) -> String {
        format!("{}{}", self.app_url.trim_end_matches('/'), path)
    }
}

#[database("postgres_main")]
pub struct MainDbPool(diesel::PgConnection);

/// A pooled connection to the main database.
///
/// Unlike the pool's own guard this is not a sentinel: the site ignites
/// without the database fairing, and the guard then fails (500, or `None`
/// when optional).
pub struct MainDbConn(MainDbPool);

impl MainDbConn {
    pub fn fairing() -> impl Fairing {
        MainDbPool::fairing()
    }

    pub async fn get_one<P: Phase>(rocket: &Rocket<P>) -> Option<Self> {
        MainDbPool::get_one(rocket).await.map(MainDbConn)
    }

    pub async fn run<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut diesel::PgConnection) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.0.run(f).await
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for MainDbConn {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        request.guard::<MainDbPool>().await.map(MainDbConn)
    }
}

#[derive(Debug, Error)]
pub enum SRError{
    #[error("{0}")]
    DatabaseError(String),
    #[error("{0}")]
    IOError(String),
    #[error("{0}")]
    UuidError(String),
    #[error("storage: {0}")]
    StorageError(String),
    #[error("payment gateway: {0}")]
    GatewayError(String),
    #[error("{0}")]
    InternalError(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Unauthorized")]
    UnauthorizedError,
    #[error("Forbidden")]
    Forbidden,
    #[error("Payment required")]
    PaymentRequired,
    #[error("Not Found")]
    NotFoundError,
    #[error("{0}")]
    Conflict(String),
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
}

impl SRError {
    pub fn status(&self) -> Status {
        match self {
            SRError::BadRequest(_) | SRError::UuidError(_) => Status::BadRequest,
            SRError::UnauthorizedError => Status::Unauthorized,
            SRError::PaymentRequired => Status::PaymentRequired,
            SRError::Forbidden => Status::Forbidden,
            SRError::NotFoundError => Status::NotFound,
            SRError::Conflict(_) => Status::Conflict,
            _ => Status::InternalServerError,
        }
    }

    /// The message shown to clients; server-side failures stay in the log.
    pub fn public_message(&self) -> String {
        if self.status() != Status::InternalServerError {
            return self.to_string();
        }
        match self {
            SRError::GatewayError(_) => String::from("The payment could not be initiated, please try again later"),
            _ => String::from("Internal error"),
        }
    }
}

impl<'r,'o: 'r> Responder<'r,'o> for SRError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        if status == Status::InternalServerError {
            error!("{} {}: {}", request.method(), request.uri(), self);
        } else {
            warn!("{} {}: {}", request.method(), request.uri(), self);
        }
        status::Custom(status, Json(ErrorBody { error: self.public_message() })).respond_to(request)
    }
}

impl From<DieselError> for SRError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::NotFound => SRError::NotFoundError,
            e => SRError::DatabaseError(e.to_string()),
        }
    }
}

impl From<IOError> for SRError {
    fn from(e: IOError) -> Self {
        SRError::IOError(e.to_string())
    }
}

impl From<uuid::Error> for SRError {
    fn from(e: uuid::Error) -> Self {
        SRError::UuidError(e.to_string())
    }
}

impl From<UnknownVariant> for SRError {
    fn from(e: UnknownVariant) -> Self {
        SRError::BadRequest(e.to_string())
    }
}

impl From<reqwest::Error> for SRError {
    fn from(e: reqwest::Error) -> Self {
        SRError::GatewayError(e.to_string())
    }
}

impl<E: std::error::Error + 'static> From<RusotoError<E>> for SRError {
    fn from(e: RusotoError<E>) -> Self {
        SRError::StorageError(e.to_string())
    }
}

impl From<argon2::password_hash::Error> for SRError {
    fn from(e: argon2::password_hash::Error) -> Self {
        SRError::InternalError(e.to_string())
    }
}

pub type SRResult<T> = std::result::Result<T, SRError>;

pub fn bad_request<T, S: Into<String>>(msg: S) -> SRResult<T> {
    Err(SRError::BadRequest(msg.into()))
}

/// Trims an optional form value, turning blank input into `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

/// Paging parameters shared by the listing endpoints.
pub fn page(limit: Option<usize>, offset: Option<i64>) -> (i64, i64) {
    (limit.unwrap_or(20).min(100) as i64, offset.unwrap_or(0).max(0))
}
