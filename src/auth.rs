//! Accounts: registration, password login and logout.
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use diesel::prelude::*;
use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::response::{Flash, Redirect};
use rocket::serde::Serialize;
use rocket::tokio::task::spawn_blocking;
use rocket::{Route, State};
use rocket_dyn_templates::Template;
use slog_scope::{info, warn};

use crate::base::*;
use crate::model::{Profile, Role};
use crate::pricing::normalize_country;
use crate::schema::profiles::dsl::profiles;
use crate::schema::profiles as pfls;

#[derive(FromForm, Debug)]
pub struct Registration {
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub password_confirm: String,
    pub country: Option<String>,
}

#[derive(FromForm, Debug)]
pub struct Login {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Default)]
pub struct AuthContext<'r> {
    pub error: &'r str,
    pub email: &'r str,
    pub full_name: &'r str,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !email.chars().any(char::is_whitespace)
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        _ => false,
    }
}

impl Registration {
    /// Checks the form before any account is created.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !valid_email(&normalize_email(&self.email)) {
            return Err("Please enter a valid e-mail address");
        }
        if self.full_name.trim().is_empty() {
            return Err("Please enter your full name");
        }
        if self.password.chars().count() < 8 {
            return Err("The password must have at least 8 characters");
        }
        if self.password != self.password_confirm {
            return Err("The passwords do not match");
        }
        if let Some(country) = non_blank(self.country.clone()) {
            if normalize_country(&country).is_none() {
                return Err("Please choose a valid country");
            }
        }
        Ok(())
    }
}

pub fn hash_password(password: &str) -> SRResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

async fn hash_blocking(password: String) -> SRResult<String> {
    spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| SRError::InternalError(e.to_string()))?
}

pub fn set_session(cookies: &CookieJar<'_>, ctx: &UserContext) -> SRResult<()> {
    let value = serde_json::to_string(ctx).map_err(|e| SRError::InternalError(e.to_string()))?;
    let c = Cookie::build((COOKIE, value))
        .secure(true)
        .http_only(true)
        .same_site(SameSite::Lax);
    cookies.add_private(c);
    Ok(())
}

fn landing(ctx: &UserContext) -> Redirect {
    if ctx.admin {
        Redirect::to("/admin")
    } else {
        Redirect::to("/dashboard")
    }
}

#[get("/register")]
fn register_page(ctx: Option<UserContext>) -> Result<Redirect, Template> {
    match ctx {
        Some(ctx) => Ok(landing(&ctx)),
        None => Err(Template::render("register", AuthContext::default())),
    }
}

#[post("/register", data = "<form>")]
async fn register(form: Form<Registration>, config: &State<Config>, cookies: &CookieJar<'_>, conn: MainDbConn) -> Result<Redirect, Template> {
    let email = normalize_email(&form.email);
    let render_error = |error: &str| Template::render("register", AuthContext { error, email: &email, full_name: form.full_name.trim() });

    if let Err(error) = form.validate() {
        return Err(render_error(error));
    }

    match create_account(&form, &email, config, &conn).await {
        Ok(ctx) => match set_session(cookies, &ctx) {
            Ok(()) => Ok(landing(&ctx)),
            Err(e) => Err(render_error(&e.public_message())),
        },
        Err(SRError::Conflict(msg)) => Err(render_error(&msg)),
        Err(e) => {
            warn!("registration failed for {}: {}", email, e);
            Err(render_error(&e.public_message()))
        }
    }
}

async fn create_account(form: &Registration, email: &str, config: &Config, conn: &MainDbConn) -> SRResult<UserContext> {
    let addr = email.to_owned();
    let exists: i64 = conn.run(move |c| profiles.filter(pfls::email.eq(addr)).count().get_result(c)).await?;
    if exists > 0 {
        return Err(SRError::Conflict(String::from("An account already exists for this e-mail address")));
    }

    let role = if config.is_admin_email(email) { Role::Admin } else { Role::Student };
    let hash = hash_blocking(form.password.clone()).await?;
    let country = non_blank(form.country.clone()).and_then(|c| normalize_country(&c));
    let profile = Profile::new_registration(email, form.full_name.trim(), hash, country, role);
    let ctx = UserContext::new(profile.id, profile.is_admin());

    conn.run(move |c| {
        diesel::insert_into(profiles)
            .values(&profile)
            .execute(c)
    }).await?;
    info!("account created for {} ({})", email, role);
    Ok(ctx)
}

#[get("/login")]
fn login_page(ctx: Option<UserContext>) -> Result<Redirect, Template> {
    match ctx {
        Some(ctx) => Ok(landing(&ctx)),
        None => Err(Template::render("login", AuthContext::default())),
    }
}

#[post("/login", data = "<form>")]
async fn login(form: Form<Login>, cookies: &CookieJar<'_>, conn: MainDbConn) -> Result<Redirect, Template> {
    let email = normalize_email(&form.email);
    match do_login(&email, &form.password, &conn).await {
        Ok(Some(ctx)) => match set_session(cookies, &ctx) {
            Ok(()) => Ok(landing(&ctx)),
            Err(e) => Err(Template::render("login", AuthContext { error: &e.public_message(), email: &email, full_name: "" })),
        },
        Ok(None) => Err(Template::render("login", AuthContext { error: "Invalid e-mail or password", email: &email, full_name: "" })),
        Err(e) => Err(Template::render("login", AuthContext { error: &e.public_message(), email: &email, full_name: "" })),
    }
}

async fn do_login(email: &str, password: &str, conn: &MainDbConn) -> SRResult<Option<UserContext>> {
    let addr = email.to_owned();
    let ouser: Option<Profile> = conn
        .run(move |c| profiles.filter(pfls::email.eq(addr)).first::<Profile>(c).optional())
        .await?;

    let user = match ouser {
        Some(user) => user,
        None => return Ok(None),
    };
    let pw = password.to_owned();
    let hash = user.password_hash.clone();
    let ok = spawn_blocking(move || verify_password(&pw, &hash))
        .await
        .map_err(|e| SRError::InternalError(e.to_string()))?;
    if !ok {
        warn!("failed login for {}", email);
        return Ok(None);
    }

    let ctx = UserContext::new(user.id, user.is_admin());
    conn.run(move |c| {
        diesel::update(&user)
            .set(pfls::last_login.eq(Utc::now()))
            .execute(c)
    }).await?;
    Ok(Some(ctx))
}

#[get("/logout")]
fn logout(cookies: &CookieJar<'_>) -> Flash<Redirect> {
    cookies.remove_private(COOKIE);
    Flash::success(Redirect::to("/"), "Successfully logged out.")
}

pub fn routes() -> Vec<Route> {
    routes![register_page, register, login_page, login, logout]
}
