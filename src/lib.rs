#[macro_use]
extern crate rocket;
#[macro_use]
extern crate diesel;

use figment::providers::Env;
use figment::Figment;
use rocket::data::ToByteUnit;
use rocket::fairing::AdHoc;
use rocket::form::Form;
use rocket::fs::{relative, NamedFile};
use rocket::http::Status;
use rocket::request::{FlashMessage, Request};
use rocket::response::{status, status::NotFound, Redirect};
use rocket::serde::json::Json;
use rocket::serde::Serialize;
use rocket::State;
use rocket::{Build, Rocket};
use rocket_dyn_templates::Template;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use slog_scope::{error, info, warn};

pub mod base;
use base::*;

pub mod model;
use model::{Dossier, DossierStatus, DocumentKind, DocumentView, Payment, Profile, Settings};
pub mod schema;
use schema::documents::dsl::documents;
use schema::documents as docs_t;
use schema::dossiers::dsl::dossiers as dsrs_t;
use schema::dossiers as dsrs;
use schema::messages::dsl::messages as msgs_t;
use schema::messages as msgs;
use schema::payments::dsl::payments as pmts_t;
use schema::payments as pmts;
use schema::profiles::dsl::profiles as pfls_t;
use schema::profiles as pfls;

pub mod admin;
pub mod auth;
pub mod content;
pub mod docs;
pub mod dossiers;
pub mod gateway;
pub mod messages;
pub mod payments;
pub mod paywall;
pub mod pricing;
pub mod profiles;
pub mod storage;

use content::{ArticlePreview, ResourceKind};
use gateway::Gateway;
use messages::MessageView;
use paywall::PremiumContext;
use pricing::{quote, PriceQuote};
use storage::Storage;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Countries whose prices are shown to visitors, one per currency.
const SHOWCASE_COUNTRIES: &[&str] = &["FR", "SN", "CM"];

#[get("/static/<path..>", rank = 3)]
async fn static_files(path: PathBuf) -> Result<NamedFile, NotFound<String>> {
    let path = Path::new(relative!("site")).join(path);
    NamedFile::open(path)
        .await
        .map_err(|e| NotFound(e.to_string()))
}

#[get("/favicon.ico")]
async fn favicon() -> Result<NamedFile, NotFound<String>> {
    static_files(PathBuf::from("favicon.ico")).await
}

#[derive(Serialize)]
struct HomeContext<'r> {
    message: &'r str,
    prices: Vec<PriceQuote>,
    articles: Vec<ArticlePreview>,
}

/// Public prices, when the database can be reached.
async fn showcase_prices(conn: Option<MainDbConn>) -> Vec<PriceQuote> {
    let conn = match conn {
        Some(conn) => conn,
        None => return vec![],
    };
    match payments::load_settings(&conn).await {
        Ok(s) => SHOWCASE_COUNTRIES.iter().map(|c| quote(&s, Some(c), false)).collect(),
        Err(e) => {
            warn!("prices unavailable: {}", e);
            vec![]
        }
    }
}

#[get("/", rank = 2)]
async fn index(flash: Option<FlashMessage<'_>>, conn: Option<MainDbConn>) -> Template {
    let message = flash.map(|f| f.message().to_string()).unwrap_or_default();
    let ctx = HomeContext {
        message: &message,
        prices: showcase_prices(conn).await,
        articles: content::latest_articles(3),
    };
    Template::render("index", &ctx)
}

#[get("/")]
fn index_user(ctx: UserContext) -> Redirect {
    if ctx.admin {
        Redirect::to("/admin")
    } else {
        Redirect::to("/dashboard")
    }
}

#[get("/pricing")]
async fn pricing_page(ctx: Option<UserContext>, conn: Option<MainDbConn>) -> Template {
    let ctx = HomeContext {
        message: if ctx.is_some() { "signed_in" } else { "" },
        prices: showcase_prices(conn).await,
        articles: content::latest_articles(3),
    };
    Template::render("pricing", &ctx)
}

#[derive(Serialize)]
struct ArticlesContext {
    articles: Vec<ArticlePreview>,
}

#[get("/articles")]
fn articles_page() -> Template {
    Template::render("articles", &ArticlesContext { articles: content::latest_articles(usize::MAX) })
}

#[get("/articles/<slug>")]
fn article_page(slug: &str) -> Option<Template> {
    content::article(slug).map(|a| Template::render("article", a))
}

#[derive(Serialize)]
struct DashboardContext {
    profile: Profile,
    dossier: Option<Dossier>,
    documents: i64,
    payments: Vec<Payment>,
    unread: i64,
    premium: bool,
}

#[get("/dashboard")]
async fn dashboard(ctx: UserContext, conn: MainDbConn) -> SRResult<Template> {
    let (profile, dossier, documents_count, ps, unread) = conn.run(move |c| {
        let profile: Profile = pfls_t.filter(pfls::id.eq(ctx.user_id)).first(c)?;
        let dossier: Option<Dossier> = dsrs_t.filter(dsrs::student_id.eq(ctx.user_id)).first(c).optional()?;
        let documents_count: i64 = documents.filter(docs_t::owner.eq(ctx.user_id)).count().get_result(c)?;
        let ps: Vec<Payment> = pmts_t.filter(pmts::user_id.eq(ctx.user_id)).order(pmts::created.desc()).load(c)?;
        let unread: i64 = msgs_t.filter(msgs::student_id.eq(ctx.user_id))
            .filter(msgs::read_at.is_null())
            .filter(msgs::sender_id.ne(msgs::student_id))
            .count().get_result(c)?;
        Ok::<_, diesel::result::Error>((profile, dossier, documents_count, ps, unread))
    }).await?;
    let premium = paywall::is_premium(&ctx, ps.iter().any(Payment::is_succeeded));
    Ok(Template::render("dashboard", &DashboardContext { profile, dossier, documents: documents_count, payments: ps, unread, premium }))
}

#[derive(Serialize)]
struct PaywallContext {
    profile: Profile,
    price: PriceQuote,
    mobile_money: bool,
    whatsapp_number: String,
}

#[get("/paywall")]
async fn paywall_page(ctx: UserContext, conn: MainDbConn) -> SRResult<Result<Template, Redirect>> {
    if paywall::is_premium(&ctx, paywall::has_paid(ctx.user_id, &conn).await?) {
        return Ok(Err(Redirect::to("/resources")));
    }
    let profile: Profile = conn.run(move |c| pfls_t.filter(pfls::id.eq(ctx.user_id)).first(c)).await?;
    let settings: Settings = payments::load_settings(&conn).await?;
    let price = quote(&settings, profile.country.as_deref(), profile.split_payment_allowed);
    let mobile_money = price.currency != pricing::Currency::Eur;
    Ok(Ok(Template::render("paywall", &PaywallContext {
        profile,
        price,
        mobile_money,
        whatsapp_number: settings.whatsapp_number,
    })))
}

#[derive(Serialize)]
struct ResourcesContext {
    kind: Option<ResourceKind>,
    resources: Vec<content::ResourceSummary>,
}

#[get("/resources?<kind>")]
fn resources_page(_ctx: PremiumContext, kind: Option<&str>) -> SRResult<Template> {
    let kind: Option<ResourceKind> = non_blank(kind.map(String::from)).map(|k| k.parse()).transpose()?;
    Ok(Template::render("resources", &ResourcesContext { kind, resources: content::resources(kind) }))
}

#[get("/resources/<slug>")]
fn resource_page(_ctx: PremiumContext, slug: &str) -> Option<Template> {
    content::resource(slug).map(|r| Template::render("resource", r))
}

#[derive(Serialize)]
struct DocumentsContext {
    documents: Vec<DocumentView>,
    kinds: Vec<&'static str>,
    max_upload_mb: u64,
}

#[get("/documents")]
async fn documents_page(ctx: UserContext, config: &State<Config>, storage: &State<Storage>, conn: MainDbConn) -> SRResult<Template> {
    let documents_list = docs::list_documents(ctx.user_id, storage, &conn).await?;
    Ok(Template::render("documents", &DocumentsContext {
        documents: documents_list,
        kinds: DocumentKind::ALL.iter().map(DocumentKind::as_str).collect(),
        max_upload_mb: config.max_upload_mb,
    }))
}

#[derive(Serialize)]
struct MessagesContext {
    messages: Vec<MessageView>,
    last: Option<DateTime<Utc>>,
}

#[get("/messages")]
async fn messages_page(ctx: UserContext, conn: MainDbConn) -> SRResult<Template> {
    let thread = messages::load_thread(ctx.user_id, None, false, &conn).await?;
    let last = thread.last().map(|m| m.message.created);
    Ok(Template::render("messages", &MessagesContext { messages: thread, last }))
}

#[derive(Serialize)]
struct ProfileContext {
    profile: Profile,
    dossier: Option<Dossier>,
    statuses: Vec<&'static str>,
}

#[get("/profile")]
async fn profile_page(ctx: UserContext, conn: MainDbConn) -> SRResult<Template> {
    let (profile, dossier) = conn.run(move |c| {
        let profile: Profile = pfls_t.filter(pfls::id.eq(ctx.user_id)).first(c)?;
        let dossier: Option<Dossier> = dsrs_t.filter(dsrs::student_id.eq(ctx.user_id)).first(c).optional()?;
        Ok::<_, diesel::result::Error>((profile, dossier))
    }).await?;
    Ok(Template::render("profile", &ProfileContext {
        profile,
        dossier,
        statuses: DossierStatus::ALL.iter().map(DossierStatus::as_str).collect(),
    }))
}

#[derive(Serialize)]
struct ReturnContext {
    payment: Payment,
    display: String,
}

#[get("/payments/return?<transaction_id>")]
async fn payment_return(ctx: UserContext, transaction_id: &str, gateway: &State<Gateway>, conn: MainDbConn) -> SRResult<Template> {
    let payment = match payments::find_by_transaction(transaction_id.to_owned(), &conn).await? {
        Some(p) if p.user_id == ctx.user_id || ctx.admin => p,
        _ => return Err(SRError::NotFoundError),
    };
    let payment = match payments::sync_with_gateway(payment.clone(), gateway, &conn).await {
        Ok(p) => p,
        Err(e) => {
            warn!("could not refresh {}: {}", transaction_id, e);
            payment
        }
    };
    let display = match payment.currency.as_str() {
        "XOF" => pricing::Currency::Xof.format(payment.amount),
        "XAF" => pricing::Currency::Xaf.format(payment.amount),
        _ => pricing::Currency::Eur.format(payment.amount),
    };
    Ok(Template::render("payment_return", &ReturnContext { payment, display }))
}

#[derive(FromForm)]
struct ReturnForm {
    transaction_id: String,
}

/// The gateway posts back cross-site, where the session cookie is not sent.
#[post("/payments/return", data = "<form>")]
fn payment_return_post(form: Form<ReturnForm>) -> Redirect {
    Redirect::to(uri!(payment_return(transaction_id = form.transaction_id.as_str())))
}

#[derive(Serialize)]
struct AdminPageContext {
    stats: admin::AdminStats,
    settings: Settings,
}

#[get("/admin")]
async fn admin_page(_admin: AdminContext, conn: MainDbConn) -> SRResult<Template> {
    let stats = admin::load_stats(&conn).await?;
    let settings = payments::load_settings(&conn).await?;
    Ok(Template::render("admin", &AdminPageContext { stats, settings }))
}

#[derive(Serialize)]
struct ErrorContext {
    code: u16,
    reason: &'static str,
}

#[catch(401)]
fn no_auth(_req: &Request) -> Redirect {
    Redirect::to("/login")
}

#[catch(402)]
fn no_payment(_req: &Request) -> Redirect {
    Redirect::to("/paywall")
}

#[catch(default)]
fn page_error(status: Status, _req: &Request) -> status::Custom<Template> {
    status::Custom(status, Template::render("error", &ErrorContext {
        code: status.code,
        reason: status.reason().unwrap_or("Error"),
    }))
}

#[catch(default)]
fn api_error(status: Status, _req: &Request) -> status::Custom<Json<ErrorBody>> {
    status::Custom(status, Json(ErrorBody { error: status.reason().unwrap_or("Error").to_owned() }))
}

/// Files accepted in one upload request.
const UPLOAD_BATCH: u64 = 5;

/// Caps each uploaded file at `max_upload_mb`, so oversized files arrive
/// truncated and are refused one by one, and leaves room for a batch in the
/// whole form.
pub fn upload_limits(figment: Figment) -> Figment {
    let max_mb: u64 = figment.extract_inner("max_upload_mb").unwrap_or(10);
    figment
        .merge(("limits.file", max_mb.mebibytes()))
        .merge(("limits.data-form", (max_mb * UPLOAD_BATCH).mebibytes()))
}

/// Configuration sources: `Rocket.toml`, `ROCKET_*` then `SOORO_*` variables.
pub fn figment() -> Figment {
    upload_limits(rocket::Config::figment().merge(Env::prefixed("SOORO_").global()))
}

async fn run_migrations(rocket: Rocket<Build>) -> Result<Rocket<Build>, Rocket<Build>> {
    let conn = match MainDbConn::get_one(&rocket).await {
        Some(conn) => conn,
        None => {
            error!("no database connection for migrations");
            return Err(rocket);
        }
    };
    let applied = conn.run(|c| {
        c.run_pending_migrations(MIGRATIONS)
            .map(|versions| versions.len())
            .map_err(|e| e.to_string())
    }).await;
    match applied {
        Ok(n) => {
            info!("{} migration(s) applied", n);
            Ok(rocket)
        }
        Err(e) => {
            error!("migrations failed: {}", e);
            Err(rocket)
        }
    }
}

/// Everything but the database: routes, catchers, templates and services.
pub fn site(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", routes![index, index_user, favicon, static_files, pricing_page, articles_page, article_page,
            dashboard, paywall_page, resources_page, resource_page, documents_page, messages_page, profile_page,
            payment_return, payment_return_post, admin_page])
        .mount("/", auth::routes())
        .mount("/api", content::routes())
        .mount("/api/profile", profiles::routes())
        .mount("/api/dossier", dossiers::routes())
        .mount("/api/docs", docs::routes())
        .mount("/api/payments", payments::routes())
        .mount("/api/messages", messages::routes())
        .mount("/api/admin", admin::routes())
        .register("/", catchers![no_auth, no_payment, page_error])
        .register("/api", catchers![api_error])
        .attach(AdHoc::config::<Config>())
        .attach(AdHoc::try_on_ignite("Services", |rocket| async move {
            let services = rocket.figment().extract::<Config>()
                .map_err(|e| SRError::InternalError(e.to_string()))
                .and_then(|config| Ok((Storage::new(&config)?, Gateway::new(&config)?)));
            match services {
                Ok((storage, gateway)) => Ok(rocket.manage(storage).manage(gateway)),
                Err(e) => {
                    error!("could not set up services: {}", e);
                    Err(rocket)
                }
            }
        }))
        .attach(Template::fairing())
}

/// The full application built from the given configuration.
pub fn app(figment: Figment) -> Rocket<Build> {
    site(rocket::custom(figment))
        .attach(MainDbConn::fairing())
        .attach(AdHoc::try_on_ignite("Diesel Migrations", run_migrations))
}

pub fn rocket() -> Rocket<Build> {
    app(figment())
}
