use rocket::{Route, State};
use crate::base::*;
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket::form::Form;
use rocket::data::Capped;
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::tokio::io::AsyncReadExt;
use crate::model::{Document, DocumentKind, DocumentView};
use crate::schema::documents::dsl::documents;
use crate::schema::documents as docs;
use crate::storage::{object_key, Storage};
use slog_scope::{info, warn};
use uuid::Uuid;

use chrono::Utc;
use diesel::prelude::*;

const ACCEPTED_MIMES: &[&str] = &["application/pdf", "image/jpeg", "image/png", "image/webp"];

#[derive(FromForm)]
struct Upload<'r> {
    kind: String,
    files: Vec<Capped<TempFile<'r>>>,
}

/// Outcome of one uploaded file.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub enum DocumentUpload {
    Ok { id: Uuid },
    TooLarge { name: String },
    Rejected { name: String },
}

impl DocumentUpload {
    pub fn get_id(&self) -> Option<Uuid> {
        match self {
            DocumentUpload::Ok { id } => Some(*id),
            _ => None,
        }
    }
}

pub fn accepted_mime(mime: Option<&str>) -> bool {
    mime.map(|m| m.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .map_or(false, |m| ACCEPTED_MIMES.contains(&m.as_str()))
}

/// Checks one file against the upload rules, before reading it. A file cut
/// short by the `file` limit is incomplete.
pub fn screen_file(name: &str, mime: Option<&str>, len: u64, complete: bool, max_bytes: u64) -> Option<DocumentUpload> {
    if !complete || len > max_bytes {
        Some(DocumentUpload::TooLarge { name: name.to_owned() })
    } else if !accepted_mime(mime) {
        Some(DocumentUpload::Rejected { name: name.to_owned() })
    } else {
        None
    }
}

fn file_name(file: &TempFile<'_>) -> String {
    file.raw_name()
        .map(|f| f.dangerous_unsafe_unsanitized_raw().as_str().trim().to_owned())
        .filter(|n| !n.is_empty())
        .or_else(|| file.name().map(String::from))
        .unwrap_or_else(|| String::from("document"))
        .chars().take(200).collect()
}

fn file_mime(file: &TempFile<'_>) -> Option<String> {
    file.content_type().map(|ct| format!("{}/{}", ct.top(), ct.sub()))
}

fn screen(file: &Capped<TempFile<'_>>, max_bytes: u64) -> Option<DocumentUpload> {
    screen_file(&file_name(file), file_mime(file).as_deref(), file.len(), file.is_complete(), max_bytes)
}

#[post("/", data = "<upload>")]
async fn upload(ctx: UserContext, upload: Form<Upload<'_>>, config: &State<Config>, storage: &State<Storage>, conn: MainDbConn) -> SRResult<Json<Vec<DocumentUpload>>>{
    let kind: DocumentKind = upload.kind.parse()?;
    let max_bytes = config.max_upload_mb * 1024 * 1024;
    let mut results = vec![];
    for file in upload.files.iter() {
        if let Some(refused) = screen(file, max_bytes) {
            warn!("upload refused for {}: {:?}", ctx.user_id, refused);
            results.push(refused);
            continue;
        }

        let doc_name = file_name(file);
        let mime = file_mime(file);
        let mut data = Vec::with_capacity(file.len() as usize);
        let reader = file.open().await?;
        rocket::tokio::pin!(reader);
        reader.read_to_end(&mut data).await?;

        let id = Uuid::new_v4();
        let key = object_key(ctx.user_id, id, &doc_name);
        let doc = Document {
            id,
            owner: ctx.user_id,
            name: doc_name,
            kind: kind.as_str().to_owned(),
            mime: mime.clone(),
            size: data.len() as i64,
            storage_key: key.clone(),
            created: Utc::now(),
        };
        storage.put(&key, data, mime).await?;

        let inserted = conn.run(move |c| {
            diesel::insert_into(documents)
                .values(&doc)
                .execute(c)
        }).await;
        if let Err(e) = inserted {
            if let Err(cleanup) = storage.delete(&key).await {
                warn!("could not remove orphan object {}: {}", key, cleanup);
            }
            return Err(e.into());
        }
        info!("document {} uploaded by {}", id, ctx.user_id);
        results.push(DocumentUpload::Ok { id });
    }
    Ok(Json(results))
}

/// The owner's documents, newest first, each with a fresh signed link.
pub async fn list_documents(owner: Uuid, storage: &Storage, conn: &MainDbConn) -> SRResult<Vec<DocumentView>> {
    let ds: Vec<Document> = conn.run(move |c| {
        documents.filter(docs::owner.eq(owner))
            .order(docs::created.desc())
            .load(c)
    }).await?;
    Ok(ds.into_iter()
        .map(|d| {
            let url = storage.signed_url(&d.storage_key, &d.name);
            DocumentView { document: d, url }
        })
        .collect())
}

#[get("/")]
async fn get_documents(ctx: UserContext, storage: &State<Storage>, conn: MainDbConn) -> SRResult<Json<Vec<DocumentView>>>{
    Ok(Json(list_documents(ctx.user_id, storage, &conn).await?))
}

#[get("/count")]
async fn count_documents(ctx: UserContext, conn: MainDbConn) -> SRResult<Json<i64>>{
    let cnt: i64 = conn.run(move |c| {
        documents.filter(docs::owner.eq(ctx.user_id))
            .count().get_result(c)
    }).await?;
    Ok(Json(cnt))
}

#[delete("/<uuid>")]
async fn delete_document(ctx: UserContext, uuid: &str, storage: &State<Storage>, conn: MainDbConn) -> SRResult<Status>{
    let real_uuid = Uuid::parse_str(uuid)?;
    let od: Option<Document> = conn.run(move |c| {
        documents.filter(docs::id.eq(real_uuid)).first::<Document>(c).optional()
    }).await?;
    let doc = match od {
        Some(d) if d.owner == ctx.user_id || ctx.admin => d,
        _ => return Err(SRError::NotFoundError),
    };

    storage.delete(&doc.storage_key).await?;
    conn.run(move |c| {
        diesel::delete(documents.filter(docs::id.eq(real_uuid))).execute(c)
    }).await?;
    info!("document {} deleted by {}", real_uuid, ctx.user_id);
    Ok(Status::NoContent)
}

pub fn routes() -> Vec<Route> {
    routes![upload, get_documents, count_documents, delete_document]
}
