//! One conversation per student, shared by all staff members. Clients poll
//! with `since` to fetch only what is new.
use rocket::{Route};
use crate::base::*;
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use crate::model::{Message, ThreadSummary};
use crate::schema::messages::dsl::messages;
use crate::schema::messages as msgs;
use crate::schema::profiles::dsl::profiles;
use crate::schema::profiles as pfls;

use chrono::{DateTime, Utc};
use diesel::dsl::{count, max};
use diesel::prelude::*;
use std::collections::HashMap;
use uuid::Uuid;

pub const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Deserialize, Serialize, Debug)]
pub struct NewMessage {
    pub body: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    pub from_staff: bool,
}

impl From<Message> for MessageView {
    fn from(message: Message) -> Self {
        let from_staff = message.from_staff();
        MessageView { message, from_staff }
    }
}

pub fn clean_body(body: &str) -> SRResult<String> {
    let body = body.trim();
    if body.is_empty() {
        bad_request("message cannot be empty")
    } else if body.chars().count() > MAX_MESSAGE_CHARS {
        bad_request(format!("message cannot exceed {} characters", MAX_MESSAGE_CHARS))
    } else {
        Ok(body.to_owned())
    }
}

pub fn parse_since(since: Option<&str>) -> SRResult<Option<DateTime<Utc>>> {
    since
        .map(|s| DateTime::parse_from_rfc3339(s)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| SRError::BadRequest(format!("invalid since: {}", e))))
        .transpose()
}

/// Ids of the messages in `ms` the reader has not seen yet: unread and
/// written by the other party.
pub fn unseen_by(ms: &[Message], reader_is_staff: bool) -> Vec<Uuid> {
    ms.iter()
        .filter(|m| m.read_at.is_none() && m.from_staff() != reader_is_staff)
        .map(|m| m.id)
        .collect()
}

/// Messages of a thread newer than `since`, oldest first. The returned
/// messages from the other party are marked as read.
pub async fn load_thread(student_id: Uuid, since: Option<DateTime<Utc>>, reader_is_staff: bool, conn: &MainDbConn) -> SRResult<Vec<MessageView>> {
    let ms: Vec<Message> = conn.run(move |c| {
        let mut q = messages.filter(msgs::student_id.eq(student_id)).into_boxed::<diesel::pg::Pg>();
        if let Some(since) = since {
            q = q.filter(msgs::created.gt(since));
        }
        let ms = q.order(msgs::created.asc()).load::<Message>(c)?;

        let seen = unseen_by(&ms, reader_is_staff);
        if !seen.is_empty() {
            diesel::update(messages.filter(msgs::id.eq_any(seen)))
                .set(msgs::read_at.eq(Utc::now()))
                .execute(c)?;
        }
        Ok::<Vec<Message>, diesel::result::Error>(ms)
    }).await?;
    Ok(ms.into_iter().map(MessageView::from).collect())
}

pub async fn post_message(student_id: Uuid, sender_id: Uuid, body: &str, conn: &MainDbConn) -> SRResult<MessageView> {
    let msg = Message::new(student_id, sender_id, clean_body(body)?);
    let stored: Message = conn.run(move |c| {
        diesel::insert_into(messages)
            .values(&msg)
            .get_result(c)
    }).await?;
    Ok(stored.into())
}

/// Assembles the staff inbox from per-thread aggregates, most recent first.
pub fn build_threads(last: Vec<(Uuid, Option<DateTime<Utc>>)>, unread: Vec<(Uuid, i64)>, people: Vec<(Uuid, String, String)>) -> Vec<ThreadSummary> {
    let unread: HashMap<Uuid, i64> = unread.into_iter().collect();
    let people: HashMap<Uuid, (String, String)> = people.into_iter().map(|(id, email, name)| (id, (email, name))).collect();
    let mut threads: Vec<ThreadSummary> = last
        .into_iter()
        .filter_map(|(student_id, last_message)| {
            let (email, full_name) = people.get(&student_id)?.clone();
            Some(ThreadSummary {
                student_id,
                email,
                full_name,
                last_message: last_message?,
                unread: unread.get(&student_id).copied().unwrap_or(0),
            })
        })
        .collect();
    threads.sort_by(|a, b| b.last_message.cmp(&a.last_message));
    threads
}

pub async fn list_threads(conn: &MainDbConn) -> SRResult<Vec<ThreadSummary>> {
    let threads = conn.run(|c| {
        let last = messages
            .group_by(msgs::student_id)
            .select((msgs::student_id, max(msgs::created)))
            .load::<(Uuid, Option<DateTime<Utc>>)>(c)?;
        let unread = messages
            .filter(msgs::read_at.is_null())
            .filter(msgs::sender_id.eq(msgs::student_id))
            .group_by(msgs::student_id)
            .select((msgs::student_id, count(msgs::id)))
            .load::<(Uuid, i64)>(c)?;
        let ids: Vec<Uuid> = last.iter().map(|(id, _)| *id).collect();
        let people = profiles
            .filter(pfls::id.eq_any(ids))
            .select((pfls::id, pfls::email, pfls::full_name))
            .load::<(Uuid, String, String)>(c)?;
        Ok::<_, diesel::result::Error>(build_threads(last, unread, people))
    }).await?;
    Ok(threads)
}

#[get("/?<since>")]
async fn get_messages(ctx: UserContext, since: Option<&str>, conn: MainDbConn) -> SRResult<Json<Vec<MessageView>>>{
    let since = parse_since(since)?;
    Ok(Json(load_thread(ctx.user_id, since, false, &conn).await?))
}

#[post("/", data = "<msg>")]
async fn send_message(ctx: UserContext, msg: Json<NewMessage>, conn: MainDbConn) -> SRResult<Json<MessageView>>{
    Ok(Json(post_message(ctx.user_id, ctx.user_id, &msg.body, &conn).await?))
}

#[get("/unread")]
async fn unread_count(ctx: UserContext, conn: MainDbConn) -> SRResult<Json<i64>>{
    let cnt: i64 = conn.run(move |c| {
        messages.filter(msgs::student_id.eq(ctx.user_id))
            .filter(msgs::read_at.is_null())
            .filter(msgs::sender_id.ne(msgs::student_id))
            .count().get_result(c)
    }).await?;
    Ok(Json(cnt))
}

pub fn routes() -> Vec<Route> {
    routes![get_messages, send_message, unread_count]
}
