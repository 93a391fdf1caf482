use rocket::http::Status;
use rocket::outcome::try_outcome;
use rocket::request::{FromRequest, Outcome, Request};
use uuid::Uuid;

use diesel::prelude::*;
use diesel::dsl::exists;

use crate::base::*;
use crate::model::PaymentStatus;
use crate::schema::payments::dsl::payments;
use crate::schema::payments as pmts;

/// A user allowed into the resource library: staff, or a student with at
/// least one succeeded payment.
#[derive(Debug, Clone, Copy)]
pub struct PremiumContext(pub UserContext);

pub fn is_premium(ctx: &UserContext, has_paid: bool) -> bool {
    ctx.admin || has_paid
}

pub async fn has_paid(user_id: Uuid, conn: &MainDbConn) -> SRResult<bool> {
    let paid: bool = conn.run(move |c| {
        diesel::select(exists(
            payments.filter(pmts::user_id.eq(user_id)).filter(pmts::status.eq(PaymentStatus::Succeeded.as_str())),
        )).get_result(c)
    }).await?;
    Ok(paid)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for PremiumContext {
    type Error = SRError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let ctx = try_outcome!(request.guard::<UserContext>().await);
        if ctx.admin {
            return Outcome::Success(PremiumContext(ctx));
        }
        let conn = try_outcome!(request.guard::<MainDbConn>().await
            .map_error(|(s, _)| (s, SRError::DatabaseError(String::from("no database connection")))));
        match has_paid(ctx.user_id, &conn).await {
            Ok(paid) if is_premium(&ctx, paid) => Outcome::Success(PremiumContext(ctx)),
            Ok(_) => Outcome::Error((Status::PaymentRequired, SRError::PaymentRequired)),
            Err(e) => Outcome::Error((e.status(), e)),
        }
    }
}
