use rocket::{Route};
use crate::base::*;
use rocket::serde::json::Json;
use crate::model::{Profile, ProfileForm};
use crate::pricing::normalize_country;
use crate::schema::profiles::dsl::profiles;
use crate::schema::profiles as pfls;

use diesel::prelude::*;

#[get("/")]
async fn get_profile(ctx: UserContext, conn: MainDbConn) -> SRResult<Json<Profile>>{
    let u: Profile=conn.run(move |c| {
        profiles.filter(pfls::id.eq(ctx.user_id)).first(c)
    }).await?;
    Ok(Json(u))
}

/// Trims the submitted values and checks the country code.
pub fn clean_profile_form(form: ProfileForm) -> SRResult<ProfileForm> {
    let full_name = match form.full_name {
        Some(name) if name.trim().is_empty() => return bad_request("full name cannot be blank"),
        name => non_blank(name),
    };
    let country = match non_blank(form.country) {
        Some(c) => Some(normalize_country(&c).ok_or_else(|| SRError::BadRequest(format!("invalid country: {}", c)))?),
        None => None,
    };
    Ok(ProfileForm { full_name, phone: non_blank(form.phone), country })
}

#[put("/", data = "<form>")]
async fn update_profile(ctx: UserContext, form: Json<ProfileForm>, conn: MainDbConn) -> SRResult<Json<Profile>>{
    let form = clean_profile_form(form.into_inner())?;
    let u: Profile=conn.run(move |c| {
        if form.full_name.is_none() && form.phone.is_none() && form.country.is_none() {
            profiles.filter(pfls::id.eq(ctx.user_id)).first(c)
        } else {
            diesel::update(profiles.filter(pfls::id.eq(ctx.user_id)))
                .set(&form)
                .get_result(c)
        }
    }).await?;
    Ok(Json(u))
}

pub fn routes() -> Vec<Route> {
    routes![get_profile, update_profile]
}
