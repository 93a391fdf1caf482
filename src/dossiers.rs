use rocket::{Route};
use crate::base::*;
use rocket::serde::json::Json;
use crate::model::{Dossier, DossierForm};
use crate::schema::dossiers::dsl::dossiers;
use crate::schema::dossiers as dsrs;

use chrono::Utc;
use diesel::prelude::*;

#[get("/")]
async fn get_dossier(ctx: UserContext, conn: MainDbConn) -> SRResult<Json<Option<Dossier>>>{
    let d=conn.run(move |c| {
        dossiers.filter(dsrs::student_id.eq(ctx.user_id)).first::<Dossier>(c).optional()
    }).await?;
    Ok(Json(d))
}

pub fn clean_dossier_form(form: DossierForm) -> SRResult<DossierForm> {
    let program = form.program.trim().to_owned();
    if program.is_empty() {
        return bad_request("program is required");
    }
    Ok(DossierForm { program, institution: non_blank(form.institution), intake: non_blank(form.intake) })
}

/// Creates the student's dossier as a draft, or updates what they may edit.
#[put("/", data = "<form>")]
async fn save_dossier(ctx: UserContext, form: Json<DossierForm>, conn: MainDbConn) -> SRResult<Json<Dossier>>{
    let form = clean_dossier_form(form.into_inner())?;
    let d=conn.run(move |c| {
        let od: Option<Dossier> = dossiers.filter(dsrs::student_id.eq(ctx.user_id)).first(c).optional()?;
        match od {
            None => {
                let d = Dossier::new_draft(ctx.user_id, form);
                diesel::insert_into(dossiers).values(&d).execute(c)?;
                Ok::<Dossier, diesel::result::Error>(d)
            },
            Some(d) => {
                diesel::update(&d)
                    .set((dsrs::program.eq(form.program),
                        dsrs::institution.eq(form.institution),
                        dsrs::intake.eq(form.intake),
                        dsrs::updated.eq(Utc::now())))
                    .get_result(c)
            },
        }
    }).await?;
    Ok(Json(d))
}

pub fn routes() -> Vec<Route> {
    routes![get_dossier, save_dossier]
}
