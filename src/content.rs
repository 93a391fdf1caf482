//! Editorial content shipped with the application: public articles and the
//! premium resource library.
use rocket::{Route};
use rocket::serde::json::Json;
use serde::Serialize;
use std::str::FromStr;

use crate::base::*;
use crate::model::UnknownVariant;
use crate::paywall::PremiumContext;

#[derive(Serialize, Debug, PartialEq)]
pub struct Article {
    pub slug: &'static str,
    pub title: &'static str,
    pub excerpt: &'static str,
    pub published: &'static str,
    pub body: &'static [&'static str],
}

/// What the public listing shows: no body.
#[derive(Serialize, Debug)]
pub struct ArticlePreview {
    pub slug: &'static str,
    pub title: &'static str,
    pub excerpt: &'static str,
    pub published: &'static str,
}

impl From<&Article> for ArticlePreview {
    fn from(a: &Article) -> Self {
        ArticlePreview { slug: a.slug, title: a.title, excerpt: a.excerpt, published: a.published }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Guide,
    Template,
    Checklist,
}

impl FromStr for ResourceKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guide" => Ok(ResourceKind::Guide),
            "template" => Ok(ResourceKind::Template),
            "checklist" => Ok(ResourceKind::Checklist),
            other => Err(UnknownVariant { kind: "resource kind", value: other.to_owned() }),
        }
    }
}

#[derive(Serialize, Debug, PartialEq)]
pub struct Section {
    pub heading: &'static str,
    pub lines: &'static [&'static str],
}

#[derive(Serialize, Debug, PartialEq)]
pub struct Resource {
    pub slug: &'static str,
    pub kind: ResourceKind,
    pub title: &'static str,
    pub summary: &'static str,
    pub sections: &'static [Section],
}

#[derive(Serialize, Debug)]
pub struct ResourceSummary {
    pub slug: &'static str,
    pub kind: ResourceKind,
    pub title: &'static str,
    pub summary: &'static str,
}

impl From<&Resource> for ResourceSummary {
    fn from(r: &Resource) -> Self {
        ResourceSummary { slug: r.slug, kind: r.kind, title: r.title, summary: r.summary }
    }
}

/// Newest first.
pub static ARTICLES: &[Article] = &[
    Article {
        slug: "calendrier-eef",
        title: "The Études en France calendar, month by month",
        excerpt: "From account creation in October to the visa appointment in summer: the dates that matter.",
        published: "2024-09-02",
        body: &[
            "The Études en France platform usually opens in early October for the following academic year.",
            "Most licence applications close in mid-December, master applications follow each university's own calendar.",
            "The Campus France interview takes place once the file is complete and the fee is paid.",
            "Answers from institutions arrive between March and May, then the visa request is made on France-Visas.",
        ],
    },
    Article {
        slug: "entretien-campus-france",
        title: "Preparing the Campus France interview",
        excerpt: "What the advisor checks, the questions that come up every year and how to present your project.",
        published: "2024-07-15",
        body: &[
            "The interview checks the coherence of your study project with your past studies and your professional goals.",
            "Bring the originals of every document uploaded on the platform.",
            "Expect questions on your choice of programs, your financing and your plans after graduation.",
        ],
    },
    Article {
        slug: "budget-etudiant",
        title: "Proving your resources: the student budget",
        excerpt: "The monthly amount required for the visa and the documents that prove it.",
        published: "2024-05-20",
        body: &[
            "The visa requires proof of resources of at least 615 EUR per month.",
            "A bank certificate, a scholarship letter or a guarantor's commitment with supporting documents are accepted.",
        ],
    },
    Article {
        slug: "choisir-sa-formation",
        title: "Choosing programs that fit your profile",
        excerpt: "How many programs to select and how to balance ambitious and safe choices.",
        published: "2024-03-11",
        body: &[
            "The platform lets you select up to seven programs for a licence and more for a master.",
            "Mix selective programs with programs closer to your academic record.",
        ],
    },
];

pub static RESOURCES: &[Resource] = &[
    Resource {
        slug: "guide-procedure-eef",
        kind: ResourceKind::Guide,
        title: "Complete guide to the EEF procedure",
        summary: "Every step of the Études en France procedure with the pitfalls to avoid.",
        sections: &[
            Section { heading: "Create your account", lines: &[
                "Use a personal e-mail address you will keep for the whole procedure.",
                "Fill in your civil status exactly as written on your passport.",
            ] },
            Section { heading: "Build your file", lines: &[
                "Enter your academic history year by year, including repeated years.",
                "Upload transcripts and diplomas with their certified translations.",
            ] },
            Section { heading: "Submit and pay", lines: &[
                "Submission locks the file: check every page before confirming.",
                "Pay the Campus France fee to unlock the interview appointment.",
            ] },
        ],
    },
    Resource {
        slug: "modele-lettre-motivation",
        kind: ResourceKind::Template,
        title: "Motivation letter template",
        summary: "A structured template to adapt for each program.",
        sections: &[
            Section { heading: "Opening", lines: &[
                "Madame, Monsieur,",
                "Titulaire d'un [diplôme] obtenu en [année] à [établissement], je souhaite poursuivre mes études en [formation].",
            ] },
            Section { heading: "Project", lines: &[
                "Ce programme répond à mon objectif professionnel de [objectif] grâce à [points forts du programme].",
            ] },
            Section { heading: "Closing", lines: &[
                "Je vous prie d'agréer, Madame, Monsieur, l'expression de mes salutations distinguées.",
            ] },
        ],
    },
    Resource {
        slug: "modele-cv",
        kind: ResourceKind::Template,
        title: "French style CV template",
        summary: "One page CV following French academic conventions.",
        sections: &[
            Section { heading: "Header", lines: &["Prénom NOM", "Adresse, téléphone, e-mail"] },
            Section { heading: "Formation", lines: &["[Année] [Diplôme], [Établissement], [Ville]"] },
            Section { heading: "Expériences", lines: &["[Dates] [Poste], [Organisation] : [missions]"] },
        ],
    },
    Resource {
        slug: "checklist-documents",
        kind: ResourceKind::Checklist,
        title: "Documents checklist",
        summary: "Everything to gather before submitting your file.",
        sections: &[
            Section { heading: "Identity", lines: &["Valid passport", "Birth certificate", "Identity photo"] },
            Section { heading: "Studies", lines: &[
                "Baccalauréat diploma or equivalent",
                "Transcripts of the last three years",
                "Certified translations",
            ] },
            Section { heading: "Language", lines: &["TCF, DELF or DALF certificate"] },
        ],
    },
    Resource {
        slug: "checklist-visa",
        kind: ResourceKind::Checklist,
        title: "Visa appointment checklist",
        summary: "What to bring to the visa appointment once you are admitted.",
        sections: &[
            Section { heading: "Documents", lines: &[
                "Acceptance letter",
                "Proof of resources",
                "Proof of accommodation for the first months",
                "Travel insurance",
            ] },
        ],
    },
];

pub fn article(slug: &str) -> Option<&'static Article> {
    ARTICLES.iter().find(|a| a.slug == slug)
}

pub fn latest_articles(n: usize) -> Vec<ArticlePreview> {
    ARTICLES.iter().take(n).map(ArticlePreview::from).collect()
}

pub fn resource(slug: &str) -> Option<&'static Resource> {
    RESOURCES.iter().find(|r| r.slug == slug)
}

pub fn resources(kind: Option<ResourceKind>) -> Vec<ResourceSummary> {
    RESOURCES
        .iter()
        .filter(|r| kind.map_or(true, |k| r.kind == k))
        .map(ResourceSummary::from)
        .collect()
}

#[get("/articles")]
fn get_articles() -> Json<Vec<ArticlePreview>> {
    Json(latest_articles(ARTICLES.len()))
}

#[get("/articles/<slug>")]
fn get_article(slug: &str) -> SRResult<Json<&'static Article>> {
    article(slug).map(Json).ok_or(SRError::NotFoundError)
}

#[get("/resources?<kind>")]
fn get_resources(_ctx: PremiumContext, kind: Option<&str>) -> SRResult<Json<Vec<ResourceSummary>>> {
    let kind = kind.map(ResourceKind::from_str).transpose()?;
    Ok(Json(resources(kind)))
}

#[get("/resources/<slug>")]
fn get_resource(_ctx: PremiumContext, slug: &str) -> SRResult<Json<&'static Resource>> {
    resource(slug).map(Json).ok_or(SRError::NotFoundError)
}

pub fn routes() -> Vec<Route> {
    routes![get_articles, get_article, get_resources, get_resource]
}
