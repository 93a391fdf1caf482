use uuid::Uuid;
use chrono::{DateTime,Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::schema::*;

/// A value that is not part of one of the text enums stored in the database.
#[derive(Debug, Error, PartialEq)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Enums persisted as plain text columns.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_owned() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(Role, "role", {
    Student => "student",
    Admin => "admin",
});

text_enum!(DossierStatus, "dossier status", {
    Draft => "draft",
    DocumentsReview => "documents_review",
    InterviewScheduled => "interview_scheduled",
    EefSubmitted => "eef_submitted",
    Accepted => "accepted",
    Refused => "refused",
});

text_enum!(DocumentKind, "document kind", {
    Passport => "passport",
    Transcript => "transcript",
    Diploma => "diploma",
    LanguageTest => "language_test",
    Cv => "cv",
    MotivationLetter => "motivation_letter",
    Other => "other",
});

text_enum!(PaymentMethod, "payment method", {
    MobileMoney => "mobile_money",
    Card => "card",
    Whatsapp => "whatsapp",
});

text_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Succeeded => "succeeded",
    Failed => "failed",
});

impl PaymentMethod {
    /// Methods settled through the payment gateway rather than by staff.
    pub fn uses_gateway(&self) -> bool {
        !matches!(self, PaymentMethod::Whatsapp)
    }
}

#[derive(Queryable, Identifiable, Insertable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub role: String,
    pub split_payment_allowed: bool,
    pub created: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl Profile {
    pub fn new_registration<S: Into<String>>(email: S, full_name: S, password_hash: String, country: Option<String>, role: Role) -> Self {
        Profile {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash,
            full_name: full_name.into(),
            phone: None,
            country,
            role: role.as_str().to_owned(),
            split_payment_allowed: false,
            created: Utc::now(),
            last_login: Some(Utc::now()),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin.as_str()
    }
}

#[derive(Deserialize, AsChangeset, Debug, Default)]
#[diesel(table_name = profiles)]
pub struct ProfileForm {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
}

#[derive(Deserialize, AsChangeset, Debug, Default)]
#[diesel(table_name = profiles)]
pub struct ProfileAdminForm {
    pub role: Option<String>,
    pub split_payment_allowed: Option<bool>,
}

#[derive(Queryable, Identifiable, Insertable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(table_name = dossiers)]
pub struct Dossier {
    pub id: Uuid,
    pub student_id: Uuid,
    pub program: String,
    pub institution: Option<String>,
    pub intake: Option<String>,
    pub status: String,
    pub staff_note: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Dossier {
    pub fn new_draft(student_id: Uuid, form: DossierForm) -> Self {
        Dossier {
            id: Uuid::new_v4(),
            student_id,
            program: form.program,
            institution: form.institution,
            intake: form.intake,
            status: DossierStatus::Draft.as_str().to_owned(),
            staff_note: None,
            created: Utc::now(),
            updated: Utc::now(),
        }
    }
}

#[derive(Deserialize, AsChangeset, Debug, Clone)]
#[diesel(table_name = dossiers)]
pub struct DossierForm {
    pub program: String,
    pub institution: Option<String>,
    pub intake: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct DossierStatusForm {
    pub status: String,
    pub note: Option<String>,
}

#[derive(Queryable, Identifiable, Insertable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(table_name = documents)]
pub struct Document {
    pub id: Uuid,
    pub owner: Uuid,
    pub name: String,
    pub kind: String,
    pub mime: Option<String>,
    pub size: i64,
    pub storage_key: String,
    pub created: DateTime<Utc>,
}

/// A document as listed to its owner, with a short-lived download link.
#[derive(Serialize, Deserialize, Debug)]
pub struct DocumentView {
    #[serde(flatten)]
    pub document: Document,
    pub url: String,
}

#[derive(Queryable, Identifiable, Insertable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(table_name = payments)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub transaction_id: String,
    pub method: String,
    pub country: String,
    pub amount: i64,
    pub currency: String,
    pub installment: i16,
    pub status: String,
    pub payment_url: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Payment {
    pub fn is_succeeded(&self) -> bool {
        self.status == PaymentStatus::Succeeded.as_str()
    }
}

#[derive(Deserialize, Debug)]
pub struct PaymentStatusForm {
    pub status: String,
}

#[derive(Queryable, Identifiable, Insertable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(table_name = messages)]
pub struct Message {
    pub id: Uuid,
    pub student_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub created: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new<S: Into<String>>(student_id: Uuid, sender_id: Uuid, body: S) -> Self {
        Message {
            id: Uuid::new_v4(),
            student_id,
            sender_id,
            body: body.into(),
            created: Utc::now(),
            read_at: None,
        }
    }

    pub fn from_staff(&self) -> bool {
        self.sender_id != self.student_id
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ThreadSummary {
    pub student_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub last_message: DateTime<Utc>,
    pub unread: i64,
}

#[derive(Queryable, Identifiable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(table_name = settings)]
pub struct Settings {
    pub id: i32,
    pub price_cents: i64,
    pub split_payment_enabled: bool,
    pub whatsapp_number: String,
    pub updated: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, AsChangeset, Debug, Clone)]
#[diesel(table_name = settings)]
pub struct SettingsForm {
    pub price_cents: i64,
    pub split_payment_enabled: bool,
    pub whatsapp_number: String,
}
