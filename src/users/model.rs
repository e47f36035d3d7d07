use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use sqlx::FromRow;
use thiserror::Error;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::uploads::UploadedFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_gender")]
pub enum Gender {
    #[sqlx(rename = "M")]
    Male,
    #[sqlx(rename = "F")]
    Female,
    #[sqlx(rename = "O")]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_status")]
pub enum UserStatus {
    #[sqlx(rename = "A")]
    Active,
    #[sqlx(rename = "I")]
    Inactive,
    #[sqlx(rename = "B")]
    Blocked,
    #[default]
    #[sqlx(rename = "P")]
    Pending,
}

/// Profile picture as seen by the save pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfilePicture {
    /// Freshly uploaded, still on local disk.
    Upload(UploadedFile),
    /// Already in object storage.
    Stored { url: String },
}

impl ProfilePicture {
    pub fn stored_url(&self) -> Option<&str> {
        match self {
            ProfilePicture::Stored { url } => Some(url),
            ProfilePicture::Upload(_) => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid email: {0}")]
    InvalidEmail(String),
    #[error("{field} exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("rating must be between 0.00 and 9.99")]
    RatingOutOfRange,
}

/// Application user as held in memory between loads and saves.
#[derive(Debug, Clone, Serialize)]
pub struct AppUser {
    pub user_id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub full_name: String,
    pub date_of_birth: Date,
    pub gender: Gender,
    #[serde(serialize_with = "serialize_picture")]
    pub profile_picture: Option<ProfilePicture>,
    pub bio: String,
    pub skills_offered: Vec<Uuid>,
    pub skills_wanted: Vec<Uuid>,
    pub location: String,
    pub phone_number: String,
    pub status: UserStatus,
    pub rating: Decimal,
    pub is_verified: bool,
    pub created_at: Option<OffsetDateTime>,
    pub updated_at: Option<OffsetDateTime>,
    pub last_login: Option<OffsetDateTime>,
}

fn serialize_picture<S: Serializer>(
    picture: &Option<ProfilePicture>,
    s: S,
) -> Result<S::Ok, S::Error> {
    picture.as_ref().and_then(ProfilePicture::stored_url).serialize(s)
}

impl AppUser {
    /// New, unsaved user with schema defaults. `password` is plaintext here;
    /// it is hashed on save.
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        full_name: impl Into<String>,
        date_of_birth: Date,
        gender: Gender,
        location: impl Into<String>,
    ) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            email: email.into(),
            password: password.into(),
            full_name: full_name.into(),
            date_of_birth,
            gender,
            profile_picture: None,
            bio: String::new(),
            skills_offered: Vec::new(),
            skills_wanted: Vec::new(),
            location: location.into(),
            phone_number: String::new(),
            status: UserStatus::default(),
            rating: Decimal::new(0, 2),
            is_verified: false,
            created_at: None,
            updated_at: None,
            last_login: None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.created_at.is_some()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        lazy_static! {
            static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
        }
        if !EMAIL_RE.is_match(&self.email) {
            return Err(ValidationError::InvalidEmail(self.email.clone()));
        }
        for (field, value, max) in [
            ("email", &self.email, 254),
            ("password", &self.password, 255),
            ("full_name", &self.full_name, 50),
            ("bio", &self.bio, 500),
            ("location", &self.location, 100),
            ("phone_number", &self.phone_number, 15),
        ] {
            if value.chars().count() > max {
                return Err(ValidationError::TooLong { field, max });
            }
        }
        if self.rating.is_sign_negative() || self.rating >= Decimal::new(10, 0) {
            return Err(ValidationError::RatingOutOfRange);
        }
        Ok(())
    }
}

impl fmt::Display for AppUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

/// Row of `app_users`; skill associations live in their own tables.
#[derive(Debug, Clone, FromRow)]
pub struct AppUserRow {
    pub user_id: Uuid,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub date_of_birth: Date,
    pub gender: Gender,
    pub profile_picture: Option<String>,
    pub bio: String,
    pub location: String,
    pub phone_number: String,
    pub status: UserStatus,
    pub rating: Decimal,
    pub is_verified: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub last_login: Option<OffsetDateTime>,
}

impl AppUserRow {
    pub fn into_user(self, skills_offered: Vec<Uuid>, skills_wanted: Vec<Uuid>) -> AppUser {
        AppUser {
            user_id: self.user_id,
            email: self.email,
            password: self.password,
            full_name: self.full_name,
            date_of_birth: self.date_of_birth,
            gender: self.gender,
            profile_picture: self.profile_picture.map(|url| ProfilePicture::Stored { url }),
            bio: self.bio,
            skills_offered,
            skills_wanted,
            location: self.location,
            phone_number: self.phone_number,
            status: self.status,
            rating: self.rating,
            is_verified: self.is_verified,
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
            last_login: self.last_login,
        }
    }
}
