pub mod hooks;
pub mod model;
pub mod repo;
pub mod services;
pub mod uploads;

pub use model::{AppUser, Gender, ProfilePicture, UserStatus, ValidationError};
pub use repo::{PgUserStore, UserStore, WriteOutcome};
pub use services::save_user;
pub use uploads::UploadedFile;
