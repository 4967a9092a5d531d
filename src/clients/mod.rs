pub mod mailer;
pub mod media;
pub mod templates;

pub use mailer::{MailService, Mailer, mailer_from_config};
pub use media::{LocalMediaStore, MediaService, MediaStore, MediaUpload, StoredMedia, delete_quietly};
