pub mod categories;
pub mod courses;
pub mod otps;
pub mod progress;
pub mod ratings;
pub mod sections;
pub mod sub_sections;
pub mod users;
