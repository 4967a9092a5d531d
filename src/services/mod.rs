pub mod content;
pub mod enrollment;
pub mod otp_sweeper;
pub mod profile;
pub mod projection;
pub mod ratings;
