pub mod flow;
pub mod password;
pub mod permissions;
pub mod token;
pub mod user;

pub use permissions::*;
pub use user::*;
