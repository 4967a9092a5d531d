pub mod utils;

pub use utils::test_utils;

mod config;
mod content;
