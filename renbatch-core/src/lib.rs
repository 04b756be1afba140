pub mod models;
pub mod sanitize;
pub mod engine;
pub mod transaction;
pub mod history;
pub mod scan;
pub mod worker;
pub mod config;
pub mod fs;

pub use models::*;
pub use sanitize::*;
pub use engine::*;
pub use transaction::*;
pub use history::*;
pub use scan::*;
pub use worker::*;
pub use config::*;
pub use fs::*;
