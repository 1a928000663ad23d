pub mod api;
pub mod commands;
pub mod configuration;
pub mod db;
pub mod domain;
pub mod startup;
pub mod subscription_store;
pub mod telegram_client;
pub mod watcher;

pub use api::*;
pub use commands::*;
pub use configuration::*;
pub use db::*;
pub use domain::*;
pub use startup::*;
pub use subscription_store::*;
pub use telegram_client::*;
pub use watcher::*;
