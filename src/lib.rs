pub mod api;
pub mod analysis;
pub mod data_collector;
pub mod database_sqlx;
pub mod models;
pub mod utils;
