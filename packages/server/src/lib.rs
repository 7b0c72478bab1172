pub mod app;
pub mod models;
pub mod providers;
pub mod roles;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
