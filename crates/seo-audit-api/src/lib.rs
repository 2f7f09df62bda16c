pub mod auth;
pub mod config;
pub mod database;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;
pub mod utils;
