pub mod auth;
pub mod booking;
pub mod db;
pub mod errors;
pub mod models;
pub mod routes;
pub mod state;
