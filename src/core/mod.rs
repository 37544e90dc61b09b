pub mod command;
pub mod errors;
pub mod events;
pub mod models;
pub mod state;
pub mod target;
