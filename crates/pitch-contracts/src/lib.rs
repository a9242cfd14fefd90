pub mod campaigns;
pub mod chat;
pub mod events;
pub mod library;
pub mod models;
