pub mod account;
pub mod assistant;
pub mod capture;
pub mod chat;
pub mod flashcards;
pub mod health;
pub mod quiz;
