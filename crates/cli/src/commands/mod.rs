pub mod chat;
pub mod tools;
