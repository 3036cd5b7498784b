pub mod chat;
pub mod doctor;
pub mod gateway;
pub mod ingest;
pub mod onboard;
