pub mod chat;
pub mod credentials;
pub mod events;
pub mod ledger;
pub mod request;
pub mod result;
pub mod settings;
