pub mod health;
pub mod leads;
pub mod login;
pub mod messaging;
pub mod telephony;
