pub mod access;
pub mod token;
pub mod users;
