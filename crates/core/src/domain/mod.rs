pub mod command;
pub mod profile;
