pub mod database;
pub mod deployment;
pub mod listener;
pub mod routing;
pub mod security;
pub mod service;
pub mod status;
