use serde::Serialize;

use crate::config::DatabaseInfo;

pub const PLACEHOLDER_MESSAGE: &str = "Ecommerce backend placeholder";

#[derive(Debug, Serialize)]
pub struct StatusResponse<'a> {
    pub status: &'static str,
    pub message: &'static str,
    pub database: &'a DatabaseInfo,
}

#[derive(Debug, Serialize)]
pub struct NotFoundResponse {
    pub status: &'static str,
    pub path: String,
}
