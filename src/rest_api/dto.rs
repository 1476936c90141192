//! Response bodies for the status API

use serde::Serialize;

use crate::controller::GateStatus;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct GateListResponse {
    pub items: Vec<GateStatus>,
    pub total: usize,
}
