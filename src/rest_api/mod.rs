//! REST API module
//!
//! Status page and JSON view of the gate display cache, plus the Prometheus
//! scrape endpoint.

mod dto;
mod handlers;
mod page;
mod server;

pub use dto::{GateListResponse, HealthResponse};
pub use page::{escape_html, render_status_page};
#[cfg(feature = "metrics")]
pub use server::{metrics_router, run_metrics_server};
pub use server::{run_status_server, status_router};
