//! HTTP API for tickavg.
//!
//! - `GET  /api/{symbol}/24hAvgPrice`
//! - `GET  /api/{symbol}/SimpleMovingAverage?n=&p=&s=`
//! - `POST /api/collectPriceData`
//! - `POST /api/stopCollecting`
//! - `GET  /metrics`

mod config;
mod error;
mod server;
mod types;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use server::{create_router, run_server, AppState};
pub use types::{
    CollectRequest, CollectResponse, FailedSymbol, PriceResponse, SmaParams, StopResponse,
};
