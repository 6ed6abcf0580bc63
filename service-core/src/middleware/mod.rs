pub mod metrics;
pub mod tracing;

pub use self::metrics::{install_recorder, metrics_middleware};
pub use self::tracing::{make_request_span, request_id_middleware};
