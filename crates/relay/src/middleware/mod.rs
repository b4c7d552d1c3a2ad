//! HTTP middleware stack for the relay.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS
//! 5. Rate limiting (governor, per route group)

pub mod rate_limit;
pub mod request_id;

pub use rate_limit::{api_rate_limiter, checkout_rate_limiter};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
