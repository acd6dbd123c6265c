mod client;
mod rate_limiter;

pub use client::{HttpClient, HttpResponse};
pub use rate_limiter::RateLimiter;
