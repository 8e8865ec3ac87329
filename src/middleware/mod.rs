//! Tower middleware shared by every route

pub mod rate_limit;

pub use rate_limit::RateLimitLayer;
