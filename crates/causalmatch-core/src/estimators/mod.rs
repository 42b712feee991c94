//! Effect estimators.

pub mod mahalanobis;

pub use mahalanobis::{sample_covariance, MahalanobisMatcher, DEFAULT_EPSILON};
