//! AltScore: alternative-data credit scoring.
//!
//! The library turns a loosely-typed applicant submission into a blended credit score by
//! running three pre-trained model artifacts (a risk classifier and two score
//! regressors) behind a uniform prediction contract, then persists the submission to an
//! append-only CSV record store. The HTTP/CLI surfaces live in the `altscore-api`
//! service crate; everything scoring-related is here so it can be exercised without a
//! running server.

pub mod config;
pub mod error;
pub mod report;
pub mod scoring;
pub mod service;
pub mod store;
pub mod telemetry;
