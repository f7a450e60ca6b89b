//! # CareTrack Common Library
//!
//! Shared code for the CareTrack backend:
//! - Error taxonomy shared by the service crate
//! - Domain models (principals, organizations, patients, programs,
//!   locations, risk tiers, weekly metrics, audit entries)
//! - Bearer-token signing/verification and password hashing
//! - Pure risk/engagement classification
//! - Pure audit request-classification rules
//! - Week-window and clinic-schedule helpers

pub mod audit;
pub mod auth;
pub mod error;
pub mod models;
pub mod risk;
pub mod week;

pub use error::{Error, Result};
