//! HTTP API handlers for caretrack-api

pub mod audit;
pub mod auth;
pub mod engagement;
pub mod health;
pub mod imports;
pub mod locations;
pub mod organizations;
pub mod patients;
pub mod programs;
pub mod risk;
