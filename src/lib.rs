//! Macro news impact scoring.
//!
//! Articles are fetched from RSS feeds and NewsAPI, categorized by weighted
//! keywords, scored for sentiment and aggregated into per-category impact
//! scores. Clusters of articles become macro events whose historical effect
//! on economic indicators adjusts DCF and commodity model parameters.
//! Recorded investment decisions are then attributed to macro factors.

pub mod app;
pub mod config;
pub mod db;
pub mod errors;
pub mod external;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
