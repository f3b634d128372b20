//! Ritter Leads API Library
//!
//! Lead repository backend: listing and filtering, validation of contact
//! fields, duplicate detection and resolution, relevance search, quality
//! analysis and CSV import/export, behind a bearer-token protected HTTP API.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `data`: Data access layer.
//! - `integrations`: External service integrations.
//! - `obs`: Observability and logging.
//! - `auth`: Bearer token middleware and verified-token cache.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `db_storage`: PostgreSQL lead store.
//! - `dedup`: Duplicate finder and resolver.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `identity_client`: Identity provider client.
//! - `import_export`: CSV import, JSON/CSV export.
//! - `lead_store`: Persistence trait and in-memory store.
//! - `models`: Core data models.
//! - `quality`: Quality analysis and statistics.
//! - `routes`: Router assembly.
//! - `search`: Relevance search ranker.
//! - `services`: Lead service used by the handlers.
//! - `validation`: Email, phone and website validators.

pub mod api;
pub mod core;
pub mod data;
pub mod integrations;
pub mod obs;

// Re-export primary modules for shared use in tests and other binaries
pub mod auth;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod dedup;
pub mod errors;
pub mod handlers;
pub mod identity_client;
pub mod import_export;
pub mod lead_store;
pub mod models;
pub mod quality;
pub mod routes;
pub mod search;
pub mod services;
pub mod validation;
