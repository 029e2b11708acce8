//! Personalised movie and series catalogs.
//!
//! Reads a user's Trakt watch history, asks Gemini for similar titles and
//! resolves them through TMDB into catalog entries for a media client.

pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
