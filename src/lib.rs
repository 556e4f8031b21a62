//! Lumen: conversation orchestration for a multi-modal AI client.
//!
//! The library holds the core (store, accumulator, dispatcher, title
//! lifecycle) and its collaborators. The Dioxus front end is compiled only
//! with one of the `web`, `desktop` or `mobile` features.

pub mod accumulator;
pub mod ai;
pub mod auth;
pub mod config;
pub mod dispatcher;
pub mod render;
pub mod storage;
pub mod store;
pub mod title;
pub mod types;

#[cfg(feature = "dioxus")]
pub mod ui;
#[cfg(feature = "dioxus")]
pub mod views;
