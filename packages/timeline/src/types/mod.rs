//! Data types for articles, events, the taxonomy and curated timelines.

pub mod article;
pub mod config;
pub mod event;
pub mod taxonomy;
pub mod timeline;
