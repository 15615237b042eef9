//! Application services: the two pipelines, rendering and syndication.

pub mod content;
pub mod error;
pub mod generation;
pub mod prompts;
pub mod render;
pub mod repos;
pub mod retry;
pub mod syndication;
pub mod visualize;
