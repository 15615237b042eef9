//! Persona-driven writer, editor and illustrator pipelines for a fictional
//! glitch-culture blog, plus the read side that renders and syndicates posts.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
pub mod util;
