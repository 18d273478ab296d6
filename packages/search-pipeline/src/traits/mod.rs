//! Core trait abstractions for the pipeline's external collaborators.
//!
//! Applications implement these to plug in a model provider and a content
//! source; the pipeline never talks to the network directly.

pub mod fetcher;
pub mod model;
