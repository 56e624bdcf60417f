//! HTTP request handlers
//!
//! - `api` - Health check endpoint
//! - `speech` - Speech synthesis endpoint
//! - `voices` - Voice and model listing endpoints

pub mod api;
pub mod speech;
pub mod voices;
