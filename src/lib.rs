//! Tikbatch - Batch Vertical Video Conversion
//!
//! A batch processing orchestrator that converts videos to vertical 9:16
//! format with optional burned-in captions by driving an external encoder
//! script per file.

pub mod cli;
pub mod config;
pub mod encoder;
pub mod error;
pub mod media;
pub mod orchestrator;
pub mod progress;
pub mod queue;
pub mod runtime;
pub mod settings;
