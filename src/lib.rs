//! Error-recovery building blocks: retry with exponential backoff,
//! configuration with fallback to defaults, scoped file access and a batch
//! processor that degrades gracefully once its error budget runs out.

pub mod config;
pub mod error;
pub mod network;
pub mod processor;
pub mod retry;
pub mod safe_file;

#[cfg(test)]
mod test_support;
