//! Vendor-specific model integrations.
pub mod openai;
