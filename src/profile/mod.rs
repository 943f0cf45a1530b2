//! Payload profiling
//!
//! Summarizes which fields a payload carries and what their values look
//! like, to catch upstream shape drift before it surfaces as a field error.

pub mod builder;

pub use builder::{profile_records, FieldProfile, PayloadProfile, ProfileBuilder};
