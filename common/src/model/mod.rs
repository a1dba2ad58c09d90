//! Domain models for the profile backend

pub mod profile;
