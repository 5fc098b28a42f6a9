//! Read-only analyses over parsed modules

pub mod statement_categorizer;
