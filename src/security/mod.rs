//! Security primitives: webhook signature verification

pub mod signature;

pub use signature::{SignatureCheck, sign, verify};
