//! Shared fixtures for the unit tests.
//!
//! [`helpers`] builds the small functions the analyses and passes are exercised on, so every
//! module tests against the same shapes.

pub(crate) mod helpers;
