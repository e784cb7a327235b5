//! Device Parameter Store & Validation Engine.
//!
//! Leaf-first: [`codec`] reads and writes `[Key][Value]` documents, [`record`]
//! types one device, [`validation`] defaults and range-checks it, [`patch`] and
//! [`lifecycle`] produce partial and canned updates, and [`engine`] runs them
//! against storage under per-device [`locks`].

pub mod codec;
pub mod document;
pub mod engine;
pub mod lifecycle;
pub mod locks;
pub mod patch;
pub mod record;
pub mod validation;
