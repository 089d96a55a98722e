//! Persisted sorted indexes for NTFS-style metadata catalogs.
//!
//! Layers, bottom up:
//!
//! - [`types`]: fixed-size record codecs, little-endian primitives and file
//!   references.
//! - [`storage`]: the byte-keyed sorted index (resident or paged), its typed
//!   view, and the owning record that persists it.
//! - [`catalogs`]: typed registries built on a named index, such as the `$R`
//!   reparse point catalog.
//!
//! Data flows catalog → typed view → sorted index → record codec → bytes.
//! Corrupt bytes surface as [`types::MalformedRecord`] at whichever layer
//! first decodes them and propagate up unchanged.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod catalogs;
pub mod config;
pub mod storage;
pub mod types;

#[cfg(test)]
mod e2e_tests;
#[cfg(test)]
mod simulation;
