//! End-to-end tests at the catalog level.
//!
//! Each test file covers a specific scenario, driving a reparse point catalog
//! attached to a file record and checking what ends up in the record image.

#![cfg(test)]


mod test_persist_notifications;
mod test_tag_dump;
