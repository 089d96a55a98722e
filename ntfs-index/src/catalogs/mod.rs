//! Volume catalogs.
//!
//! A catalog is a typed registry kept in a named index of some owning
//! record. It borrows the record for as long as it is attached and asks it
//! to persist after every mutation.

mod reparse_points;

pub use reparse_points::{CatalogError, INDEX_NAME, ReparseData, ReparseKey, ReparsePoints};
