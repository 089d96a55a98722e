//! Record types shared by every index: the codec contract, its byte
//! helpers, and file references.

pub mod bytes;
pub mod codec;
pub mod reference;

pub use codec::{MalformedRecord, RecordCodec};
pub use reference::FileReference;
