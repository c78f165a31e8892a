//! Domain types and pure logic for the audio ad mixer.
//!
//! Nothing in this crate performs I/O. Persistence is abstracted behind the
//! [`store::KvStore`] trait and implemented in `admix-db`.

pub mod error;
pub mod mixer;
pub mod store;
pub mod stream;
pub mod timeline;
pub mod tracks;
pub mod types;
pub mod version;
