//! Asset container and texture codecs.
//!
//! - [archive]: GPKG, a single file of named blobs, with a reader and a
//!   directory-walking builder.
//! - [texture]: GTEX, a self-describing texture blob with optional palette
//!   and run-length packed pixels.
//! - [binio]: the byte-order aware sink and reader both formats are built on.

pub mod archive;
pub mod binio;
mod error;
pub mod texture;

pub use error::{Error, Result};
