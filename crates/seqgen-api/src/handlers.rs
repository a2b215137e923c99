//! Request handlers.

pub mod health;
pub mod keys;
pub mod media;
pub mod sequences;
pub mod status;
pub mod stream;

pub use health::*;
pub use keys::*;
pub use media::*;
pub use sequences::*;
pub use status::*;
pub use stream::*;
