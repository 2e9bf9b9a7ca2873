pub mod id;

pub use id::TaggedId;
