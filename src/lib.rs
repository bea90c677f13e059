pub mod archive;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod harvest;
pub mod listing;
pub mod locate;
pub mod normalize;
pub mod pipeline;

pub use extract::{extract, CryptoRecord};
pub use locate::{locate, FieldSpec};
pub use normalize::normalize;
