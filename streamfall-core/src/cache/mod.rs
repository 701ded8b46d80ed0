pub mod singleflight;
pub mod source_cache;

pub use singleflight::SingleFlight;
pub use source_cache::{SourceHealthCache, SourceListKey};
