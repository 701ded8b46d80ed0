pub mod availability;
pub mod cascade;
pub mod fetcher;
pub mod quality;
pub mod resume;
pub mod session;

pub use availability::ProviderAvailability;
pub use cascade::{Adoption, CascadeOutcome, FallbackCascade};
pub use fetcher::{FetchError, FetchOptions, SourceFetcher};
pub use quality::{build_levels, QualitySelector};
pub use resume::{
    InMemoryResumeStore, JsonFileResumeStore, ResumeLatch, ResumeManager, ResumeStore,
    DEFAULT_RESUME_THRESHOLD_SECS,
};
pub use session::{SessionController, DEFAULT_EVENT_CAPACITY};
