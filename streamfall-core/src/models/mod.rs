pub mod content;
pub mod provider;
pub mod quality;
pub mod resume;
pub mod session;
pub mod source;

pub use content::{ContentKey, MediaType};
pub use provider::{Provider, ProviderId};
pub use quality::{ManifestLevel, QualityLevel, QualitySelection};
pub use resume::{ResumeChoice, ResumePrompt, ResumeRecord};
pub use session::{CascadeState, SessionEvent, SessionGeneration, SessionSnapshot, EXHAUSTED_HINT};
pub use source::{CandidateSource, ProviderSourceList, ResolvedSource, SourceKind, SourceStatus};
