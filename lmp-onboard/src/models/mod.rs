//! Data types for the onboarding pipeline

pub mod email_event;
pub mod extraction;
pub mod processing;
pub mod publisher;

pub use email_event::{CampaignInfo, EmailContent, EmailEvent, EmailMessage, EventMetadata};
pub use extraction::{
    ExtractedOffering, ExtractedPublisher, ExtractedWebsite, ExtractionRequest, ExtractionResult,
};
pub use processing::{ProcessingLogEntry, ProcessingStatus};
pub use publisher::{AccountStatus, Publisher};
