//! Business logic for the onboarding pipeline

pub mod claim;
pub mod confidence_router;
pub mod extractor;
pub mod invitations;
pub mod migration;
pub mod normalizer;
pub mod pipeline;
pub mod publisher_matcher;
pub mod publisher_writer;
pub mod security_gate;
