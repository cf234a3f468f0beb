//! Shared FHIR resource types for medbot.
//!
//! Only the subset of FHIR R4 that the deployer and the bot handlers touch is
//! modelled here. Unknown fields on remote resources are ignored on read, except
//! where a resource must be echoed back verbatim (see [`ProjectMembership`]).

pub mod bundle;
pub mod resources;

pub use bundle::{
    Bundle, BundleEntry, BundleRequest, BundleType, EntryResponse, HttpVerb, ResponseEntry,
    SearchBundle, SearchEntry, TransactionResponse,
};
pub use resources::{
    Binary, Bot, CodeAttachment, ContactPoint, Extension, HumanName, Patient, Practitioner,
    ProjectMembership, Resource, ResourceError, Subscription, SubscriptionChannel,
    narrow, reference_string,
};

/// MIME types used on Binary and Bot resources.
pub mod content_type {
    pub const TYPESCRIPT: &str = "text/typescript";
    pub const JAVASCRIPT: &str = "application/javascript";
    pub const FHIR_JSON: &str = "application/fhir+json";
}
