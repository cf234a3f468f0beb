//! Bundle builder: registry + build artifacts → one transaction bundle.
//!
//! Per descriptor, entries are emitted as source binary, compiled binary, bot
//! definition, then the subscription when the descriptor has criteria. The bot
//! definition points at its binaries by their bundle-scoped `urn:uuid:` ids and
//! carries placeholder tokens where the remote bot identity will go.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use medbot_common::{
    Binary, Bot, Bundle, BundleEntry, BundleRequest, CodeAttachment, Resource, Subscription,
    SubscriptionChannel, content_type,
};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::errors::DeployError;
use crate::registry::BotDescriptor;

pub const PLACEHOLDER_PREFIX: &str = "$bot-";
pub const RUNTIME_VERSION: &str = "awslambda";

/// Stand-in for `Bot/<id>` until the bot's identity is reconciled.
pub fn reference_placeholder(bot_name: &str) -> String {
    format!("{}{}-reference", PLACEHOLDER_PREFIX, bot_name)
}

/// Stand-in for the bare bot id until the bot's identity is reconciled.
pub fn id_placeholder(bot_name: &str) -> String {
    format!("{}{}-id", PLACEHOLDER_PREFIX, bot_name)
}

/// Which build output an artifact is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Source,
    Compiled,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Source => "source",
            ArtifactKind::Compiled => "compiled",
        }
    }

    fn content_type(self) -> &'static str {
        match self {
            ArtifactKind::Source => content_type::TYPESCRIPT,
            ArtifactKind::Compiled => content_type::JAVASCRIPT,
        }
    }
}

/// Source of bot build artifacts.
pub trait ArtifactStore {
    fn read(&self, bot_name: &str, kind: ArtifactKind) -> Result<Vec<u8>, DeployError>;
}

/// Artifacts laid out as `<source_dir>/<name>.<ext>` and `<dist_dir>/<name>.<ext>`.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    pub source_dir: PathBuf,
    pub dist_dir: PathBuf,
    pub source_extension: String,
    pub dist_extension: String,
}

impl FsArtifactStore {
    pub fn new(source_dir: impl AsRef<Path>, dist_dir: impl AsRef<Path>) -> Self {
        Self {
            source_dir: source_dir.as_ref().to_path_buf(),
            dist_dir: dist_dir.as_ref().to_path_buf(),
            source_extension: "ts".to_string(),
            dist_extension: "js".to_string(),
        }
    }

    pub fn with_extensions(mut self, source: &str, dist: &str) -> Self {
        self.source_extension = source.to_string();
        self.dist_extension = dist.to_string();
        self
    }

    pub fn path_for(&self, bot_name: &str, kind: ArtifactKind) -> PathBuf {
        match kind {
            ArtifactKind::Source => self
                .source_dir
                .join(format!("{}.{}", bot_name, self.source_extension)),
            ArtifactKind::Compiled => self
                .dist_dir
                .join(format!("{}.{}", bot_name, self.dist_extension)),
        }
    }
}

impl ArtifactStore for FsArtifactStore {
    fn read(&self, bot_name: &str, kind: ArtifactKind) -> Result<Vec<u8>, DeployError> {
        let path = self.path_for(bot_name, kind);
        std::fs::read(&path).map_err(|source| DeployError::MissingArtifact {
            bot: bot_name.to_string(),
            role: kind.as_str(),
            path,
            source,
        })
    }
}

fn binary_entry(bytes: &[u8], kind: ArtifactKind) -> BundleEntry {
    BundleEntry {
        full_url: Some(format!("urn:uuid:{}", Uuid::new_v4())),
        request: BundleRequest::post("Binary"),
        resource: Resource::Binary(Binary {
            id: None,
            content_type: kind.content_type().to_string(),
            data: Some(STANDARD.encode(bytes)),
        }),
    }
}

/// Entries for a single descriptor, in bundle order.
fn descriptor_entries(
    descriptor: &BotDescriptor,
    store: &dyn ArtifactStore,
) -> Result<Vec<BundleEntry>, DeployError> {
    let name = &descriptor.name;
    let src_entry = binary_entry(&store.read(name, ArtifactKind::Source)?, ArtifactKind::Source);
    let dist_entry = binary_entry(
        &store.read(name, ArtifactKind::Compiled)?,
        ArtifactKind::Compiled,
    );
    let reference = reference_placeholder(name);

    let bot = BundleEntry {
        full_url: None,
        request: BundleRequest::put(reference.clone()),
        resource: Resource::Bot(Bot {
            id: Some(id_placeholder(name)),
            name: name.clone(),
            runtime_version: Some(RUNTIME_VERSION.to_string()),
            cron_string: descriptor.cron.clone(),
            source_code: Some(CodeAttachment {
                content_type: content_type::TYPESCRIPT.to_string(),
                url: src_entry.full_url.clone().unwrap_or_default(),
            }),
            executable_code: Some(CodeAttachment {
                content_type: content_type::JAVASCRIPT.to_string(),
                url: dist_entry.full_url.clone().unwrap_or_default(),
            }),
        }),
    };

    let mut entries = vec![src_entry, dist_entry, bot];

    if let Some(criteria) = &descriptor.criteria {
        entries.push(BundleEntry {
            full_url: None,
            request: BundleRequest::put(format!("Subscription?url={}", reference)),
            resource: Resource::Subscription(Subscription {
                id: None,
                status: "active".to_string(),
                reason: format!("{}-subscription", name),
                criteria: criteria.clone(),
                extension: descriptor.extension.clone(),
                channel: SubscriptionChannel {
                    channel_type: "rest-hook".to_string(),
                    endpoint: reference,
                    payload: content_type::FHIR_JSON.to_string(),
                },
            }),
        });
    }

    Ok(entries)
}

/// Build the transaction bundle for every descriptor, in registry order.
///
/// A missing artifact aborts the whole build; no partial bundle is returned.
pub fn build_bundle(
    descriptors: &[BotDescriptor],
    store: &dyn ArtifactStore,
) -> Result<Bundle, DeployError> {
    let mut entries = Vec::new();
    for descriptor in descriptors {
        entries.extend(descriptor_entries(descriptor, store)?);
    }
    tracing::debug!(
        bots = descriptors.len(),
        entries = entries.len(),
        "built transaction bundle"
    );
    Ok(Bundle::transaction(entries))
}

/// Bot definitions in bundle order.
pub fn bot_definitions(bundle: &Bundle) -> impl Iterator<Item = &Bot> {
    bundle.entry.iter().filter_map(|e| match &e.resource {
        Resource::Bot(bot) => Some(bot),
        _ => None,
    })
}
