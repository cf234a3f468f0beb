//! Placeholder resolution over the in-memory bundle.
//!
//! A token is `$bot-` followed by the longest run of bot-name characters; the
//! run must end in `-reference` or `-id`, and what precedes that suffix is the
//! bot name. Because the run is maximal, `$bot-a-id` can never match inside
//! `$bot-a-id-id` (the token of a bot named `a-id`).

use medbot_common::{Bundle, Resource};
use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::bundle::PLACEHOLDER_PREFIX;
use super::context::DeployContext;
use crate::errors::DeployError;

static TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$bot-([A-Za-z0-9_-]+)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderRole {
    Reference,
    Id,
}

/// Split a token body (`<name>-reference` / `<name>-id`) into name and role.
pub fn parse_token_body(body: &str) -> Option<(&str, PlaceholderRole)> {
    if let Some(name) = body.strip_suffix("-reference") {
        (!name.is_empty()).then_some((name, PlaceholderRole::Reference))
    } else if let Some(name) = body.strip_suffix("-id") {
        (!name.is_empty()).then_some((name, PlaceholderRole::Id))
    } else {
        None
    }
}

/// Replace every token in `text` with the resolved reference or id.
pub fn resolve_str(text: &str, ctx: &DeployContext) -> Result<String, DeployError> {
    let mut failure = None;
    let resolved = TOKEN_REGEX.replace_all(text, |caps: &Captures| {
        let body = &caps[1];
        let replacement = match parse_token_body(body) {
            Some((name, PlaceholderRole::Reference)) => ctx.reference(name),
            Some((name, PlaceholderRole::Id)) => ctx.bot_id(name).map(str::to_string),
            None => None,
        };
        replacement.unwrap_or_else(|| {
            failure.get_or_insert_with(|| caps[0].to_string());
            caps[0].to_string()
        })
    });
    match failure {
        Some(token) => Err(DeployError::IntegrityViolation(format!(
            "placeholder {} has no reconciled bot identity",
            token
        ))),
        None => Ok(resolved.into_owned()),
    }
}

fn resolve_in_place(field: &mut String, ctx: &DeployContext) -> Result<(), DeployError> {
    if field.contains(PLACEHOLDER_PREFIX) {
        *field = resolve_str(field, ctx)?;
    }
    Ok(())
}

/// Produce a copy of `bundle` with every placeholder-bearing field resolved.
///
/// The input bundle is left untouched so code deployment can still look up
/// binaries by their synthetic ids.
pub fn resolve_bundle(bundle: &Bundle, ctx: &DeployContext) -> Result<Bundle, DeployError> {
    let mut resolved = bundle.clone();
    for entry in &mut resolved.entry {
        resolve_in_place(&mut entry.request.url, ctx)?;
        match &mut entry.resource {
            Resource::Bot(bot) => {
                if let Some(id) = bot.id.as_mut() {
                    resolve_in_place(id, ctx)?;
                }
            }
            Resource::Subscription(subscription) => {
                resolve_in_place(&mut subscription.channel.endpoint, ctx)?;
            }
            Resource::Binary(_) => {}
        }
    }
    ensure_fully_resolved(&resolved)?;
    Ok(resolved)
}

/// No `$bot-` token may survive into a submitted transaction.
pub fn ensure_fully_resolved(bundle: &Bundle) -> Result<(), DeployError> {
    let serialized = serde_json::to_string(bundle)
        .map_err(|e| DeployError::IntegrityViolation(format!("bundle is not serializable: {}", e)))?;
    match serialized.find(PLACEHOLDER_PREFIX) {
        None => Ok(()),
        Some(at) => {
            let tail: String = serialized[at..].chars().take(48).collect();
            Err(DeployError::IntegrityViolation(format!(
                "unresolved placeholder remains in bundle near '{}'",
                tail
            )))
        }
    }
}
