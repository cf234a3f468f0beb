//! Identity reconciliation: make sure each bot exists remotely with the
//! declared membership privilege before the bundle goes out.

use medbot_common::{Bot, ProjectMembership, narrow, reference_string};
use serde_json::json;
use tracing::{debug, info, warn};

use super::context::{DeployContext, RemoteBotIdentity};
use crate::errors::DeployError;
use crate::platform::FhirPlatform;
use crate::registry::BotDescriptor;

/// Search by exact name; create with just the name when absent.
///
/// Plain `name` search is a case-insensitive prefix match, so the `:exact`
/// modifier is used and the returned name is checked again.
///
/// Returns the bot and whether it was created by this call.
async fn find_or_create_bot(
    platform: &dyn FhirPlatform,
    project_id: &str,
    name: &str,
) -> Result<(Bot, bool), DeployError> {
    let found = platform.search_one("Bot", &[("name:exact", name)]).await?;
    if let Some(value) = found {
        let bot: Bot = narrow("Bot", value).map_err(|e| DeployError::unexpected("search Bot", e))?;
        if bot.name == name {
            return Ok((bot, false));
        }
        warn!(
            bot = name,
            found = %bot.name,
            "search returned a bot with a different name, ignoring it"
        );
    }

    info!(bot = name, "bot not found, creating");
    let path = format!("admin/projects/{}/bot", project_id);
    let created = platform.post(&path, json!({ "name": name })).await?;
    let bot: Bot = narrow("Bot", created).map_err(|e| DeployError::unexpected(&path, e))?;
    Ok((bot, true))
}

/// Reconcile one descriptor and record the result in `ctx`.
pub async fn reconcile_bot(
    platform: &dyn FhirPlatform,
    ctx: &mut DeployContext,
    descriptor: &BotDescriptor,
) -> Result<RemoteBotIdentity, DeployError> {
    let name = descriptor.name.as_str();
    let (bot, created) = find_or_create_bot(platform, &ctx.project_id, name).await?;
    let bot_id = bot.id.ok_or_else(|| {
        DeployError::remote(format!("resolve bot '{}'", name), "platform returned a bot without an id")
    })?;

    let user = reference_string("Bot", &bot_id);
    let membership = platform
        .search_one("ProjectMembership", &[("user", user.as_str())])
        .await?
        .map(|value| narrow::<ProjectMembership>("ProjectMembership", value))
        .transpose()
        .map_err(|e| DeployError::unexpected("search ProjectMembership", e))?;

    let mut identity = RemoteBotIdentity {
        id: bot_id,
        membership_id: None,
        is_admin: false,
        created,
        membership_updated: false,
    };

    match membership {
        // Membership provisioning is owned by the platform; nothing to align.
        None => debug!(bot = name, "no project membership found, skipping admin alignment"),
        Some(mut membership) => {
            identity.membership_id = Some(membership.id.clone());
            identity.is_admin = membership.is_admin();
            if membership.is_admin() != descriptor.wants_admin() {
                info!(
                    bot = name,
                    admin = descriptor.wants_admin(),
                    "aligning membership admin flag"
                );
                membership.admin = Some(descriptor.wants_admin());
                let path = format!("admin/projects/{}/members/{}", ctx.project_id, membership.id);
                let body = serde_json::to_value(&membership)
                    .map_err(|e| DeployError::remote(&path, format!("failed to encode membership: {}", e)))?;
                platform.post(&path, body).await?;
                identity.is_admin = descriptor.wants_admin();
                identity.membership_updated = true;
            }
        }
    }

    ctx.record(name, identity.clone());
    Ok(identity)
}

/// Reconcile every descriptor in order. The first failure aborts the rest.
pub async fn reconcile_all(
    platform: &dyn FhirPlatform,
    ctx: &mut DeployContext,
    descriptors: &[BotDescriptor],
) -> Result<(), DeployError> {
    for descriptor in descriptors {
        reconcile_bot(platform, ctx, descriptor).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testing::FakePlatform;

    fn ctx() -> DeployContext {
        DeployContext::new("p1")
    }

    #[tokio::test]
    async fn missing_bot_is_created_once_without_membership_update() {
        let platform = FakePlatform::new();
        let mut ctx = ctx();

        let identity = reconcile_bot(&platform, &mut ctx, &BotDescriptor::new("a"))
            .await
            .unwrap();

        assert!(identity.created);
        assert!(!identity.membership_updated);
        assert_eq!(platform.calls_starting_with("post admin/projects/p1/bot"), 1);
        assert_eq!(platform.calls_starting_with("post admin/projects/p1/members"), 0);
        assert_eq!(ctx.identity("a").unwrap().id, identity.id);
        assert_eq!(platform.count("Bot"), 1);
    }

    #[tokio::test]
    async fn existing_bot_is_reused() {
        let platform = FakePlatform::new();
        platform.insert(json!({"resourceType": "Bot", "id": "bot-1", "name": "a"}));
        let mut ctx = ctx();

        let identity = reconcile_bot(&platform, &mut ctx, &BotDescriptor::new("a"))
            .await
            .unwrap();

        assert_eq!(identity.id, "bot-1");
        assert!(!identity.created);
        assert_eq!(platform.calls_starting_with("post"), 0);
        assert_eq!(ctx.reference("a").as_deref(), Some("Bot/bot-1"));
    }

    #[tokio::test]
    async fn diverging_admin_flag_is_updated() {
        let platform = FakePlatform::new();
        platform.insert(json!({"resourceType": "Bot", "id": "bot-1", "name": "a"}));
        platform.insert(json!({
            "resourceType": "ProjectMembership",
            "id": "m-1",
            "user": {"reference": "Bot/bot-1"},
            "profile": {"reference": "Bot/bot-1"}
        }));
        let mut ctx = ctx();

        let identity = reconcile_bot(
            &platform,
            &mut ctx,
            &BotDescriptor::new("a").with_admin_membership(true),
        )
        .await
        .unwrap();

        assert!(identity.membership_updated);
        assert!(identity.is_admin);
        assert_eq!(identity.membership_id.as_deref(), Some("m-1"));
        let stored = platform.find("ProjectMembership", "m-1").unwrap();
        assert_eq!(stored["admin"], json!(true));
        assert_eq!(stored["profile"]["reference"], "Bot/bot-1");
        assert_eq!(
            platform.calls_starting_with("post admin/projects/p1/members/m-1"),
            1
        );
    }

    #[tokio::test]
    async fn matching_admin_flag_is_left_alone() {
        let platform = FakePlatform::new();
        platform.insert(json!({"resourceType": "Bot", "id": "bot-1", "name": "a"}));
        platform.insert(json!({
            "resourceType": "ProjectMembership",
            "id": "m-1",
            "admin": false,
            "user": {"reference": "Bot/bot-1"}
        }));
        let mut ctx = ctx();

        let identity = reconcile_bot(&platform, &mut ctx, &BotDescriptor::new("a"))
            .await
            .unwrap();

        assert!(!identity.membership_updated);
        assert_eq!(platform.calls_starting_with("post"), 0);
    }

    #[tokio::test]
    async fn search_failure_aborts_remaining_bots() {
        let platform = FakePlatform::new();
        platform.fail_on("search ProjectMembership");
        let mut ctx = ctx();
        let descriptors = vec![BotDescriptor::new("a"), BotDescriptor::new("b")];

        let err = reconcile_all(&platform, &mut ctx, &descriptors)
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::RemoteCall { .. }));
        assert!(ctx.identity("a").is_none());
        assert_eq!(platform.calls_starting_with("search Bot?name:exact=b"), 0);
    }

    #[tokio::test]
    async fn bot_sharing_a_name_prefix_is_not_reused() {
        let platform = FakePlatform::new();
        platform.insert(json!({"resourceType": "Bot", "id": "other", "name": "start-triage-v2"}));
        let mut ctx = ctx();

        let identity = reconcile_bot(&platform, &mut ctx, &BotDescriptor::new("start-triage"))
            .await
            .unwrap();

        assert!(identity.created);
        assert_ne!(identity.id, "other");
        assert_eq!(platform.count("Bot"), 2);
        assert_eq!(platform.calls_starting_with("search Bot?name:exact=start-triage"), 1);
    }

    #[tokio::test]
    async fn search_result_with_other_name_is_ignored() {
        let platform = FakePlatform::new();
        platform.insert(json!({"resourceType": "Bot", "id": "other", "name": "A"}));
        platform.ignore_exact_modifier();
        let mut ctx = ctx();

        let identity = reconcile_bot(&platform, &mut ctx, &BotDescriptor::new("a"))
            .await
            .unwrap();

        assert!(identity.created);
        assert_ne!(identity.id, "other");
    }

    #[tokio::test]
    async fn create_failure_surfaces() {
        let platform = FakePlatform::new();
        platform.fail_on("post admin/projects/p1/bot");
        let mut ctx = ctx();

        let err = reconcile_bot(&platform, &mut ctx, &BotDescriptor::new("a"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("admin/projects/p1/bot"));
    }
}
