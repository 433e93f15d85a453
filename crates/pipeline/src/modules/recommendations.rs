//! Recommendation generation through the completion service.

use autopilot_core::error::CoreError;
use autopilot_core::recommendation::{parse_completion, response_schema, ParsedRecommendation};
use autopilot_core::run::ModuleResult;
use autopilot_core::types::DbId;
use autopilot_db::models::recommendation::CreateRecommendation;
use autopilot_db::models::site::SitePage;
use serde::Serialize;

use super::RunContext;
use crate::error::{PipelineError, PipelineResult};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PromptPage<'a> {
    url: &'a str,
    clicks_28d: i64,
    clicks_prev_28d: i64,
    impressions_28d: i64,
}

pub async fn run(ctx: &RunContext<'_>) -> PipelineResult<ModuleResult> {
    if ctx.pages.is_empty() {
        return Ok(ModuleResult::skipped("no pages with metrics"));
    }
    let top = &ctx.pages[..ctx.pages.len().min(ctx.config.recommendation_top_pages)];
    let prompt = build_prompt(ctx, top)?;

    let completion = &ctx.stores.completion;
    let timeout = ctx.config.completion_timeout();
    let reply = tokio::time::timeout(timeout, completion.complete(&prompt, &response_schema()))
        .await
        .map_err(|_| PipelineError::Timeout {
            operation: "completion",
            secs: timeout.as_secs(),
        })??;

    let parsed = parse_completion(reply).map_err(|e| match e {
        CoreError::Validation(msg) => PipelineError::Validation(msg),
        other => PipelineError::Core(other),
    })?;

    let model = completion.model().to_string();
    let mut generated = 0usize;
    let mut duplicates = 0usize;
    for rec in &parsed {
        let input = to_create(ctx, rec, &model);
        match ctx.stores.recommendations.insert_if_absent(&input).await? {
            Some(_) => generated += 1,
            None => duplicates += 1,
        }
    }

    tracing::info!(
        site_id = %ctx.site.id,
        parsed = parsed.len(),
        generated,
        duplicates,
        "Recommendations generated",
    );

    Ok(ModuleResult::ok(serde_json::json!({
        "parsed": parsed.len(),
        "generated": generated,
        "duplicates": duplicates,
        "model": model,
    })))
}

fn build_prompt(ctx: &RunContext<'_>, top: &[SitePage]) -> PipelineResult<String> {
    let pages: Vec<PromptPage<'_>> = top
        .iter()
        .map(|p| PromptPage {
            url: &p.url,
            clicks_28d: p.clicks_28d,
            clicks_prev_28d: p.clicks_prev_28d,
            impressions_28d: p.impressions_28d,
        })
        .collect();
    let profile = ctx
        .knowledge
        .map(|k| k.business_profile.clone())
        .unwrap_or(serde_json::Value::Null);

    let pages_json = serde_json::to_string_pretty(&pages)
        .map_err(|e| CoreError::Internal(format!("failed to encode pages: {e}")))?;
    let profile_json = serde_json::to_string_pretty(&profile)
        .map_err(|e| CoreError::Internal(format!("failed to encode profile: {e}")))?;

    Ok(format!(
        "Site: {name} ({domain})\n\n\
         Business profile:\n{profile_json}\n\n\
         Top pages by clicks over the last 28 days:\n{pages_json}\n\n\
         Propose specific, high-impact changes for these pages. Use the page URL \
         exactly as listed. Mark a change auto_fixable only when it is a direct \
         replacement of a single field value.",
        name = ctx.site.name,
        domain = ctx.site.domain,
    ))
}

fn to_create(ctx: &RunContext<'_>, rec: &ParsedRecommendation, model: &str) -> CreateRecommendation {
    CreateRecommendation {
        site_id: ctx.site.id,
        page_id: rec
            .page_url
            .as_deref()
            .and_then(|url| resolve_page(ctx.pages, url)),
        title: rec.title.clone(),
        description: rec.description.clone(),
        category: rec.category.as_str().to_string(),
        priority: rec.priority.as_str().to_string(),
        current_value: rec.current_value.clone(),
        suggested_value: rec.suggested_value.clone(),
        confidence: rec.confidence,
        auto_fixable: rec.auto_fixable,
        model: model.to_string(),
        generated_at: ctx.now,
    }
}

/// Match a URL from the reply to a known page, ignoring scheme and host.
fn resolve_page(pages: &[SitePage], url: &str) -> Option<DbId> {
    let wanted = url_path(url);
    pages.iter().find(|p| url_path(&p.url) == wanted).map(|p| p.id)
}

fn url_path(url: &str) -> &str {
    let path = match url.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("/", |i| &rest[i..]),
        None => url,
    };
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_path_ignores_host_and_trailing_slash() {
        assert_eq!(url_path("https://acme.test/pricing/"), "/pricing");
        assert_eq!(url_path("/pricing"), "/pricing");
        assert_eq!(url_path("https://acme.test"), "/");
        assert_eq!(url_path("/"), "/");
    }
}
