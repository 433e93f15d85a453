//! Keyword ranking refresh.

use autopilot_core::ranking::{summarize, PositionChange};
use autopilot_core::run::ModuleResult;

use super::RunContext;
use crate::error::{PipelineError, PipelineResult};

pub async fn run(ctx: &RunContext<'_>) -> PipelineResult<ModuleResult> {
    let keywords = ctx.stores.metrics.tracked_keywords(ctx.site.id).await?;
    if keywords.is_empty() {
        return Ok(ModuleResult::skipped("no tracked keywords"));
    }
    let Some(fetcher) = &ctx.stores.ranks else {
        return Ok(ModuleResult::skipped("rank source not configured"));
    };

    let names: Vec<String> = keywords.iter().map(|k| k.keyword.clone()).collect();
    let timeout = ctx.config.rank_fetch_timeout();
    let positions = tokio::time::timeout(timeout, fetcher.fetch_positions(ctx.site, &names))
        .await
        .map_err(|_| PipelineError::Timeout {
            operation: "rank fetch",
            secs: timeout.as_secs(),
        })??;

    let mut changes = Vec::with_capacity(keywords.len());
    for keyword in &keywords {
        let current = positions.get(&keyword.keyword).copied().flatten();
        ctx.stores
            .metrics
            .record_position(keyword.id, current, ctx.now)
            .await?;
        changes.push(PositionChange {
            previous: keyword.position,
            current,
        });
    }

    Ok(ModuleResult::ok(summarize(&changes)))
}
