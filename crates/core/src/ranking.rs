//! Keyword position summaries for the ranking tracker.

use serde::Serialize;

/// A keyword's position before and after a refresh. `None` means unranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionChange {
    pub previous: Option<i32>,
    pub current: Option<i32>,
}

/// Aggregate position counts. Buckets are cumulative (`top10` includes `top3`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingSummary {
    pub keywords_tracked: usize,
    pub top3: usize,
    pub top10: usize,
    pub top100: usize,
    pub unranked: usize,
    pub improved: usize,
    pub declined: usize,
}

/// Summarize a batch of position changes. Lower positions are better.
pub fn summarize(changes: &[PositionChange]) -> RankingSummary {
    let mut summary = RankingSummary {
        keywords_tracked: changes.len(),
        ..Default::default()
    };

    for change in changes {
        match change.current {
            Some(p) if p <= 3 => {
                summary.top3 += 1;
                summary.top10 += 1;
                summary.top100 += 1;
            }
            Some(p) if p <= 10 => {
                summary.top10 += 1;
                summary.top100 += 1;
            }
            Some(p) if p <= 100 => summary.top100 += 1,
            Some(_) => {}
            None => summary.unranked += 1,
        }

        match (change.previous, change.current) {
            (Some(prev), Some(cur)) if cur < prev => summary.improved += 1,
            (Some(prev), Some(cur)) if cur > prev => summary.declined += 1,
            (None, Some(_)) => summary.improved += 1,
            (Some(_), None) => summary.declined += 1,
            _ => {}
        }
    }

    summary
}
