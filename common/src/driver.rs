//! Drive one entity through fetch, reconcile and tally.

use crate::entity::EntitySpec;
use crate::reconcile::{SyncContext, sync_item};
use crate::source::{PageRequest, Pagination, Source};
use crate::{DEFAULT_MAX_PAGES, DEFAULT_PER_PAGE, SyncResult, SyncStats};
use log::{info, warn};
use serde_json::Value;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub per_page: u32,
    pub max_pages: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// True once the source says there is nothing after `page`.
fn is_last_page(page: u32, pagination: Option<Pagination>) -> bool {
    pagination
        .and_then(|p| p.total_pages)
        .is_some_and(|total| page >= total)
}

fn reconcile_all(
    spec: &EntitySpec,
    items: &[Value],
    ctx: &mut SyncContext<'_>,
    stats: &mut SyncStats,
) {
    for item in items {
        stats.record(sync_item(spec, item, ctx));
    }
}

/// Sync every item `endpoint` serves for `spec`.
///
/// Items are reconciled one at a time, page by page. A failed fetch aborts
/// the run; a failed item is only counted.
///
/// # Errors
/// Returns the fetch error of the first page that could not be retrieved.
pub fn run_sync(
    spec: &EntitySpec,
    endpoint: &str,
    source: &dyn Source,
    ctx: &mut SyncContext<'_>,
    options: RunOptions,
) -> SyncResult<SyncStats> {
    let mut stats = SyncStats::default();

    if !spec.paginated {
        let fetched = source.fetch(endpoint, spec.source_field, None)?;
        info!("Fetched {} {} items", fetched.items.len(), spec.kind);
        reconcile_all(spec, &fetched.items, ctx, &mut stats);
        return Ok(stats);
    }

    let mut page = 1;
    loop {
        let request = PageRequest {
            page,
            per_page: options.per_page,
        };
        let fetched = match source.fetch(endpoint, spec.source_field, Some(request)) {
            Ok(fetched) => fetched,
            Err(e) => {
                if page > 1 {
                    warn!("Aborting {} on page {page}, so far: {stats}", spec.kind);
                }
                return Err(e);
            }
        };

        if fetched.items.is_empty() {
            info!("Page {page} of {} is empty, done", spec.kind);
            break;
        }
        info!(
            "Fetched page {page}{} of {} ({} items)",
            fetched
                .pagination
                .and_then(|p| p.total_pages)
                .map(|t| format!("/{t}"))
                .unwrap_or_default(),
            spec.kind,
            fetched.items.len()
        );
        reconcile_all(spec, &fetched.items, ctx, &mut stats);

        if is_last_page(page, fetched.pagination) {
            break;
        }
        if page >= options.max_pages {
            warn!(
                "Stopping {} after {page} pages; the source still reports more",
                spec.kind
            );
            break;
        }
        page += 1;
    }

    Ok(stats)
}
