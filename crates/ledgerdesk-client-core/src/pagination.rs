//! Paginated list controller.
//!
//! Orchestrates page/size/sort state over a caller-supplied fetch function,
//! routed through the [`Debounced`] invoker so bursts of navigation collapse
//! into one request. Responses arrive as the tagged [`ListResult`]; a bare
//! array flips the controller into non-paginated mode, a page envelope
//! updates the metadata. Because the debounce keeps only the most recent
//! call, overlapping loads resolve in wall-clock completion order, not
//! request order; displayed state reflects whichever response lands last.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;

use crate::debounce::{DebounceOutcome, Debounced};
use crate::envelope::{ApiError, ListResult};

/// Sort direction carried in every list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Fully merged query for one list request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub page: u32,
    pub per_page: u32,
    pub sort_by: String,
    pub sort_order: SortOrder,
    pub extra: Vec<(String, String)>,
}

impl ListQuery {
    /// Flatten into query-string pairs for the HTTP layer.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page.to_string()),
            ("per_page".to_string(), self.per_page.to_string()),
            ("sort_by".to_string(), self.sort_by.clone()),
            ("sort_order".to_string(), self.sort_order.as_str().to_string()),
        ];
        pairs.extend(self.extra.iter().cloned());
        pairs
    }
}

/// Per-call overrides merged over the controller's base query.
#[derive(Debug, Clone, Default)]
pub struct QueryOverrides {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub extra: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct PaginatorConfig {
    pub per_page: u32,
    pub sort_by: String,
    pub sort_order: SortOrder,
    /// Issue one load at construction. Requires a running tokio runtime.
    pub auto_load: bool,
    pub debounce_delay: Duration,
}

impl Default for PaginatorConfig {
    fn default() -> Self {
        Self {
            per_page: 10,
            sort_by: "created_at".to_string(),
            sort_order: SortOrder::Desc,
            auto_load: true,
            debounce_delay: Duration::from_millis(300),
        }
    }
}

/// Controller state, cloneable as a snapshot.
#[derive(Debug, Clone)]
pub struct PageState<T> {
    pub current_page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub last_page: u32,
    pub from: u64,
    pub to: u64,
    pub is_paginated: bool,
    pub items: Vec<T>,
    pub is_loading: bool,
    pub has_error: bool,
}

impl<T> PageState<T> {
    fn new(per_page: u32) -> Self {
        Self {
            current_page: 1,
            per_page: per_page.max(1),
            total_items: 0,
            last_page: 1,
            from: 0,
            to: 0,
            is_paginated: true,
            items: Vec::new(),
            is_loading: false,
            has_error: false,
        }
    }
}

type FetchFn<T> =
    Arc<dyn Fn(ListQuery) -> BoxFuture<'static, Result<ListResult<T>, ApiError>> + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&ApiError) + Send + Sync>;

/// Paginated list controller over a debounced fetch function.
///
/// Dropping the controller cancels any pending debounce timer, so no load
/// fires after disposal.
pub struct Paginator<T> {
    config: PaginatorConfig,
    state: Arc<Mutex<PageState<T>>>,
    debounced: Debounced<ListQuery, Option<Vec<T>>>,
}

impl<T> Paginator<T>
where
    T: Clone + Send + 'static,
{
    /// Build a controller whose load failures are only logged.
    pub fn new<F, Fut>(config: PaginatorConfig, fetch: F) -> Self
    where
        F: Fn(ListQuery) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ListResult<T>, ApiError>> + Send + 'static,
    {
        Self::with_error_handler(config, fetch, |error: &ApiError| {
            tracing::error!(error = %error, "paginated list load failed");
        })
    }

    /// Build a controller with a caller-supplied failure handler.
    pub fn with_error_handler<F, Fut, H>(config: PaginatorConfig, fetch: F, on_error: H) -> Self
    where
        F: Fn(ListQuery) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ListResult<T>, ApiError>> + Send + 'static,
        H: Fn(&ApiError) + Send + Sync + 'static,
    {
        let state = Arc::new(Mutex::new(PageState::new(config.per_page)));
        let fetch: FetchFn<T> = Arc::new(move |query| Box::pin(fetch(query)));
        let on_error: ErrorHandler = Arc::new(on_error);

        let run = {
            let state = Arc::clone(&state);
            move |query: ListQuery| {
                let state = Arc::clone(&state);
                let fetch = Arc::clone(&fetch);
                let on_error = Arc::clone(&on_error);
                async move {
                    {
                        let mut state = lock(&state);
                        state.is_loading = true;
                        state.has_error = false;
                    }
                    match fetch(query).await {
                        Ok(list) => {
                            let mut state = lock(&state);
                            let items = apply_result(&mut state, list);
                            state.is_loading = false;
                            Some(items)
                        }
                        Err(error) => {
                            {
                                // Stale items stay visible on error.
                                let mut state = lock(&state);
                                state.has_error = true;
                                state.is_loading = false;
                            }
                            on_error(&error);
                            None
                        }
                    }
                }
            }
        };

        let paginator = Self {
            debounced: Debounced::new(config.debounce_delay, run),
            state,
            config,
        };
        if paginator.config.auto_load {
            let query = paginator.build_query(&QueryOverrides::default());
            drop(paginator.debounced.call(query));
        }
        paginator
    }

    /// Load a page, merging `overrides` over the controller's base query.
    ///
    /// Resolves to `Settled(Some(items))` when this call's request ran and
    /// succeeded, `Settled(None)` when it ran and failed, and `Superseded`
    /// when a later call replaced it inside the debounce window.
    pub async fn load_page(&self, overrides: QueryOverrides) -> DebounceOutcome<Option<Vec<T>>> {
        let query = self.build_query(&overrides);
        self.debounced.call(query).await
    }

    /// Navigate to `page`. Out-of-bounds pages are a no-op resolving with
    /// the current, unchanged item list.
    pub async fn go_to_page(&self, page: u32) -> Vec<T> {
        {
            let mut state = lock(&self.state);
            if page == 0 || page > state.last_page {
                return state.items.clone();
            }
            state.current_page = page;
        }
        self.load_current().await
    }

    /// Reload the current page.
    pub async fn refresh(&self) -> Vec<T> {
        self.load_current().await
    }

    /// Change the page size. While paginated this reloads at page 1.
    pub async fn set_per_page(&self, per_page: u32) -> Vec<T> {
        let paginated = {
            let mut state = lock(&self.state);
            state.per_page = per_page.max(1);
            state.is_paginated
        };
        if paginated {
            lock(&self.state).current_page = 1;
            self.load_current().await
        } else {
            self.items()
        }
    }

    /// Cancel any pending load, restore defaults, and issue a fresh load
    /// at page 1 with `extra` query parameters.
    pub async fn reset(&self, extra: Vec<(String, String)>) -> Vec<T> {
        self.debounced.cancel();
        {
            let mut state = lock(&self.state);
            let per_page = self.config.per_page;
            *state = PageState::new(per_page);
        }
        match self
            .load_page(QueryOverrides {
                extra,
                ..QueryOverrides::default()
            })
            .await
        {
            DebounceOutcome::Settled(Some(items)) => items,
            _ => self.items(),
        }
    }

    /// Cancel any pending debounce timer without issuing a new load.
    pub fn cancel(&self) {
        self.debounced.cancel();
    }

    #[must_use]
    pub fn snapshot(&self) -> PageState<T> {
        lock(&self.state).clone()
    }

    #[must_use]
    pub fn items(&self) -> Vec<T> {
        lock(&self.state).items.clone()
    }

    #[must_use]
    pub fn current_page(&self) -> u32 {
        lock(&self.state).current_page
    }

    #[must_use]
    pub fn last_page(&self) -> u32 {
        lock(&self.state).last_page
    }

    #[must_use]
    pub fn total_items(&self) -> u64 {
        lock(&self.state).total_items
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        lock(&self.state).is_loading
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        lock(&self.state).has_error
    }

    #[must_use]
    pub fn is_paginated(&self) -> bool {
        lock(&self.state).is_paginated
    }

    async fn load_current(&self) -> Vec<T> {
        match self.load_page(QueryOverrides::default()).await {
            DebounceOutcome::Settled(Some(items)) => items,
            _ => self.items(),
        }
    }

    fn build_query(&self, overrides: &QueryOverrides) -> ListQuery {
        let state = lock(&self.state);
        ListQuery {
            page: overrides.page.unwrap_or(state.current_page),
            per_page: overrides.per_page.unwrap_or(state.per_page),
            sort_by: self.config.sort_by.clone(),
            sort_order: self.config.sort_order,
            extra: overrides.extra.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Paginator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paginator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn lock<T>(state: &Mutex<PageState<T>>) -> MutexGuard<'_, PageState<T>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn apply_result<T: Clone>(state: &mut PageState<T>, result: ListResult<T>) -> Vec<T> {
    match result {
        ListResult::Items(items) => {
            state.is_paginated = false;
            state.total_items = items.len() as u64;
            state.current_page = 1;
            state.last_page = 1;
            state.from = u64::from(!items.is_empty());
            state.to = items.len() as u64;
            state.items = items;
        }
        ListResult::Page(page) => {
            state.is_paginated = true;
            state.current_page = page.current_page.max(1);
            state.per_page = page.per_page.max(1);
            state.total_items = page.total;
            state.last_page = page
                .last_page
                .unwrap_or_else(|| ceil_pages(page.total, state.per_page))
                .max(1);

            let count = page.data.len() as u64;
            let computed_from = if count == 0 {
                0
            } else {
                u64::from(state.current_page - 1) * u64::from(state.per_page) + 1
            };
            state.from = page.from.unwrap_or(computed_from);
            state.to = page
                .to
                .unwrap_or(if count == 0 { 0 } else { computed_from + count - 1 });
            state.items = page.data;
        }
    }
    state.items.clone()
}

fn ceil_pages(total: u64, per_page: u32) -> u32 {
    total.div_ceil(u64::from(per_page.max(1))).max(1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::PageEnvelope;
    use http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn no_auto() -> PaginatorConfig {
        PaginatorConfig {
            auto_load: false,
            debounce_delay: Duration::from_millis(10),
            ..PaginatorConfig::default()
        }
    }

    fn envelope_page() -> ListResult<u32> {
        ListResult::Page(PageEnvelope {
            data: vec![1, 2],
            current_page: 2,
            per_page: 2,
            total: 5,
            last_page: None,
            from: None,
            to: None,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn bare_array_switches_to_non_paginated_mode() {
        let paginator = Paginator::new(no_auto(), |_query| async {
            Ok(ListResult::Items(vec![1u32, 2, 3]))
        });

        let outcome = paginator.load_page(QueryOverrides::default()).await;
        assert_eq!(outcome.settled(), Some(Some(vec![1, 2, 3])));

        let state = paginator.snapshot();
        assert!(!state.is_paginated);
        assert_eq!(state.current_page, 1);
        assert_eq!(state.last_page, 1);
        assert_eq!(state.total_items, 3);
        assert!(!state.is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn page_envelope_computes_missing_metadata() {
        let paginator = Paginator::new(no_auto(), |_query| async { Ok(envelope_page()) });

        paginator.load_page(QueryOverrides::default()).await;

        let state = paginator.snapshot();
        assert!(state.is_paginated);
        assert_eq!(state.current_page, 2);
        assert_eq!(state.last_page, 3, "ceil(5 / 2)");
        assert_eq!(state.from, 3);
        assert_eq!(state.to, 4);
        assert_eq!(state.items, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_bounds_navigation_is_a_no_op() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let paginator = {
            let fetches = Arc::clone(&fetches);
            Paginator::new(no_auto(), move |_query| {
                let fetches = Arc::clone(&fetches);
                async move {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(envelope_page())
                }
            })
        };
        paginator.load_page(QueryOverrides::default()).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        let before = paginator.snapshot();
        assert_eq!(paginator.go_to_page(0).await, before.items);
        assert_eq!(paginator.go_to_page(before.last_page + 1).await, before.items);
        assert_eq!(paginator.current_page(), before.current_page);
        assert_eq!(fetches.load(Ordering::SeqCst), 1, "no extra fetches");
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_loads_coalesces_to_the_last_query() {
        let queries = Arc::new(Mutex::new(Vec::new()));
        let paginator = {
            let queries = Arc::clone(&queries);
            Paginator::new(no_auto(), move |query: ListQuery| {
                let queries = Arc::clone(&queries);
                async move {
                    queries.lock().unwrap().push(query);
                    Ok(ListResult::Items(vec![0u32]))
                }
            })
        };

        let first = paginator.load_page(QueryOverrides {
            extra: vec![("search".to_string(), "a".to_string())],
            ..QueryOverrides::default()
        });
        let second = paginator.load_page(QueryOverrides {
            extra: vec![("search".to_string(), "ab".to_string())],
            ..QueryOverrides::default()
        });

        assert_eq!(first.await.settled(), None, "first call superseded");
        assert!(second.await.settled().is_some());

        let recorded = queries.lock().unwrap().clone();
        assert_eq!(recorded.len(), 1);
        assert_eq!(
            recorded[0].extra,
            vec![("search".to_string(), "ab".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_stale_items_visible() {
        let fail = Arc::new(AtomicUsize::new(0));
        let handled = Arc::new(AtomicUsize::new(0));
        let paginator = {
            let fail = Arc::clone(&fail);
            let handled = Arc::clone(&handled);
            Paginator::with_error_handler(
                no_auto(),
                move |_query| {
                    let fail = Arc::clone(&fail);
                    async move {
                        if fail.load(Ordering::SeqCst) == 0 {
                            Ok(ListResult::Items(vec![7u32, 8]))
                        } else {
                            Err(ApiError::Request {
                                status: StatusCode::INTERNAL_SERVER_ERROR,
                                message: None,
                            })
                        }
                    }
                },
                move |_error| {
                    handled.fetch_add(1, Ordering::SeqCst);
                },
            )
        };

        paginator.load_page(QueryOverrides::default()).await;
        assert_eq!(paginator.items(), vec![7, 8]);

        fail.store(1, Ordering::SeqCst);
        let outcome = paginator.load_page(QueryOverrides::default()).await;
        assert_eq!(outcome.settled(), Some(None), "ran and failed");

        assert!(paginator.has_error());
        assert_eq!(paginator.items(), vec![7, 8], "stale but visible");
        assert_eq!(handled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn per_page_change_reloads_at_page_one() {
        let queries = Arc::new(Mutex::new(Vec::new()));
        let paginator = {
            let queries = Arc::clone(&queries);
            Paginator::new(no_auto(), move |query: ListQuery| {
                let queries = Arc::clone(&queries);
                async move {
                    queries.lock().unwrap().push(query);
                    Ok(envelope_page())
                }
            })
        };
        paginator.load_page(QueryOverrides::default()).await;
        assert!(paginator.is_paginated());

        paginator.set_per_page(5).await;

        let recorded = queries.lock().unwrap().clone();
        let last = recorded.last().expect("reload issued");
        assert_eq!(last.page, 1);
        assert_eq!(last.per_page, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_pending_and_restores_defaults() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let paginator = {
            let fetches = Arc::clone(&fetches);
            Paginator::new(no_auto(), move |_query| {
                let fetches = Arc::clone(&fetches);
                async move {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(ListResult::Items(vec![1u32]))
                }
            })
        };

        // Never awaited: reset's cancel must keep it from firing.
        let pending = paginator.load_page(QueryOverrides {
            page: Some(9),
            ..QueryOverrides::default()
        });
        let items = paginator.reset(Vec::new()).await;

        assert_eq!(pending.await.settled(), None);
        assert_eq!(items, vec![1]);
        assert_eq!(fetches.load(Ordering::SeqCst), 1, "only the reset load ran");
        assert_eq!(paginator.current_page(), 1);
        assert!(!paginator.has_error());
    }

    #[tokio::test(start_paused = true)]
    async fn auto_load_fires_one_initial_fetch() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let _paginator = {
            let fetches = Arc::clone(&fetches);
            Paginator::new(
                PaginatorConfig {
                    debounce_delay: Duration::from_millis(10),
                    ..PaginatorConfig::default()
                },
                move |_query| {
                    let fetches = Arc::clone(&fetches);
                    async move {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        Ok(ListResult::Items(vec![1u32]))
                    }
                },
            )
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }
}
