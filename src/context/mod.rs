//! Per-request context (§5 concurrency model, component C8).
//!
//! Carries a correlation id, a bounded breadcrumb trail for debugging a
//! single request's path through resolution/fetch/transform/cache, and a
//! handle for scheduling deferred work (cache write-back) that keeps
//! running after the response has been sent. Grounded on the teacher's
//! `RequestLogger` redaction/filtering shape in
//! `observability/request_logging.rs`, generalized from a log formatter
//! into the request-scoped state it formats.

use std::collections::VecDeque;
use std::time::Instant;

use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::LoggingConfig;
use crate::constants::MAX_BREADCRUMBS_CEILING;

/// A single recorded step in a request's lifecycle.
#[derive(Debug, Clone, Serialize)]
pub struct BreadcrumbEntry {
    pub component: String,
    pub message: String,
    pub elapsed_ms: u64,
}

/// Per-request state threaded through resolution, source fetch,
/// transformation dispatch, and cache orchestration.
///
/// Not `Clone`: a context belongs to exactly one request. Deferred work
/// spawned through [`RequestContext::spawn_deferred`] outlives the
/// context itself (the response has already been sent), so it receives
/// only the owned data it needs, never the context.
pub struct RequestContext {
    pub request_id: String,
    started_at: Instant,
    breadcrumbs: VecDeque<BreadcrumbEntry>,
    max_breadcrumbs: usize,
    breadcrumbs_enabled: bool,
    deferred: Vec<JoinHandle<()>>,
}

impl RequestContext {
    pub fn new(logging: &LoggingConfig) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            started_at: Instant::now(),
            breadcrumbs: VecDeque::new(),
            max_breadcrumbs: logging.breadcrumbs.max_items.min(MAX_BREADCRUMBS_CEILING),
            breadcrumbs_enabled: logging.breadcrumbs.enabled,
            deferred: Vec::new(),
        }
    }

    /// Record a breadcrumb. A no-op if breadcrumbs are disabled or the
    /// request id should not otherwise be tracked; drops the oldest
    /// entry once the bound is reached rather than growing unbounded.
    pub fn breadcrumb(&mut self, component: &str, message: impl Into<String>) {
        if !self.breadcrumbs_enabled || self.max_breadcrumbs == 0 {
            return;
        }
        if self.breadcrumbs.len() >= self.max_breadcrumbs {
            self.breadcrumbs.pop_front();
        }
        self.breadcrumbs.push_back(BreadcrumbEntry {
            component: component.to_string(),
            message: message.into(),
            elapsed_ms: self.started_at.elapsed().as_millis() as u64,
        });
    }

    pub fn breadcrumbs(&self) -> impl Iterator<Item = &BreadcrumbEntry> {
        self.breadcrumbs.iter()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Schedule work that continues after the response has been returned
    /// to the client — the async cache write-back path. The handle is
    /// retained so [`RequestContext::clear`] can await outstanding work
    /// on every exit path instead of leaking detached tasks.
    pub fn spawn_deferred<F>(&mut self, fut: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.deferred.push(tokio::spawn(fut));
    }

    /// Await every deferred task. Called on all request exit paths
    /// (success, error, client disconnect) so nothing is left running
    /// against a context that's about to be dropped.
    pub async fn clear(&mut self) {
        for handle in self.deferred.drain(..) {
            let _ = handle.await;
        }
        self.breadcrumbs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::logging::BreadcrumbsConfig;

    fn logging_config(max_items: usize, enabled: bool) -> LoggingConfig {
        LoggingConfig {
            breadcrumbs: BreadcrumbsConfig { enabled, max_items },
            ..Default::default()
        }
    }

    #[test]
    fn breadcrumbs_accumulate_in_order() {
        let mut ctx = RequestContext::new(&logging_config(10, true));
        ctx.breadcrumb("resolver", "matched origin videos");
        ctx.breadcrumb("source", "fetched from object store");
        let messages: Vec<_> = ctx.breadcrumbs().map(|b| b.message.clone()).collect();
        assert_eq!(messages, vec!["matched origin videos", "fetched from object store"]);
    }

    #[test]
    fn breadcrumbs_disabled_records_nothing() {
        let mut ctx = RequestContext::new(&logging_config(10, false));
        ctx.breadcrumb("resolver", "matched");
        assert_eq!(ctx.breadcrumbs().count(), 0);
    }

    #[test]
    fn breadcrumb_buffer_is_bounded() {
        let mut ctx = RequestContext::new(&logging_config(3, true));
        for i in 0..10 {
            ctx.breadcrumb("c", format!("msg{i}"));
        }
        assert_eq!(ctx.breadcrumbs().count(), 3);
        let messages: Vec<_> = ctx.breadcrumbs().map(|b| b.message.clone()).collect();
        assert_eq!(messages, vec!["msg7", "msg8", "msg9"]);
    }

    #[test]
    fn configured_max_is_clamped_to_ceiling() {
        let ctx = RequestContext::new(&logging_config(1_000_000, true));
        assert_eq!(ctx.max_breadcrumbs, MAX_BREADCRUMBS_CEILING);
    }

    #[tokio::test]
    async fn clear_awaits_deferred_work() {
        let mut ctx = RequestContext::new(&logging_config(10, true));
        let flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag2 = flag.clone();
        ctx.spawn_deferred(async move {
            flag2.store(true, std::sync::atomic::Ordering::SeqCst);
        });
        ctx.clear().await;
        assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
    }
}
