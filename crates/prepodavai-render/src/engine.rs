// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared headless-browser handle.
//!
//! The browser is launched on first use and reused for every render after
//! that. A browser whose connection dropped, or that failed to open a page,
//! is replaced by a fresh launch on the next render. Concurrent pages are
//! limited by a semaphore. `shutdown` closes the browser; renders after
//! shutdown fail with a rendering error.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use futures::StreamExt;
use prepodavai_config::model::RenderConfig;
use prepodavai_core::PrepodavaiError;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::markup::PreparedPage;

fn render_err(message: impl Into<String>) -> PrepodavaiError {
    PrepodavaiError::Rendering {
        message: message.into(),
    }
}

fn timed_out(timeout: Duration) -> PrepodavaiError {
    render_err(format!("render timed out after {timeout:?}"))
}

/// Run `fut` with a deadline, mapping expiry to a rendering error.
pub async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T, PrepodavaiError>
where
    F: Future<Output = Result<T, PrepodavaiError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(timed_out(timeout)),
    }
}

/// Run `work` on the page produced by `create`, all before `deadline`.
///
/// The page is passed to `close` on every path: after `work` finishes, when
/// `work` runs past the deadline, and when the deadline expires while the
/// page is still being created (it is closed once it appears).
async fn run_on_page<P, T, W, WF, C, CF>(
    deadline: tokio::time::Instant,
    timeout: Duration,
    mut create: JoinHandle<Result<P, PrepodavaiError>>,
    work: W,
    close: C,
) -> Result<T, PrepodavaiError>
where
    P: Clone + Send + 'static,
    W: FnOnce(P) -> WF,
    WF: Future<Output = Result<T, PrepodavaiError>>,
    C: FnOnce(P) -> CF + Send + 'static,
    CF: Future<Output = ()> + Send + 'static,
{
    let page = match tokio::time::timeout_at(deadline, &mut create).await {
        Ok(Ok(created)) => created?,
        Ok(Err(e)) => return Err(render_err(format!("page task failed: {e}"))),
        Err(_) => {
            tokio::spawn(async move {
                if let Ok(Ok(page)) = create.await {
                    close(page).await;
                }
            });
            return Err(timed_out(timeout));
        }
    };
    let result = tokio::time::timeout_at(deadline, work(page.clone())).await;
    tokio::spawn(close(page));
    result.unwrap_or_else(|_| Err(timed_out(timeout)))
}

struct LiveBrowser {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    broken: AtomicBool,
}

impl LiveBrowser {
    /// The event loop ends when the connection to the browser is lost.
    fn is_alive(&self) -> bool {
        !self.broken.load(Ordering::Acquire) && !self.handler.is_finished()
    }
}

/// Lazily launched browser shared by all renders in the process.
pub struct RenderEngine {
    config: RenderConfig,
    browser: Mutex<Option<Arc<LiveBrowser>>>,
    pages: Semaphore,
    closed: AtomicBool,
    launches: AtomicUsize,
}

impl RenderEngine {
    pub fn new(config: RenderConfig) -> Self {
        let permits = config.max_concurrent_pages.max(1);
        Self {
            config,
            browser: Mutex::new(None),
            pages: Semaphore::new(permits),
            closed: AtomicBool::new(false),
            launches: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub async fn is_launched(&self) -> bool {
        self.browser.lock().await.is_some()
    }

    /// Browser launches attempted so far, failed ones included.
    pub fn launch_attempts(&self) -> usize {
        self.launches.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_usable(&self) -> Result<(), PrepodavaiError> {
        if !self.config.enabled {
            return Err(render_err("rendering is disabled"));
        }
        if self.is_closed() {
            return Err(render_err("render engine is shut down"));
        }
        Ok(())
    }

    async fn launch(&self) -> Result<LiveBrowser, PrepodavaiError> {
        let attempt = self.launches.fetch_add(1, Ordering::AcqRel) + 1;
        let mut builder = BrowserConfig::builder().no_sandbox();
        if let Some(path) = &self.config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(render_err)?;
        let started = Instant::now();
        let (browser, mut events) = Browser::launch(browser_config)
            .await
            .map_err(|e| render_err(format!("browser launch failed: {e}")))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        info!(
            attempt,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "headless browser launched"
        );
        Ok(LiveBrowser {
            browser: Mutex::new(browser),
            handler,
            broken: AtomicBool::new(false),
        })
    }

    /// The live browser, launching or relaunching it as needed.
    async fn browser(&self) -> Result<Arc<LiveBrowser>, PrepodavaiError> {
        let mut slot = self.browser.lock().await;
        if self.is_closed() {
            return Err(render_err("render engine is shut down"));
        }
        if let Some(live) = slot.as_ref() {
            if live.is_alive() {
                return Ok(Arc::clone(live));
            }
            warn!("headless browser is gone, relaunching");
            if let Some(stale) = slot.take() {
                stale.handler.abort();
            }
        }
        let live = Arc::new(self.launch().await?);
        *slot = Some(Arc::clone(&live));
        Ok(live)
    }

    /// Print `page` to PDF bytes, bounded by `timeout_secs`.
    pub async fn print_pdf(&self, page: &PreparedPage) -> Result<Vec<u8>, PrepodavaiError> {
        self.ensure_usable()?;
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let started = Instant::now();
        let result = self.print_within(page, timeout).await;
        let outcome = if result.is_ok() { "ok" } else { "error" };
        prepodavai_prometheus::record_render(outcome, started.elapsed().as_secs_f64());
        result
    }

    async fn print_within(
        &self,
        prepared: &PreparedPage,
        timeout: Duration,
    ) -> Result<Vec<u8>, PrepodavaiError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let _permit = tokio::time::timeout_at(deadline, self.pages.acquire())
            .await
            .map_err(|_| timed_out(timeout))?
            .map_err(|_| render_err("render engine is shut down"))?;
        let live = tokio::time::timeout_at(deadline, self.browser())
            .await
            .map_err(|_| timed_out(timeout))??;

        let create = tokio::spawn(async move {
            let created = live.browser.lock().await.new_page("about:blank").await;
            created.map_err(|e| {
                live.broken.store(true, Ordering::Release);
                render_err(format!("new page failed: {e}"))
            })
        });

        run_on_page(
            deadline,
            timeout,
            create,
            |page| async move {
                page.set_content(prepared.html.as_str())
                    .await
                    .map_err(|e| render_err(format!("set content failed: {e}")))?;
                if prepared.has_math {
                    self.wait_for_math(&page).await;
                }
                page.pdf(PrintToPdfParams {
                    print_background: Some(true),
                    prefer_css_page_size: Some(true),
                    ..PrintToPdfParams::default()
                })
                .await
                .map_err(|e| render_err(format!("print failed: {e}")))
            },
            |page: chromiumoxide::Page| async move {
                if let Err(e) = page.close().await {
                    debug!(error = %e, "page close failed");
                }
            },
        )
        .await
    }

    /// Wait for MathJax typesetting; on expiry print whatever is on the page.
    async fn wait_for_math(&self, page: &chromiumoxide::Page) {
        let wait = Duration::from_millis(self.config.math_wait_ms);
        let params = match EvaluateParams::builder()
            .expression(
                "window.MathJax && MathJax.startup && MathJax.startup.promise \
                 ? MathJax.startup.promise.then(() => true) : false",
            )
            .await_promise(true)
            .build()
        {
            Ok(params) => params,
            Err(e) => {
                warn!(error = %e, "math wait expression rejected");
                return;
            }
        };
        match tokio::time::timeout(wait, page.evaluate_expression(params)).await {
            Ok(Ok(_)) => debug!("math typeset"),
            Ok(Err(e)) => debug!(error = %e, "math typesetting failed, printing anyway"),
            Err(_) => debug!(wait_ms = self.config.math_wait_ms, "math wait expired, printing anyway"),
        }
    }

    /// Close the browser if it was launched. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<(), PrepodavaiError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.pages.close();
        let Some(live) = self.browser.lock().await.take() else {
            return Ok(());
        };
        let mut browser = live.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!(error = %e, "browser close failed");
        }
        if let Err(e) = browser.wait().await {
            debug!(error = %e, "browser wait failed");
        }
        live.handler.abort();
        info!("headless browser closed");
        Ok(())
    }
}
