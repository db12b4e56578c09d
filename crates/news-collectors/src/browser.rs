//! One headless browser per process, shared by every rendered-page collector.
//!
//! The browser is launched lazily on the first extraction and lives until
//! [`SharedBrowser::shutdown`]. Each extraction opens its own page and closes
//! it again whatever the outcome.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::{Element, Page};
use futures_util::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Timed out rendering {url}")]
    Timeout { url: String },
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Upper bound for loading and extracting a single page
    pub navigation_timeout: Duration,
    /// Extra wait after the load event so late XHR content can settle
    pub idle_grace: Duration,
    /// Explicit Chrome/Chromium binary; auto-detected when `None`
    pub executable: Option<PathBuf>,
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            idle_grace: Duration::from_millis(1500),
            executable: None,
            sandbox: false,
        }
    }
}

/// DOM queries run against a rendered page.
///
/// Every selector is a CSS selector list; the first matching node wins.
#[derive(Debug, Clone)]
pub struct ExtractionPlan {
    pub item_selector: String,
    pub title_selector: Option<String>,
    pub body_selector: Option<String>,
    pub time_selector: Option<String>,
    pub link_selector: Option<String>,
    pub max_items: usize,
}

/// Raw text pulled out of one item node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedNode {
    pub title: Option<String>,
    pub body: Option<String>,
    pub time: Option<String>,
    pub href: Option<String>,
    /// Full text of the item node
    pub text: Option<String>,
}

/// An open browser process able to render pages.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn extract(&self, url: &str, plan: &ExtractionPlan)
        -> Result<Vec<ExtractedNode>, BrowserError>;

    async fn close(&mut self) -> Result<(), BrowserError>;
}

/// Starts browser processes.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// Process-wide browser handle, owned by the aggregator.
pub struct SharedBrowser {
    launcher: Box<dyn BrowserLauncher>,
    session: Mutex<Option<Box<dyn BrowserSession>>>,
}

impl SharedBrowser {
    pub fn new(launcher: Box<dyn BrowserLauncher>) -> Self {
        Self {
            launcher,
            session: Mutex::new(None),
        }
    }

    /// Chromium-backed handle.
    pub fn chromium(config: BrowserConfig) -> Self {
        Self::new(Box::new(ChromiumLauncher::new(config)))
    }

    /// Render `url` and run `plan` against it, launching the browser first if needed.
    pub async fn extract(
        &self,
        url: &str,
        plan: &ExtractionPlan,
    ) -> Result<Vec<ExtractedNode>, BrowserError> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            tracing::info!("Launching shared headless browser");
            *guard = Some(self.launcher.launch().await?);
        }
        let Some(session) = guard.as_ref() else {
            return Err(BrowserError::Launch("browser session unavailable".to_string()));
        };
        session.extract(url, plan).await
    }

    pub async fn is_running(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Close the browser if it was ever launched. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        let session = self.session.lock().await.take();
        if let Some(mut session) = session {
            match session.close().await {
                Ok(()) => tracing::info!("Shared headless browser closed"),
                Err(e) => tracing::warn!("Failed to close headless browser cleanly: {}", e),
            }
        }
    }
}

pub struct ChromiumLauncher {
    config: BrowserConfig,
}

impl ChromiumLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let mut builder = ChromiumConfig::builder().request_timeout(self.config.navigation_timeout);
        if !self.config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &self.config.executable {
            builder = builder.chrome_executable(path);
        }
        let chromium_config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler stopped: {}", e);
                    break;
                }
            }
        });

        Ok(Box::new(ChromiumSession {
            browser: Mutex::new(browser),
            handler_task,
            config: self.config.clone(),
        }))
    }
}

struct ChromiumSession {
    browser: Mutex<Browser>,
    handler_task: JoinHandle<()>,
    config: BrowserConfig,
}

impl ChromiumSession {
    async fn render(
        &self,
        page: &Page,
        url: &str,
        plan: &ExtractionPlan,
    ) -> Result<Vec<ExtractedNode>, BrowserError> {
        let navigation = |e: chromiumoxide::error::CdpError| BrowserError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        };
        page.goto(url).await.map_err(navigation)?;
        page.wait_for_navigation().await.map_err(navigation)?;
        tokio::time::sleep(self.config.idle_grace).await;

        let elements = page
            .find_elements(plan.item_selector.as_str())
            .await
            .map_err(|e| BrowserError::Extraction(e.to_string()))?;

        let mut nodes = Vec::with_capacity(elements.len().min(plan.max_items));
        for element in elements.iter().take(plan.max_items) {
            nodes.push(ExtractedNode {
                title: child_text(element, plan.title_selector.as_deref()).await,
                body: child_text(element, plan.body_selector.as_deref()).await,
                time: child_text(element, plan.time_selector.as_deref()).await,
                href: child_href(element, plan.link_selector.as_deref()).await,
                text: element.inner_text().await.ok().flatten(),
            });
        }
        Ok(nodes)
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn extract(
        &self,
        url: &str,
        plan: &ExtractionPlan,
    ) -> Result<Vec<ExtractedNode>, BrowserError> {
        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| BrowserError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })?
        };

        let outcome =
            tokio::time::timeout(self.config.navigation_timeout, self.render(&page, url, plan))
                .await;

        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close page for {}: {}", url, e);
        }

        match outcome {
            Ok(result) => result,
            Err(_) => Err(BrowserError::Timeout {
                url: url.to_string(),
            }),
        }
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        let mut browser = self.browser.lock().await;
        let closed = browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Launch(e.to_string()));
        if let Err(e) = browser.wait().await {
            tracing::debug!("Browser process wait failed: {}", e);
        }
        self.handler_task.abort();
        closed
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

async fn child_text(element: &Element, selector: Option<&str>) -> Option<String> {
    let selector = selector?;
    let child = element.find_element(selector).await.ok()?;
    child
        .inner_text()
        .await
        .ok()
        .flatten()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

async fn child_href(element: &Element, selector: Option<&str>) -> Option<String> {
    let selector = selector?;
    let child = element.find_element(selector).await.ok()?;
    child.attribute("href").await.ok().flatten()
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory browser used by collector and aggregator tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    pub struct Counters {
        pub launches: AtomicUsize,
        pub extractions: AtomicUsize,
        pub closes: AtomicUsize,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
        /// Extraction starts and anything a test records alongside them
        pub events: std::sync::Mutex<Vec<String>>,
    }

    impl Counters {
        pub fn record(&self, event: impl Into<String>) {
            self.events.lock().unwrap().push(event.into());
        }

        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    pub struct FakeLauncher {
        pub counters: Arc<Counters>,
        pub pages: HashMap<String, Vec<ExtractedNode>>,
    }

    struct FakeSession {
        counters: Arc<Counters>,
        pages: HashMap<String, Vec<ExtractedNode>>,
    }

    #[async_trait]
    impl BrowserLauncher for FakeLauncher {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
            self.counters.launches.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSession {
                counters: self.counters.clone(),
                pages: self.pages.clone(),
            }))
        }
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn extract(
            &self,
            url: &str,
            plan: &ExtractionPlan,
        ) -> Result<Vec<ExtractedNode>, BrowserError> {
            self.counters.extractions.fetch_add(1, Ordering::SeqCst);
            self.counters.record(format!("extract {}", url));
            let active = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.max_in_flight.fetch_max(active, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.pages
                .get(url)
                .map(|nodes| nodes.iter().take(plan.max_items).cloned().collect())
                .ok_or_else(|| BrowserError::Navigation {
                    url: url.to_string(),
                    message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
                })
        }

        async fn close(&mut self) -> Result<(), BrowserError> {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    pub fn fake_browser(pages: HashMap<String, Vec<ExtractedNode>>) -> (SharedBrowser, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let launcher = FakeLauncher {
            counters: counters.clone(),
            pages,
        };
        (SharedBrowser::new(Box::new(launcher)), counters)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::fake_browser;
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;

    fn plan() -> ExtractionPlan {
        ExtractionPlan {
            item_selector: ".item".to_string(),
            title_selector: None,
            body_selector: None,
            time_selector: None,
            link_selector: None,
            max_items: 30,
        }
    }

    #[tokio::test]
    async fn test_lazy_launch_and_single_instance() {
        let pages = HashMap::from([("https://a.test".to_string(), vec![ExtractedNode::default()])]);
        let (browser, counters) = fake_browser(pages);
        assert!(!browser.is_running().await);
        assert_eq!(counters.launches.load(Ordering::SeqCst), 0);

        browser.extract("https://a.test", &plan()).await.unwrap();
        browser.extract("https://a.test", &plan()).await.unwrap();
        assert!(browser.is_running().await);
        assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
        assert_eq!(counters.extractions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let (browser, counters) = fake_browser(HashMap::new());
        browser.shutdown().await;
        assert_eq!(counters.closes.load(Ordering::SeqCst), 0);

        assert!(browser.extract("https://missing.test", &plan()).await.is_err());
        browser.shutdown().await;
        browser.shutdown().await;
        assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert!(!browser.is_running().await);
    }
}
