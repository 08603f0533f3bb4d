use crate::config::Config;
use crate::{Result, SnapshotError};
use chromiumoxide::cdp::browser_protocol::target::CloseTargetParams;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Baseline flags matched to constrained container environments; every
/// launch gets them.
const BASELINE_ARGS: [&str; 4] = [
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--font-render-hinting=none",
];

#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub debug: bool,
    pub proxy: Option<String>,
}

/// Lazily launches and reuses one browser process across sequential capture
/// sessions.
///
/// The handle sits behind an async mutex: at most one launch is ever in
/// flight, and concurrent callers await that launch instead of racing their
/// own. The manager never closes the browser on its own — teardown is driven
/// by the capture orchestrator through [`BrowserLifecycle::close`], so one
/// lifecycle instance must not be shared across orchestrators that close
/// independently.
pub struct BrowserLifecycle {
    config: Arc<Config>,
    browser: Mutex<Option<Arc<Browser>>>,
}

impl BrowserLifecycle {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            browser: Mutex::new(None),
        }
    }

    /// Returns the live browser handle, launching one if needed. Idempotent.
    pub async fn ensure_ready(&self, options: &LaunchOptions) -> Result<Arc<Browser>> {
        let mut guard = self.browser.lock().await;

        if let Some(browser) = guard.as_ref() {
            return Ok(browser.clone());
        }

        let browser = self.launch(options).await?;
        *guard = Some(browser.clone());
        tracing::debug!(debug = options.debug, "launched new browser");

        Ok(browser)
    }

    /// Liveness probe: whether a browser is currently initialized.
    pub async fn is_initialized(&self) -> bool {
        self.browser.lock().await.is_some()
    }

    /// Closes all open pages and releases the browser handle. Called by the
    /// orchestrator's teardown, not by the manager itself.
    pub async fn close(&self) -> Result<()> {
        let Some(browser) = self.browser.lock().await.take() else {
            return Ok(());
        };

        if let Ok(pages) = browser.pages().await {
            for page in pages {
                let target_id = page.target_id().clone();
                if let Err(e) = page.execute(CloseTargetParams::new(target_id)).await {
                    tracing::debug!(error = %e, "failed to close page during teardown");
                }
            }
        }

        // Dropping the last handle terminates the spawned browser process.
        drop(browser);
        tracing::debug!("closed browser");

        Ok(())
    }

    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<Browser>> {
        let chrome_path = match self.config.browser.chrome_path.clone() {
            Some(path) => path,
            None => crate::utils::find_chrome_executable()?,
        };

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&chrome_path)
            .request_timeout(Duration::from_secs(self.config.browser.request_timeout_secs));

        for arg in BASELINE_ARGS {
            builder = builder.arg(arg);
        }

        let proxy = options
            .proxy
            .clone()
            .or_else(|| self.config.browser.proxy.clone());
        if let Some(proxy) = proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        // Headless unless debug asks for an inspectable browser.
        if options.debug || !self.config.browser.headless {
            builder = builder.with_head();
        }

        if let Some(ref dir) = self.config.browser.user_data_dir {
            builder = builder.user_data_dir(dir);
        } else if options.debug {
            // Debug sessions get a stable profile so an inspection can span
            // relaunches.
            let profile = dirs::cache_dir()
                .unwrap_or_else(|| std::path::PathBuf::from("/tmp"))
                .join("websnap")
                .join("chrome-profile");
            std::fs::create_dir_all(&profile).ok();
            builder = builder.user_data_dir(profile);
        }

        let browser_config = builder
            .build()
            .map_err(|e| SnapshotError::LaunchFailed(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| SnapshotError::LaunchFailed(e.to_string()))?;

        tokio::spawn(async move { while handler.next().await.is_some() {} });

        Ok(Arc::new(browser))
    }
}
