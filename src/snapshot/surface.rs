use crate::snapshot::actions::{KeyOp, PdfOptions, WaitUntil};
use crate::timeouts::ms;
use crate::{Result, SnapshotError};
use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams, DispatchMouseEventType,
    MouseButton,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, GetLayoutMetricsParams, NavigateParams,
    PrintToPdfParams, SetDocumentContentParams, Viewport,
};
use std::sync::Arc;
use std::time::Duration;

/// The capability object representing one browsable page.
///
/// The execution engine performs every page interaction through this trait,
/// which keeps the engine testable against an in-memory implementation and
/// keeps CDP specifics out of the sequencing logic.
#[async_trait]
pub trait Surface: Send + Sync {
    async fn navigate(&self, url: &str, wait_until: WaitUntil, timeout: Duration) -> Result<()>;

    /// Waits until the selector matches an element, optionally requiring it
    /// to be visible.
    async fn wait_for_selector(&self, selector: &str, visible: bool, timeout: Duration)
    -> Result<()>;

    async fn dispatch_key(&self, op: KeyOp, key: &str) -> Result<()>;

    /// Waits for the selector to become visible, then types `text` one
    /// keystroke at a time with `delay` between keystrokes.
    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        delay: Duration,
        timeout: Duration,
    ) -> Result<()>;

    /// Waits for the selector to become visible, then clicks it holding the
    /// button down for `delay`.
    async fn click(&self, selector: &str, delay: Duration, timeout: Duration) -> Result<()>;

    /// Dispatches one wheel tick of `delta_y` pixels.
    async fn scroll_by(&self, delta_y: f64) -> Result<()>;

    /// Current page extent (max of the document scroll/offset/client heights).
    async fn content_extent(&self) -> Result<i64>;

    async fn set_content(&self, html: &str) -> Result<()>;

    /// JPEG screenshot, returned as the base64 payload (no data-URI prefix).
    /// Always captures beyond the visible viewport.
    async fn screenshot_base64(&self, full_page: bool, quality: u8) -> Result<String>;

    async fn print_pdf(&self, options: &PdfOptions) -> Result<Vec<u8>>;
}

/// `Surface` implementation over a live CDP page.
pub struct PageSurface {
    page: Arc<Page>,
}

impl PageSurface {
    pub fn new(page: Arc<Page>) -> Self {
        Self { page }
    }

    async fn wait_ready_state(&self, wait_until: WaitUntil) -> Result<()> {
        loop {
            let state: String = self
                .page
                .evaluate("document.readyState")
                .await
                .map_err(|e| SnapshotError::EvaluationError(e.to_string()))?
                .into_value()
                .unwrap_or_default();

            let done = match wait_until {
                WaitUntil::Domcontentloaded => state == "interactive" || state == "complete",
                _ => state == "complete",
            };

            if done {
                // Closest CDP approximation of the networkidle conditions.
                if matches!(wait_until, WaitUntil::Networkidle0 | WaitUntil::Networkidle2) {
                    tokio::time::sleep(Duration::from_millis(ms::NETWORK_IDLE)).await;
                }
                return Ok(());
            }

            tokio::time::sleep(Duration::from_millis(ms::POLL_INTERVAL)).await;
        }
    }

    async fn is_selector_visible(&self, selector: &str) -> bool {
        let script = format!(
            r#"(function(){{
                const el=document.querySelector('{}');
                if(!el)return false;
                const style=window.getComputedStyle(el);
                const rect=el.getBoundingClientRect();
                return style.display!=='none' &&
                       style.visibility!=='hidden' &&
                       parseFloat(style.opacity||'1')>0 &&
                       rect.width>0 && rect.height>0;
            }})()"#,
            escape_selector(selector)
        );

        self.page
            .evaluate(script)
            .await
            .ok()
            .and_then(|r| r.into_value::<bool>().ok())
            .unwrap_or(false)
    }

    async fn wait_for_visible_element(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<chromiumoxide::element::Element> {
        let start = tokio::time::Instant::now();

        loop {
            if start.elapsed() >= timeout {
                return Err(SnapshotError::ElementNotFound {
                    selector: selector.to_string(),
                });
            }

            if let Ok(element) = self.page.find_element(selector).await
                && self.is_selector_visible(selector).await
            {
                let scroll_script = format!(
                    "document.querySelector('{}')?.scrollIntoView({{block:'center',behavior:'instant'}})",
                    escape_selector(selector)
                );
                let _ = self.page.evaluate(scroll_script).await;
                tokio::time::sleep(Duration::from_millis(ms::VIEWPORT_SETTLE)).await;
                return Ok(element);
            }

            tokio::time::sleep(Duration::from_millis(ms::POLL_INTERVAL)).await;
        }
    }
}

#[async_trait]
impl Surface for PageSurface {
    async fn navigate(&self, url: &str, wait_until: WaitUntil, timeout: Duration) -> Result<()> {
        let nav_params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| SnapshotError::General(format!("Failed to build navigate params: {}", e)))?;

        tokio::time::timeout(timeout, async {
            self.page
                .execute(nav_params)
                .await
                .map_err(|e| SnapshotError::General(format!("Navigation failed: {}", e)))?;
            self.wait_ready_state(wait_until).await
        })
        .await
        .map_err(|_| SnapshotError::NavigationTimeout(timeout.as_millis() as u64))?
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        visible: bool,
        timeout: Duration,
    ) -> Result<()> {
        let start = tokio::time::Instant::now();

        loop {
            if start.elapsed() >= timeout {
                return Err(SnapshotError::ElementNotFound {
                    selector: selector.to_string(),
                });
            }

            let present = self.page.find_element(selector).await.is_ok();
            if present && (!visible || self.is_selector_visible(selector).await) {
                return Ok(());
            }

            tokio::time::sleep(Duration::from_millis(ms::POLL_INTERVAL)).await;
        }
    }

    async fn dispatch_key(&self, op: KeyOp, key: &str) -> Result<()> {
        let types = match op {
            KeyOp::Down => vec![DispatchKeyEventType::KeyDown],
            KeyOp::Up => vec![DispatchKeyEventType::KeyUp],
            KeyOp::Press => vec![DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp],
        };

        for event_type in types {
            let params = DispatchKeyEventParams::builder()
                .r#type(event_type)
                .key(key.to_string())
                .build()
                .map_err(|e| SnapshotError::General(format!("Failed to build key event: {}", e)))?;

            self.page
                .execute(params)
                .await
                .map_err(|e| SnapshotError::General(format!("Failed to dispatch key: {}", e)))?;
        }

        Ok(())
    }

    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        delay: Duration,
        timeout: Duration,
    ) -> Result<()> {
        let element = self.wait_for_visible_element(selector, timeout).await?;

        element
            .click()
            .await
            .map_err(|e| SnapshotError::General(format!("Focus failed: {}", e)))?;

        for ch in text.chars() {
            element
                .type_str(&ch.to_string())
                .await
                .map_err(|e| SnapshotError::General(format!("Failed to type character: {}", e)))?;

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        Ok(())
    }

    async fn click(&self, selector: &str, delay: Duration, timeout: Duration) -> Result<()> {
        let element = self.wait_for_visible_element(selector, timeout).await?;

        let point = element
            .clickable_point()
            .await
            .map_err(|e| SnapshotError::General(format!("No clickable point: {}", e)))?;

        let down = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MousePressed)
            .x(point.x)
            .y(point.y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(|e| SnapshotError::General(format!("Failed to build mouse event: {}", e)))?;

        self.page
            .execute(down)
            .await
            .map_err(|e| SnapshotError::General(format!("Click failed: {}", e)))?;

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let up = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseReleased)
            .x(point.x)
            .y(point.y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(|e| SnapshotError::General(format!("Failed to build mouse event: {}", e)))?;

        self.page
            .execute(up)
            .await
            .map_err(|e| SnapshotError::General(format!("Click failed: {}", e)))?;

        Ok(())
    }

    async fn scroll_by(&self, delta_y: f64) -> Result<()> {
        let params = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseWheel)
            .x(0.0)
            .y(0.0)
            .delta_x(0.0)
            .delta_y(delta_y)
            .build()
            .map_err(|e| SnapshotError::General(format!("Failed to build wheel event: {}", e)))?;

        self.page
            .execute(params)
            .await
            .map_err(|e| SnapshotError::General(format!("Scroll failed: {}", e)))?;

        Ok(())
    }

    async fn content_extent(&self) -> Result<i64> {
        let script = r#"Math.max(
            document.body.scrollHeight,
            document.body.offsetHeight,
            document.documentElement.clientHeight,
            document.documentElement.scrollHeight,
            document.documentElement.offsetHeight
        )"#;

        self.page
            .evaluate(script)
            .await
            .map_err(|e| SnapshotError::EvaluationError(e.to_string()))?
            .into_value::<i64>()
            .map_err(|e| SnapshotError::EvaluationError(format!("Failed to parse extent: {}", e)))
    }

    async fn set_content(&self, html: &str) -> Result<()> {
        let frame_id = self
            .page
            .mainframe()
            .await
            .map_err(|e| SnapshotError::General(format!("Failed to resolve main frame: {}", e)))?
            .ok_or_else(|| SnapshotError::General("Page has no main frame".to_string()))?;

        self.page
            .execute(SetDocumentContentParams::new(frame_id, html.to_string()))
            .await
            .map_err(|e| SnapshotError::General(format!("Failed to set content: {}", e)))?;

        tokio::time::timeout(
            Duration::from_millis(ms::NAVIGATION_TIMEOUT),
            self.wait_ready_state(WaitUntil::Load),
        )
        .await
        .map_err(|_| SnapshotError::NavigationTimeout(ms::NAVIGATION_TIMEOUT))?
    }

    async fn screenshot_base64(&self, full_page: bool, quality: u8) -> Result<String> {
        let mut params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Jpeg)
            .capture_beyond_viewport(true)
            .build();
        params.quality = Some(quality as i64);

        if full_page {
            let metrics = self
                .page
                .execute(GetLayoutMetricsParams::default())
                .await
                .map_err(|e| SnapshotError::ScreenshotFailed(e.to_string()))?;
            let content = &metrics.css_content_size;
            params.clip = Some(Viewport {
                x: 0.0,
                y: 0.0,
                width: content.width,
                height: content.height,
                scale: 1.0,
            });
        }

        let response = self
            .page
            .execute(params)
            .await
            .map_err(|e| SnapshotError::ScreenshotFailed(e.to_string()))?;

        let payload: &str = response.data.as_ref();
        Ok(payload.to_string())
    }

    async fn print_pdf(&self, options: &PdfOptions) -> Result<Vec<u8>> {
        let (paper_width, paper_height) = options.format.unwrap_or_default().dimensions();

        let mut builder = PrintToPdfParams::builder()
            .paper_width(paper_width)
            .paper_height(paper_height);

        if let Some(landscape) = options.landscape {
            builder = builder.landscape(landscape);
        }
        if let Some(print_background) = options.print_background {
            builder = builder.print_background(print_background);
        }
        if let Some(display_header_footer) = options.display_header_footer {
            builder = builder.display_header_footer(display_header_footer);
        }
        if let Some(scale) = options.scale {
            builder = builder.scale(scale);
        }
        if let Some(ref page_ranges) = options.page_ranges {
            builder = builder.page_ranges(page_ranges.clone());
        }
        if let Some(ref margin) = options.margin {
            if let Some(top) = margin.top {
                builder = builder.margin_top(top);
            }
            if let Some(bottom) = margin.bottom {
                builder = builder.margin_bottom(bottom);
            }
            if let Some(left) = margin.left {
                builder = builder.margin_left(left);
            }
            if let Some(right) = margin.right {
                builder = builder.margin_right(right);
            }
        }

        self.page
            .pdf(builder.build())
            .await
            .map_err(|e| SnapshotError::PdfFailed(e.to_string()))
    }
}

fn escape_selector(selector: &str) -> String {
    selector.replace('\\', "\\\\").replace('\'', "\\'")
}
