use crate::Result;
use crate::snapshot::actions::{Action, KeyboardCommand, PdfOptions, WaitUntil};
use crate::snapshot::surface::Surface;
use crate::timeouts::ms;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

const SCROLL_TIMES: u32 = 20;
const SCROLL_DELTA_Y: f64 = 1000.0;
const SCREENSHOT_QUALITY: u8 = 100;

/// Outcome of one executed action. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub index: usize,
    pub action_type: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Report for one action sequence. `steps` is truncated at (and includes)
/// the first failing step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub success: bool,
    pub steps: Vec<StepResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs `actions` strictly in declaration order against `surface`.
///
/// Fail-fast: the first handler error is recorded in its step and stops the
/// sequence; there is no rollback. Always produces a report.
pub async fn execute(surface: &dyn Surface, actions: &[Action]) -> ExecutionReport {
    let mut report = ExecutionReport {
        success: true,
        steps: Vec::with_capacity(actions.len()),
        error: None,
    };

    for (index, action) in actions.iter().enumerate() {
        match handle_action(surface, action).await {
            Ok(result) => {
                report.steps.push(StepResult {
                    index,
                    action_type: action.kind().to_string(),
                    success: true,
                    error: None,
                    result,
                });
            }
            Err(e) => {
                tracing::warn!(step = index, action = action.kind(), error = %e, "action failed");
                report.steps.push(StepResult {
                    index,
                    action_type: action.kind().to_string(),
                    success: false,
                    error: Some(e.to_string()),
                    result: None,
                });
                report.success = false;
                report.error = Some(format!("Failed at step {} ({})", index, action.kind()));
                break;
            }
        }
    }

    report
}

/// Dispatches one action to its handler. Defaults for optional fields are
/// applied here, not in the model.
async fn handle_action(surface: &dyn Surface, action: &Action) -> Result<Option<Value>> {
    match action {
        Action::Navigate {
            url,
            wait_until,
            timeout,
        } => {
            surface
                .navigate(
                    url,
                    wait_until.unwrap_or(WaitUntil::Load),
                    Duration::from_millis(timeout.unwrap_or(ms::NAVIGATION_TIMEOUT)),
                )
                .await?;
            Ok(None)
        }
        Action::WaitForSelector {
            selector,
            visible,
            timeout,
        } => {
            surface
                .wait_for_selector(
                    selector,
                    visible.unwrap_or(true),
                    Duration::from_millis(timeout.unwrap_or(ms::SELECTOR_TIMEOUT)),
                )
                .await?;
            Ok(None)
        }
        Action::KeyboardShortcut { commands } => {
            handle_keyboard_shortcut(surface, commands).await
        }
        Action::TypeText {
            selector,
            text,
            delay,
            timeout,
        } => {
            surface
                .type_text(
                    selector,
                    text,
                    Duration::from_millis(delay.unwrap_or(ms::INTERACTION_DELAY)),
                    Duration::from_millis(timeout.unwrap_or(ms::INTERACTION_TIMEOUT)),
                )
                .await?;
            Ok(None)
        }
        Action::Click {
            selector,
            delay,
            timeout,
        } => {
            surface
                .click(
                    selector,
                    Duration::from_millis(delay.unwrap_or(ms::INTERACTION_DELAY)),
                    Duration::from_millis(timeout.unwrap_or(ms::INTERACTION_TIMEOUT)),
                )
                .await?;
            Ok(None)
        }
        Action::Scroll {
            times,
            delta_y,
            delay,
        } => {
            handle_scroll(
                surface,
                times.unwrap_or(SCROLL_TIMES),
                delta_y.unwrap_or(SCROLL_DELTA_Y),
                Duration::from_millis(delay.unwrap_or(ms::SCROLL_DELAY)),
            )
            .await
        }
        Action::SetContent { html } => {
            surface.set_content(html).await?;
            Ok(None)
        }
        Action::Screenshot { full_page, quality } => {
            let payload = surface
                .screenshot_base64(
                    full_page.unwrap_or(false),
                    quality.unwrap_or(SCREENSHOT_QUALITY),
                )
                .await?;
            Ok(Some(json!(format!("data:image/jpeg;base64,{}", payload))))
        }
        Action::ToPdf { options } => {
            let default_options = PdfOptions::default();
            let pdf = surface
                .print_pdf(options.as_ref().unwrap_or(&default_options))
                .await?;
            Ok(Some(json!(
                base64::engine::general_purpose::STANDARD.encode(pdf)
            )))
        }
        Action::Sleep { ms } => {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
            Ok(None)
        }
    }
}

async fn handle_keyboard_shortcut(
    surface: &dyn Surface,
    commands: &[KeyboardCommand],
) -> Result<Option<Value>> {
    for command in commands {
        surface.dispatch_key(command.op, &command.key).await?;
    }
    Ok(None)
}

/// Keeps scrolling until the page extent stops growing or the iteration cap
/// is hit, whichever comes first.
async fn handle_scroll(
    surface: &dyn Surface,
    times: u32,
    delta_y: f64,
    delay: Duration,
) -> Result<Option<Value>> {
    let mut previous = surface.content_extent().await?;
    let mut count = 0;

    while count < times {
        surface.scroll_by(delta_y).await?;
        tokio::time::sleep(delay).await;

        let current = surface.content_extent().await?;
        if current == previous {
            break;
        }
        previous = current;
        count += 1;
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SnapshotError;
    use crate::snapshot::actions::KeyOp;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory surface that logs every call and can fail on demand.
    #[derive(Default)]
    struct MockSurface {
        calls: Mutex<Vec<String>>,
        executed: AtomicUsize,
        fail_on: Mutex<Option<String>>,
        /// Extents returned by successive `content_extent` calls; the last
        /// value repeats once exhausted.
        extents: Mutex<Vec<i64>>,
    }

    impl MockSurface {
        fn failing_on(op: &str) -> Self {
            Self {
                fail_on: Mutex::new(Some(op.to_string())),
                ..Default::default()
            }
        }

        fn with_extents(extents: Vec<i64>) -> Self {
            Self {
                extents: Mutex::new(extents),
                ..Default::default()
            }
        }

        fn record(&self, op: &str) -> Result<()> {
            self.calls.lock().unwrap().push(op.to_string());
            self.executed.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.lock().unwrap().as_deref() == Some(op) {
                return Err(SnapshotError::General(format!("{} exploded", op)));
            }
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn count_of(&self, op: &str) -> usize {
            self.calls().iter().filter(|c| c.as_str() == op).count()
        }
    }

    #[async_trait]
    impl Surface for MockSurface {
        async fn navigate(&self, _url: &str, _wait: WaitUntil, _timeout: Duration) -> Result<()> {
            self.record("navigate")
        }

        async fn wait_for_selector(
            &self,
            _selector: &str,
            _visible: bool,
            _timeout: Duration,
        ) -> Result<()> {
            self.record("waitForSelector")
        }

        async fn dispatch_key(&self, op: KeyOp, key: &str) -> Result<()> {
            self.record(&format!("key:{:?}:{}", op, key))
        }

        async fn type_text(
            &self,
            _selector: &str,
            _text: &str,
            _delay: Duration,
            _timeout: Duration,
        ) -> Result<()> {
            self.record("typeText")
        }

        async fn click(&self, _selector: &str, _delay: Duration, _timeout: Duration) -> Result<()> {
            self.record("click")
        }

        async fn scroll_by(&self, _delta_y: f64) -> Result<()> {
            self.record("scrollBy")
        }

        async fn content_extent(&self) -> Result<i64> {
            self.record("contentExtent")?;
            let mut extents = self.extents.lock().unwrap();
            if extents.len() > 1 {
                Ok(extents.remove(0))
            } else {
                Ok(extents.first().copied().unwrap_or(0))
            }
        }

        async fn set_content(&self, _html: &str) -> Result<()> {
            self.record("setContent")
        }

        async fn screenshot_base64(&self, _full_page: bool, _quality: u8) -> Result<String> {
            self.record("screenshot")?;
            Ok(base64::engine::general_purpose::STANDARD.encode(b"\xFF\xD8\xFFjpegbytes"))
        }

        async fn print_pdf(&self, _options: &PdfOptions) -> Result<Vec<u8>> {
            self.record("pdf")?;
            Ok(b"%PDF-1.4".to_vec())
        }
    }

    fn nav(url: &str) -> Action {
        Action::Navigate {
            url: url.into(),
            wait_until: None,
            timeout: None,
        }
    }

    fn click(selector: &str) -> Action {
        Action::Click {
            selector: selector.into(),
            delay: Some(0),
            timeout: None,
        }
    }

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let surface = MockSurface::default();
        let actions = vec![nav("https://example.test/"), click("#go"), Action::Sleep { ms: 1 }];

        let report = execute(&surface, &actions).await;

        assert!(report.success);
        assert!(report.error.is_none());
        assert_eq!(report.steps.len(), actions.len());
        assert!(report.steps.iter().all(|s| s.success));
        assert_eq!(report.steps[0].action_type, "navigate");
        assert_eq!(report.steps[2].action_type, "sleep");
    }

    #[tokio::test]
    async fn test_fail_fast_truncates_sequence() {
        let surface = MockSurface::failing_on("click");
        let actions = vec![
            nav("https://example.test/"),
            click("#missing"),
            nav("https://example.test/never"),
            Action::SetContent { html: "<p/>".into() },
        ];

        let report = execute(&surface, &actions).await;

        assert!(!report.success);
        assert_eq!(report.steps.len(), 2);
        assert!(report.steps[0].success);
        assert!(!report.steps[1].success);
        assert_eq!(report.steps[1].index, 1);
        assert!(report.steps[1].error.as_deref().unwrap().contains("click exploded"));
        assert_eq!(report.error.as_deref(), Some("Failed at step 1 (click)"));

        // Steps beyond the failure never reached the surface.
        assert_eq!(surface.executed.load(Ordering::SeqCst), 2);
        assert_eq!(surface.count_of("setContent"), 0);
    }

    #[tokio::test]
    async fn test_empty_sequence_is_success() {
        let surface = MockSurface::default();
        let report = execute(&surface, &[]).await;
        assert!(report.success);
        assert!(report.steps.is_empty());
    }

    #[tokio::test]
    async fn test_keyboard_commands_run_in_order() {
        let surface = MockSurface::default();
        let actions = vec![Action::KeyboardShortcut {
            commands: vec![
                KeyboardCommand {
                    op: KeyOp::Down,
                    key: "Control".into(),
                },
                KeyboardCommand {
                    op: KeyOp::Press,
                    key: "c".into(),
                },
                KeyboardCommand {
                    op: KeyOp::Up,
                    key: "Control".into(),
                },
            ],
        }];

        let report = execute(&surface, &actions).await;

        assert!(report.success);
        assert_eq!(
            surface.calls(),
            vec!["key:Down:Control", "key:Press:c", "key:Up:Control"]
        );
    }

    #[tokio::test]
    async fn test_scroll_stops_early_when_extent_stable() {
        // Extent never changes: one wheel tick, then stop.
        let surface = MockSurface::with_extents(vec![900]);
        let actions = vec![Action::Scroll {
            times: Some(10),
            delta_y: None,
            delay: Some(0),
        }];

        let report = execute(&surface, &actions).await;

        assert!(report.success);
        assert_eq!(surface.count_of("scrollBy"), 1);
    }

    #[tokio::test]
    async fn test_scroll_caps_at_times_when_extent_keeps_growing() {
        let surface = MockSurface::with_extents((0..100).map(|i| 900 + i * 100).collect());
        let actions = vec![Action::Scroll {
            times: Some(4),
            delta_y: Some(500.0),
            delay: Some(0),
        }];

        let report = execute(&surface, &actions).await;

        assert!(report.success);
        assert_eq!(surface.count_of("scrollBy"), 4);
    }

    #[tokio::test]
    async fn test_scroll_stops_when_growth_plateaus() {
        let surface = MockSurface::with_extents(vec![900, 1800, 2700, 2700]);
        let actions = vec![Action::Scroll {
            times: Some(10),
            delta_y: None,
            delay: Some(0),
        }];

        let report = execute(&surface, &actions).await;

        assert!(report.success);
        // Grows twice, then two equal measurements end the loop.
        assert_eq!(surface.count_of("scrollBy"), 3);
    }

    #[tokio::test]
    async fn test_screenshot_result_is_jpeg_data_uri() {
        let surface = MockSurface::default();
        let actions = vec![Action::Screenshot {
            full_page: None,
            quality: None,
        }];

        let report = execute(&surface, &actions).await;

        assert!(report.success);
        let result = report.steps[0].result.as_ref().unwrap().as_str().unwrap();
        assert!(result.starts_with("data:image/jpeg;base64,"));
        assert!(result.len() > "data:image/jpeg;base64,".len());
    }

    #[tokio::test]
    async fn test_pdf_result_is_base64() {
        let surface = MockSurface::default();
        let actions = vec![Action::ToPdf { options: None }];

        let report = execute(&surface, &actions).await;

        assert!(report.success);
        let result = report.steps[0].result.as_ref().unwrap().as_str().unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(result)
            .unwrap();
        assert!(decoded.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_failure_error_names_first_failing_step() {
        let surface = MockSurface::failing_on("navigate");
        let actions = vec![click("#a"), nav("https://example.test/"), click("#b")];

        let report = execute(&surface, &actions).await;

        assert_eq!(report.error.as_deref(), Some("Failed at step 1 (navigate)"));
        assert_eq!(report.steps.len(), 2);
    }
}
