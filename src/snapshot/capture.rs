use crate::config::Config;
use crate::snapshot::actions::Action;
use crate::snapshot::engine::{self, ExecutionReport};
use crate::snapshot::interceptor::{TrafficFilter, TrafficFilterSpec, TrafficInterceptor};
use crate::snapshot::ledger::{TrafficEntry, TrafficLedger};
use crate::snapshot::lifecycle::{BrowserLifecycle, LaunchOptions};
use crate::snapshot::surface::PageSurface;
use crate::snapshot::emulation;
use crate::{Result, SnapshotError, devices};
use chromiumoxide::Page;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// One capture request, as validated by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureRequest {
    pub traffic_filter: Option<TrafficFilterSpec>,
    pub device: Option<String>,
    /// `"WxH"`, consulted only when `device` is absent.
    pub resolution: Option<String>,
    pub debug: bool,
    pub proxy: Option<String>,
    pub pre_actions: Vec<Action>,
    pub output_actions: Vec<Action>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub network_traffics: HashMap<String, TrafficEntry>,
    pub action_result: ExecutionReport,
    pub outputs: ExecutionReport,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DryRunStatus {
    pub initialized: bool,
}

/// Orchestrates one capture request end to end: browser acquisition, page
/// context setup, interception wiring, the two action phases and guaranteed
/// teardown.
pub struct SnapshotService {
    config: Arc<Config>,
    lifecycle: BrowserLifecycle,
}

impl SnapshotService {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            lifecycle: BrowserLifecycle::new(config.clone()),
            config,
        }
    }

    /// Liveness probe. Triggers browser initialization when none exists, and
    /// has no other side effect.
    pub async fn dry_run(&self) -> Result<DryRunStatus> {
        self.lifecycle.ensure_ready(&LaunchOptions::default()).await?;

        Ok(DryRunStatus {
            initialized: self.lifecycle.is_initialized().await,
        })
    }

    /// Drives the page through `preActions`, captures the traffic the page
    /// generates, then runs `outputActions` (screenshots, PDFs).
    ///
    /// Action failures are recorded in the returned reports and never abort
    /// the capture. Context-setup failures surface as the generic
    /// [`SnapshotError::SnapshotFailed`]; either way the browser is torn
    /// down unless `debug` keeps it open for inspection.
    pub async fn capture_traffic(&self, request: CaptureRequest) -> Result<CaptureResult> {
        let capture_id = Uuid::new_v4();

        let outcome = self.run_capture(&request, capture_id).await;

        self.teardown(request.debug).await;

        match outcome {
            Ok(result) => {
                tracing::info!(
                    %capture_id,
                    traffic_entries = result.network_traffics.len(),
                    pre_ok = result.action_result.success,
                    output_ok = result.outputs.success,
                    "capture finished"
                );
                Ok(result)
            }
            Err(e) => {
                tracing::error!(%capture_id, error = %e, "capture failed");
                Err(SnapshotError::SnapshotFailed)
            }
        }
    }

    async fn run_capture(
        &self,
        request: &CaptureRequest,
        capture_id: Uuid,
    ) -> Result<CaptureResult> {
        let filter = TrafficFilter::from_spec(request.traffic_filter.as_ref())?;

        let browser = self
            .lifecycle
            .ensure_ready(&LaunchOptions {
                debug: request.debug,
                proxy: request.proxy.clone(),
            })
            .await?;

        let page = Arc::new(
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| SnapshotError::General(format!("Failed to open page: {}", e)))?,
        );

        self.setup_page_context(&page, request, capture_id).await?;

        let ledger = Arc::new(TrafficLedger::new());
        let interceptor = TrafficInterceptor::new(ledger.clone(), filter, capture_id);
        interceptor.attach(&page).await?;

        let surface = PageSurface::new(page);

        let action_result = engine::execute(&surface, &request.pre_actions).await;
        if !action_result.success {
            tracing::warn!(%capture_id, error = ?action_result.error, "pre-actions ended early");
        }

        let outputs = engine::execute(&surface, &request.output_actions).await;
        if !outputs.success {
            tracing::warn!(%capture_id, error = ?outputs.error, "output actions ended early");
        }

        Ok(CaptureResult {
            network_traffics: ledger.snapshot().await,
            action_result,
            outputs,
        })
    }

    /// Device emulation wins over an explicit resolution; with neither, the
    /// configured default viewport applies.
    async fn setup_page_context(
        &self,
        page: &Arc<Page>,
        request: &CaptureRequest,
        capture_id: Uuid,
    ) -> Result<()> {
        if let Some(ref name) = request.device {
            let device = devices::get_device_by_name(name)?;
            emulation::apply_device(page, &device).await?;
            tracing::debug!(%capture_id, device = %device.name, "emulating device");
            return Ok(());
        }

        if let Some(ref resolution) = request.resolution {
            let (width, height) = devices::parse_resolution(resolution)?;
            emulation::apply_viewport(page, width, height).await?;
            tracing::debug!(%capture_id, width, height, "viewport sized");
            return Ok(());
        }

        emulation::apply_viewport(
            page,
            self.config.capture.viewport_width,
            self.config.capture.viewport_height,
        )
        .await
    }

    async fn teardown(&self, debug: bool) {
        if debug {
            tracing::debug!("debug mode, leaving browser open for inspection");
            return;
        }

        if let Err(e) = self.lifecycle.close().await {
            tracing::warn!(error = %e, "teardown failed");
        }
    }
}
