use crate::devices::DeviceProfile;
use crate::{Result, SnapshotError};
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetTouchEmulationEnabledParams, SetUserAgentOverrideParams,
};
use std::sync::Arc;

/// Applies a named device profile: metrics, user agent and touch emulation.
pub async fn apply_device(page: &Arc<Page>, device: &DeviceProfile) -> Result<()> {
    device.validate()?;

    let metrics = SetDeviceMetricsOverrideParams::builder()
        .width(device.width as i64)
        .height(device.height as i64)
        .device_scale_factor(device.pixel_ratio)
        .mobile(device.mobile)
        .build()
        .map_err(|e| SnapshotError::General(format!("Failed to build metrics params: {}", e)))?;

    page.execute(metrics)
        .await
        .map_err(|e| SnapshotError::General(format!("Failed to set device metrics: {}", e)))?;

    if let Ok(user_agent) = SetUserAgentOverrideParams::builder()
        .user_agent(device.user_agent.clone())
        .build()
    {
        page.execute(user_agent)
            .await
            .map_err(|e| SnapshotError::General(format!("Failed to set user agent: {}", e)))?;
    }

    if let Ok(touch) = SetTouchEmulationEnabledParams::builder()
        .enabled(device.touch)
        .build()
    {
        page.execute(touch)
            .await
            .map_err(|e| SnapshotError::General(format!("Failed to set touch emulation: {}", e)))?;
    }

    Ok(())
}

/// Sizes the viewport to an explicit `width`x`height` without device
/// emulation.
pub async fn apply_viewport(page: &Arc<Page>, width: u32, height: u32) -> Result<()> {
    let metrics = SetDeviceMetricsOverrideParams::builder()
        .width(width as i64)
        .height(height as i64)
        .device_scale_factor(1.0)
        .mobile(false)
        .build()
        .map_err(|e| SnapshotError::General(format!("Failed to build metrics params: {}", e)))?;

    page.execute(metrics)
        .await
        .map_err(|e| SnapshotError::General(format!("Failed to set viewport: {}", e)))?;

    Ok(())
}
