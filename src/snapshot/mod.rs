pub mod actions;
pub mod capture;
pub mod emulation;
pub mod engine;
pub mod interceptor;
pub mod ledger;
pub mod lifecycle;
pub mod surface;

pub use actions::{Action, KeyOp, KeyboardCommand, PaperFormat, PdfMargin, PdfOptions, WaitUntil};
pub use capture::{CaptureRequest, CaptureResult, DryRunStatus, SnapshotService};
pub use engine::{ExecutionReport, StepResult, execute};
pub use interceptor::{TrafficFilter, TrafficFilterSpec, TrafficInterceptor};
pub use ledger::{TrafficEntry, TrafficLedger, TrafficStatus};
pub use lifecycle::{BrowserLifecycle, LaunchOptions};
pub use surface::{PageSurface, Surface};
