use serde::{Deserialize, Serialize};

/// One declarative step in a scripted automation sequence.
///
/// This is the externally-stable wire shape of the scripting language: a flat
/// JSON object with a `type` discriminator plus type-specific fields. Optional
/// fields stay `None` here; defaults are applied by the execution engine,
/// never by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Action {
    Navigate {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wait_until: Option<WaitUntil>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    WaitForSelector {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        visible: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    KeyboardShortcut {
        commands: Vec<KeyboardCommand>,
    },
    TypeText {
        selector: String,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delay: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Click {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delay: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Scroll {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        times: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delta_y: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delay: Option<u64>,
    },
    SetContent {
        html: String,
    },
    Screenshot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        full_page: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quality: Option<u8>,
    },
    #[serde(rename = "toPDF")]
    ToPdf {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<PdfOptions>,
    },
    Sleep {
        ms: u64,
    },
}

impl Action {
    /// The wire discriminator, reused as the step label in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::WaitForSelector { .. } => "waitForSelector",
            Self::KeyboardShortcut { .. } => "keyboardShortcut",
            Self::TypeText { .. } => "typeText",
            Self::Click { .. } => "click",
            Self::Scroll { .. } => "scroll",
            Self::SetContent { .. } => "setContent",
            Self::Screenshot { .. } => "screenshot",
            Self::ToPdf { .. } => "toPDF",
            Self::Sleep { .. } => "sleep",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    #[default]
    Load,
    Domcontentloaded,
    Networkidle0,
    Networkidle2,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardCommand {
    pub op: KeyOp,
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyOp {
    Down,
    Up,
    Press,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaperFormat {
    #[default]
    A4,
    A3,
    Letter,
    Legal,
    Tabloid,
}

impl PaperFormat {
    /// Paper dimensions in inches, the unit `Page.printToPDF` expects.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            Self::A4 => (8.27, 11.7),
            Self::A3 => (11.7, 16.54),
            Self::Letter => (8.5, 11.0),
            Self::Legal => (8.5, 14.0),
            Self::Tabloid => (11.0, 17.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfOptions {
    pub format: Option<PaperFormat>,
    pub landscape: Option<bool>,
    pub print_background: Option<bool>,
    pub display_header_footer: Option<bool>,
    pub scale: Option<f64>,
    pub page_ranges: Option<String>,
    pub margin: Option<PdfMargin>,
}

/// Margins in inches.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfMargin {
    pub top: Option<f64>,
    pub bottom: Option<f64>,
    pub left: Option<f64>,
    pub right: Option<f64>,
}
