use anyhow::Error;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error as ThisError;

/// Configuration errors raised while an effect is being built.
///
/// Every variant is detected before the first frame is produced; nothing in the
/// frame loop returns one of these.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum EngineError {
    #[error("canvas dimensions must be at least 1x1, got {width}x{height}")]
    InvalidCanvas { width: usize, height: usize },
    #[error("path '{id}' has no waypoints")]
    EmptyPath { id: String },
    #[error("path '{id}' speed must be finite and > 0, got {speed}")]
    InvalidSpeed { id: String, speed: f64 },
    #[error("scene '{id}' has no frames")]
    EmptyScene { id: String },
    #[error("scene '{id}' frame {index} duration must be >= 1 tick")]
    ZeroFrameDuration { id: String, index: usize },
    #[error("scene '{id}' frame durations add up to more than {} ticks", u32::MAX)]
    SceneTooLong { id: String },
    #[error("gradient requires at least one stop color")]
    EmptyGradient,
    #[error("gradient step counts must be >= 1")]
    ZeroGradientSteps,
    #[error("invalid color '{value}': expected an xterm index 0-255 or an RGB hex triple")]
    InvalidColor { value: String },
    #[error("tab width must be >= 1, got {0}")]
    InvalidTabWidth(usize),
    #[error("unknown anchor '{0}', expected one of n, ne, e, se, s, sw, w, nw, c")]
    UnknownAnchor(String),
    #[error("unknown easing function '{0}'")]
    UnknownEasing(String),
    #[error("unknown gradient direction '{0}'")]
    UnknownDirection(String),
    #[error("unknown effect '{0}'")]
    UnknownEffect(String),
    #[error("effect '{effect}': {message}")]
    InvalidEffectConfig {
        effect: &'static str,
        message: String,
    },
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCanvas { .. } => "E_CANVAS",
            Self::EmptyPath { .. } => "E_EMPTY_PATH",
            Self::InvalidSpeed { .. } => "E_PATH_SPEED",
            Self::EmptyScene { .. } => "E_EMPTY_SCENE",
            Self::ZeroFrameDuration { .. } | Self::SceneTooLong { .. } => "E_FRAME_DURATION",
            Self::EmptyGradient => "E_GRADIENT_STOPS",
            Self::ZeroGradientSteps => "E_GRADIENT_STEPS",
            Self::InvalidColor { .. } => "E_COLOR",
            Self::InvalidTabWidth(_) => "E_TAB_WIDTH",
            Self::UnknownAnchor(_) => "E_ANCHOR",
            Self::UnknownEasing(_) => "E_EASING",
            Self::UnknownDirection(_) => "E_GRADIENT_DIRECTION",
            Self::UnknownEffect(_) => "E_UNKNOWN_EFFECT",
            Self::InvalidEffectConfig { .. } => "E_EFFECT_CONFIG",
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            Self::InvalidCanvas { width, height } => {
                Some(serde_json::json!({ "width": width, "height": height }))
            }
            Self::EmptyPath { id } | Self::EmptyScene { id } | Self::SceneTooLong { id } => {
                Some(serde_json::json!({ "id": id }))
            }
            Self::ZeroFrameDuration { id, index } => {
                Some(serde_json::json!({ "id": id, "frame": index }))
            }
            Self::InvalidColor { value } => Some(serde_json::json!({ "value": value })),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: ErrorEnvelopeBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelopeBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorEnvelope {
    /// Builds the machine-readable envelope for any application error. Errors that
    /// do not wrap an [`EngineError`] are reported as `E_RUNTIME`.
    pub fn from_error(error: &Error) -> Self {
        let (code, details) = match find_engine_error(error) {
            Some(engine) => (engine.code(), engine.details()),
            None => ("E_RUNTIME", None),
        };
        Self {
            ok: false,
            error: ErrorEnvelopeBody {
                code: code.to_owned(),
                message: format!("{error:#}"),
                details,
            },
        }
    }
}

pub fn find_engine_error(error: &Error) -> Option<&EngineError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<EngineError>())
}
