use thiserror::Error;

use crate::pipeline::Stage;
use crate::roles::RoleKey;

#[derive(Debug, Error)]
pub enum ThemeError {
    /// Corrupt data, unsupported format or zero dimensions.
    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("image has no visible pixels")]
    EmptyImage,

    #[error("palette is empty, nothing to map onto theme roles")]
    InsufficientPalette,

    /// The mapper produced a partial mapping. This is a defect, not a user error.
    #[error("theme is missing required keys: {}", key_list(.missing))]
    IncompleteTheme { missing: Vec<RoleKey> },

    #[error("stage failed unexpectedly: {reason}")]
    Pipeline { stage: Stage, reason: String },
}

fn key_list(keys: &[RoleKey]) -> String {
    keys.iter()
        .map(|key| key.attribute())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A stage error as delivered to the caller: the original error, unchanged, tagged with
/// the stage that raised it.
#[derive(Debug, Error)]
#[error("{stage}: {error}")]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub error: ThemeError,
}

impl StageFailure {
    pub fn new(stage: Stage, error: ThemeError) -> Self {
        Self { stage, error }
    }

    /// Errors the user can fix by picking another image.
    pub fn is_input_error(&self) -> bool {
        matches!(self.error, ThemeError::Decode(_) | ThemeError::EmptyImage)
    }

    pub fn user_message(&self) -> String {
        if self.is_input_error() {
            format!("{}. Try a different image.", self.error)
        } else {
            format!("Theme generation failed during {}: {}", self.stage, self.error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_ask_for_another_image() {
        let failure = StageFailure::new(Stage::Sampling, ThemeError::EmptyImage);
        assert!(failure.is_input_error());
        assert_eq!(
            failure.user_message(),
            "image has no visible pixels. Try a different image."
        );
    }

    #[test]
    fn other_errors_carry_stage_context() {
        let failure = StageFailure::new(
            Stage::Serializing,
            ThemeError::IncompleteTheme {
                missing: vec![RoleKey::Divider, RoleKey::ChatInBubble],
            },
        );
        assert!(!failure.is_input_error());
        assert_eq!(
            failure.to_string(),
            "serializing: theme is missing required keys: divider, chat_inBubble"
        );
        assert!(failure.user_message().starts_with("Theme generation failed during serializing"));
    }

    #[test]
    fn panicked_stage_is_named_once() {
        let failure = StageFailure::new(
            Stage::Sampling,
            ThemeError::Pipeline {
                stage: Stage::Sampling,
                reason: "task panicked".to_string(),
            },
        );
        assert_eq!(failure.to_string(), "sampling: stage failed unexpectedly: task panicked");
        assert_eq!(
            failure.user_message(),
            "Theme generation failed during sampling: stage failed unexpectedly: task panicked"
        );
    }
}
