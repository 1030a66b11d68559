//! Request parameter bounds, size presets, and size resolution.

use serde::{Deserialize, Serialize};

/// Smallest accepted image edge in pixels.
pub const MIN_IMAGE_SIZE: u32 = 256;
/// Largest accepted image edge in pixels.
pub const MAX_IMAGE_SIZE: u32 = 2048;
/// Slider granularity offered by the UI.
pub const SIZE_STEP: u32 = 32;

/// Accepted guidance scale range.
pub const MIN_GUIDANCE_SCALE: f32 = 1.0;
/// Upper guidance scale bound.
pub const MAX_GUIDANCE_SCALE: f32 = 15.0;

/// Accepted inference step range.
pub const MIN_INFERENCE_STEPS: u32 = 1;
/// Upper inference step bound.
pub const MAX_INFERENCE_STEPS: u32 = 50;

/// Preset value that switches size resolution to the custom panel.
pub const CUSTOM_PRESET: &str = "Custom";

/// Aspect-ratio presets offered by the preset size controls, as `WIDTHxHEIGHT`.
pub const PRESETS: &[&str] = &[
    "1024x1024",
    "1152x896",
    "896x1152",
    "1216x832",
    "832x1216",
    "1344x768",
    "768x1344",
    "1024x576",
    "576x1024",
    CUSTOM_PRESET,
];

/// How the caller chose the output size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SizeSelection {
    /// Free-form width/height sliders.
    Sliders {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
    /// A preset string, or [`CUSTOM_PRESET`] to use the custom panel.
    Preset {
        /// `WIDTHxHEIGHT` or `"Custom"`.
        preset: String,
        /// Custom panel width, used only with the `"Custom"` preset.
        custom_width: u32,
        /// Custom panel height, used only with the `"Custom"` preset.
        custom_height: u32,
    },
}

impl SizeSelection {
    /// Resolve to a validated `(width, height)` pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the preset cannot be parsed or a dimension is out
    /// of bounds.
    pub fn resolve(&self) -> Result<(u32, u32), String> {
        let (width, height) = match self {
            Self::Sliders { width, height } => (*width, *height),
            Self::Preset { preset, custom_width, custom_height } => {
                if preset == CUSTOM_PRESET {
                    (*custom_width, *custom_height)
                } else {
                    parse_preset(preset)?
                }
            }
        };
        validate_dimension("width", width)?;
        validate_dimension("height", height)?;
        Ok((width, height))
    }
}

/// Parse a `WIDTHxHEIGHT` preset string.
///
/// # Errors
///
/// Returns an error if the string is not two positive integers joined by `x`.
pub fn parse_preset(preset: &str) -> Result<(u32, u32), String> {
    let invalid = || format!("Invalid size preset '{preset}'. Expected WIDTHxHEIGHT or {CUSTOM_PRESET}");
    let (w, h) = preset.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
    let width = w.trim().parse::<u32>().map_err(|_| invalid())?;
    let height = h.trim().parse::<u32>().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}

/// Validate a single image edge against the size bounds.
///
/// # Errors
///
/// Returns an error if the value is out of range.
pub fn validate_dimension(name: &str, value: u32) -> Result<(), String> {
    if !(MIN_IMAGE_SIZE..=MAX_IMAGE_SIZE).contains(&value) {
        return Err(format!(
            "Unsupported {name} {value}. Valid: {MIN_IMAGE_SIZE}..={MAX_IMAGE_SIZE}"
        ));
    }
    Ok(())
}

/// Validate the guidance scale.
///
/// # Errors
///
/// Returns an error if the value is not finite or out of range.
pub fn validate_guidance_scale(value: f32) -> Result<(), String> {
    if value.is_finite() && (MIN_GUIDANCE_SCALE..=MAX_GUIDANCE_SCALE).contains(&value) {
        Ok(())
    } else {
        Err(format!(
            "Unsupported guidance scale {value}. Valid: {MIN_GUIDANCE_SCALE}..={MAX_GUIDANCE_SCALE}"
        ))
    }
}

/// Validate the inference step count.
///
/// # Errors
///
/// Returns an error if the value is out of range.
pub fn validate_steps(value: u32) -> Result<(), String> {
    if (MIN_INFERENCE_STEPS..=MAX_INFERENCE_STEPS).contains(&value) {
        Ok(())
    } else {
        Err(format!(
            "Unsupported inference step count {value}. Valid: {MIN_INFERENCE_STEPS}..={MAX_INFERENCE_STEPS}"
        ))
    }
}

/// Prefix the user's prompt with the style trigger.
#[must_use]
pub fn styled_prompt(prefix: &str, prompt: &str) -> String {
    format!("{prefix}{}", prompt.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preset(preset: &str, custom_width: u32, custom_height: u32) -> SizeSelection {
        SizeSelection::Preset { preset: preset.into(), custom_width, custom_height }
    }

    #[test]
    fn preset_landscape() {
        assert_eq!(preset("1024x576", 0, 0).resolve().unwrap(), (1024, 576));
    }

    #[test]
    fn custom_preset_uses_panel() {
        assert_eq!(preset("Custom", 800, 600).resolve().unwrap(), (800, 600));
    }

    #[test]
    fn custom_panel_is_ignored_for_fixed_presets() {
        assert_eq!(preset("1024x576", 800, 600).resolve().unwrap(), (1024, 576));
    }

    #[test]
    fn parse_preset_tolerates_case_and_whitespace() {
        assert_eq!(parse_preset("800x600").unwrap(), (800, 600));
        assert_eq!(parse_preset(" 1344X768 ").unwrap(), (1344, 768));
    }

    #[test]
    fn parse_preset_rejects_garbage() {
        assert!(parse_preset("1024").is_err());
        assert!(parse_preset("axb").is_err());
        assert!(parse_preset("0x512").is_err());
        assert!(parse_preset("16:9").is_err());
    }

    #[test]
    fn all_listed_presets_resolve() {
        for p in PRESETS.iter().filter(|p| **p != CUSTOM_PRESET) {
            assert!(preset(p, 0, 0).resolve().is_ok(), "preset {p} should resolve");
        }
    }

    #[test]
    fn sliders_pass_through() {
        let size = SizeSelection::Sliders { width: 512, height: 768 };
        assert_eq!(size.resolve().unwrap(), (512, 768));
    }

    #[test]
    fn dimension_bounds() {
        assert!(validate_dimension("width", 256).is_ok());
        assert!(validate_dimension("width", 2048).is_ok());
        assert!(validate_dimension("width", 224).is_err());
        assert!(validate_dimension("width", 2080).is_err());
        assert!(validate_dimension("height", 600).is_ok());
    }

    #[test]
    fn guidance_bounds() {
        assert!(validate_guidance_scale(3.5).is_ok());
        assert!(validate_guidance_scale(1.0).is_ok());
        assert!(validate_guidance_scale(15.0).is_ok());
        assert!(validate_guidance_scale(0.5).is_err());
        assert!(validate_guidance_scale(f32::NAN).is_err());
    }

    #[test]
    fn step_bounds() {
        assert!(validate_steps(28).is_ok());
        assert!(validate_steps(0).is_err());
        assert!(validate_steps(51).is_err());
    }

    #[test]
    fn prompt_gets_style_prefix() {
        assert_eq!(
            styled_prompt("in the style of TOK, ", "  a lighthouse at dusk "),
            "in the style of TOK, a lighthouse at dusk"
        );
    }

    #[test]
    fn size_selection_json_shape() {
        let size: SizeSelection = serde_json::from_value(serde_json::json!({
            "mode": "preset",
            "preset": "Custom",
            "custom_width": 640,
            "custom_height": 480
        }))
        .unwrap();
        assert_eq!(size.resolve().unwrap(), (640, 480));
    }
}
