use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::models::FormatCategory;

pub const MIN_DIMENSION: u32 = 1;
pub const MAX_DIMENSION: u32 = 50_000;
pub const MIN_PERCENTAGE: u32 = 1;
pub const MAX_PERCENTAGE: u32 = 10_000;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    #[default]
    Original,
    Custom,
    Percentage,
}

/// Image conversion options. Only meaningful for image targets.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(default)]
pub struct ConversionSettings {
    pub resize_mode: ResizeMode,
    pub width: u32,
    pub height: u32,
    pub percentage: u32,
    /// `#RGB` or `#RRGGBB`, used to flatten transparency
    pub background_color: String,
    /// Lossy compression where the target supports it
    pub compress: bool,
    pub auto_orient: bool,
    pub strip_metadata: bool,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            resize_mode: ResizeMode::Original,
            width: 1920,
            height: 1080,
            percentage: 100,
            background_color: "#FFFFFF".to_string(),
            compress: false,
            auto_orient: true,
            strip_metadata: true,
        }
    }
}

impl ConversionSettings {
    /// Validates settings against the target category.
    ///
    /// Image targets get clamped settings (defaults when none were sent). Document
    /// targets take no settings: anything other than the defaults is rejected.
    pub fn for_category(
        settings: Option<ConversionSettings>,
        category: FormatCategory,
    ) -> Result<Option<ConversionSettings>, AppError> {
        match category {
            FormatCategory::Image => Ok(Some(settings.unwrap_or_default().normalized()?)),
            FormatCategory::Document => match settings {
                Some(s) if s != ConversionSettings::default() => Err(AppError::InvalidSettings(
                    "Image settings cannot be applied to a document target".to_string(),
                )),
                _ => Ok(None),
            },
        }
    }

    /// Clamps dimensions and percentage into range and canonicalizes the colour.
    pub fn normalized(mut self) -> Result<Self, AppError> {
        self.width = self.width.clamp(MIN_DIMENSION, MAX_DIMENSION);
        self.height = self.height.clamp(MIN_DIMENSION, MAX_DIMENSION);
        self.percentage = self.percentage.clamp(MIN_PERCENTAGE, MAX_PERCENTAGE);
        let [r, g, b] = parse_hex_color(&self.background_color)?;
        self.background_color = format!("#{:02X}{:02X}{:02X}", r, g, b);
        Ok(self)
    }

    pub fn background_rgb(&self) -> Result<[u8; 3], AppError> {
        parse_hex_color(&self.background_color)
    }
}

pub fn parse_hex_color(value: &str) -> Result<[u8; 3], AppError> {
    let invalid = || {
        AppError::InvalidSettings(format!(
            "background_color must be #RGB or #RRGGBB, got '{}'",
            value
        ))
    };

    let hex = value.trim().strip_prefix('#').ok_or_else(invalid)?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return Err(invalid()),
    };

    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).map_err(|_| invalid());
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_ui() {
        let s = ConversionSettings::default();
        assert_eq!(s.resize_mode, ResizeMode::Original);
        assert_eq!((s.width, s.height, s.percentage), (1920, 1080, 100));
        assert!(s.auto_orient && s.strip_metadata && !s.compress);
    }

    #[test]
    fn test_normalized_clamps() {
        let s = ConversionSettings {
            resize_mode: ResizeMode::Custom,
            width: 0,
            height: 90_000,
            percentage: 20_000,
            background_color: "#abc".to_string(),
            ..Default::default()
        }
        .normalized()
        .unwrap();
        assert_eq!(s.width, 1);
        assert_eq!(s.height, 50_000);
        assert_eq!(s.percentage, 10_000);
        assert_eq!(s.background_color, "#AABBCC");
    }

    #[test]
    fn test_invalid_color_rejected() {
        for bad in ["red", "#12", "#GGGGGG", "FFFFFF"] {
            assert!(matches!(
                parse_hex_color(bad),
                Err(AppError::InvalidSettings(_))
            ));
        }
        assert_eq!(parse_hex_color("#000000").unwrap(), [0, 0, 0]);
    }

    #[test]
    fn test_document_targets_reject_custom_settings() {
        let custom = ConversionSettings {
            compress: true,
            ..Default::default()
        };
        assert!(ConversionSettings::for_category(Some(custom), FormatCategory::Document).is_err());
        assert_eq!(
            ConversionSettings::for_category(None, FormatCategory::Document).unwrap(),
            None
        );
        assert_eq!(
            ConversionSettings::for_category(None, FormatCategory::Image).unwrap(),
            Some(ConversionSettings::default())
        );
    }
}
