//! Engine defaults, per-sprite options and their merge.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::SpriteError;
use crate::Result;

/// Engine-wide defaults that per-sprite options are merged over.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_fps: f64,
    pub default_loop: bool,
    pub default_autoplay: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_fps: 12.0,
            default_loop: false,
            default_autoplay: true,
        }
    }
}

impl Config {
    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        non_negative("default_fps", Some(self.default_fps))
    }
}

/// Sizes, rates and durations must be finite and not negative. Zero is
/// allowed: a zero rate or duration runs frames back to back.
fn non_negative(field: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(SpriteError::InvalidConfig {
            reason: format!("{field} must be a finite, non-negative number (got {v})"),
        }),
        _ => Ok(()),
    }
}

/// The element a sprite is attached to, as seen by the host.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SpriteElement {
    /// Stable identity of the element (DOM id, selector, entity name...).
    pub key: String,
    /// Raw CSS `background-image` value, e.g. `url("walk.png")`.
    pub background_image: String,
    pub rendered_width: f64,
    pub rendered_height: f64,
}

impl SpriteElement {
    pub fn new(
        key: impl Into<String>,
        background_image: impl Into<String>,
        rendered_width: f64,
        rendered_height: f64,
    ) -> Self {
        Self {
            key: key.into(),
            background_image: background_image.into(),
            rendered_width,
            rendered_height,
        }
    }
}

/// Caller-supplied options. Anything left `None` falls back to the element
/// size or to [`Config`].
///
/// `totalFrames: false` and `columns: false` are accepted and mean "derive it".
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpriteConfig {
    #[serde(alias = "width", alias = "frameWidth")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_width: Option<f64>,
    #[serde(alias = "height", alias = "frameHeight")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_height: Option<f64>,
    #[serde(alias = "totalFrames", deserialize_with = "count_or_false")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_frames: Option<u32>,
    #[serde(deserialize_with = "count_or_false")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    /// Total playback time in milliseconds; overrides `fps`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(rename = "loop")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub looping: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoplay: Option<bool>,
    /// Named sequences of frame indices, in declaration order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animations: Option<IndexMap<String, Vec<u32>>>,
}

impl SpriteConfig {
    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject option values no sheet could be rendered with.
    pub fn validate(&self) -> Result<()> {
        non_negative("width", self.frame_width)?;
        non_negative("height", self.frame_height)?;
        non_negative("fps", self.fps)?;
        non_negative("duration", self.duration)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CountOrFlag {
    Count(u32),
    Flag(bool),
}

/// Zero, `false` and `null` all mean "not supplied".
fn count_or_false<'de, D>(de: D) -> core::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<CountOrFlag>::deserialize(de)? {
        Some(CountOrFlag::Count(n)) if n > 0 => Some(n),
        _ => None,
    })
}

/// Fully merged settings for one sprite.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Settings {
    pub frame_width: f64,
    pub frame_height: f64,
    pub total_frames: Option<u32>,
    pub columns: Option<u32>,
    pub fps: f64,
    pub duration: Option<f64>,
    pub looping: bool,
    pub autoplay: bool,
    pub animations: Option<IndexMap<String, Vec<u32>>>,
}

impl Settings {
    /// Options win over element size, element size wins over engine defaults.
    pub fn merge(defaults: &Config, element: &SpriteElement, cfg: SpriteConfig) -> Self {
        Self {
            frame_width: cfg.frame_width.unwrap_or(element.rendered_width),
            frame_height: cfg.frame_height.unwrap_or(element.rendered_height),
            total_frames: cfg.total_frames,
            columns: cfg.columns,
            fps: cfg.fps.unwrap_or(defaults.default_fps),
            duration: cfg.duration,
            looping: cfg.looping.unwrap_or(defaults.default_loop),
            autoplay: cfg.autoplay.unwrap_or(defaults.default_autoplay),
            animations: cfg.animations.filter(|a| !a.is_empty()),
        }
    }

    /// Frame indices of a named sequence.
    pub fn sequence(&self, name: &str) -> Option<&[u32]> {
        self.animations
            .as_ref()
            .and_then(|a| a.get(name))
            .map(Vec::as_slice)
    }

    /// Name of the first declared sequence; playback falls back to it when
    /// sequences exist but none was picked.
    pub fn first_sequence(&self) -> Option<&str> {
        self.animations
            .as_ref()
            .and_then(|a| a.keys().next())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element() -> SpriteElement {
        SpriteElement::new("hero", "url(hero.png)", 64.0, 48.0)
    }

    #[test]
    fn merge_uses_element_size_and_defaults() {
        let s = Settings::merge(&Config::default(), &element(), SpriteConfig::default());
        assert_eq!(s.frame_width, 64.0);
        assert_eq!(s.frame_height, 48.0);
        assert_eq!(s.fps, 12.0);
        assert!(!s.looping);
        assert!(s.autoplay);
        assert_eq!(s.columns, None);
        assert_eq!(s.total_frames, None);
        assert_eq!(s.duration, None);
    }

    #[test]
    fn options_override_defaults() {
        let cfg = SpriteConfig {
            frame_width: Some(100.0),
            fps: Some(24.0),
            looping: Some(true),
            autoplay: Some(false),
            ..Default::default()
        };
        let s = Settings::merge(&Config::default(), &element(), cfg);
        assert_eq!(s.frame_width, 100.0);
        assert_eq!(s.frame_height, 48.0);
        assert_eq!(s.fps, 24.0);
        assert!(s.looping);
        assert!(!s.autoplay);
    }

    #[test]
    fn parses_plugin_style_options() {
        let cfg = SpriteConfig::from_json(
            r#"{
                "width": 100, "height": 50,
                "totalFrames": false, "columns": 4,
                "loop": true,
                "animations": { "walk": [2, 3, 4], "idle": [0, 1] }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.frame_width, Some(100.0));
        assert_eq!(cfg.frame_height, Some(50.0));
        assert_eq!(cfg.total_frames, None);
        assert_eq!(cfg.columns, Some(4));
        assert_eq!(cfg.looping, Some(true));
        let names: Vec<_> = cfg.animations.unwrap().keys().cloned().collect();
        assert_eq!(names, vec!["walk", "idle"]);
    }

    #[test]
    fn zero_counts_mean_unset() {
        let cfg = SpriteConfig::from_json(r#"{ "columns": 0, "total_frames": null }"#).unwrap();
        assert_eq!(cfg.columns, None);
        assert_eq!(cfg.total_frames, None);
    }

    #[test]
    fn empty_animation_map_is_ignored() {
        let cfg = SpriteConfig::from_json(r#"{ "animations": {} }"#).unwrap();
        let s = Settings::merge(&Config::default(), &element(), cfg);
        assert!(s.animations.is_none());
        assert_eq!(s.first_sequence(), None);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = SpriteConfig::from_json(r#"{ "fps": "fast" }"#).unwrap_err();
        assert!(matches!(err, SpriteError::Serialization { .. }));
    }

    #[test]
    fn engine_config_from_partial_json() {
        let cfg = Config::from_json(r#"{ "default_fps": 30 }"#).unwrap();
        assert_eq!(cfg.default_fps, 30.0);
        assert!(cfg.default_autoplay);
    }

    #[test]
    fn rejects_negative_or_non_finite_values() {
        let err = SpriteConfig::from_json(r#"{ "width": -10 }"#).unwrap_err();
        assert!(matches!(err, SpriteError::InvalidConfig { .. }));
        assert_eq!(err.category(), "config");
        assert!(err.to_string().contains("width"));

        let err = SpriteConfig::from_json(r#"{ "duration": -1 }"#).unwrap_err();
        assert!(matches!(err, SpriteError::InvalidConfig { .. }));

        let cfg = SpriteConfig {
            fps: Some(f64::NAN),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        assert!(Config::from_json(r#"{ "default_fps": -12 }"#).is_err());
    }

    #[test]
    fn zero_rate_is_accepted() {
        let cfg = SpriteConfig::from_json(r#"{ "fps": 0, "duration": 0 }"#).unwrap();
        assert_eq!(cfg.fps, Some(0.0));
    }
}
