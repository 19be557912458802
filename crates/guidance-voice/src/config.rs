//! Voice guidance configuration loaded from TOML and environment.
//!
//! | Key / Env | Default | Description |
//! |-----------|---------|-------------|
//! | `locale` / GUIDANCE_VOICE__LOCALE | system locale | Locale guidance is spoken in. |
//! | `muted` / GUIDANCE_VOICE__MUTED | false | Start muted. |
//! | `voice_volume` / GUIDANCE_VOICE__VOICE_VOLUME | 1.0 | Volume reported to callers (0.0–1.0). |
//! | `preferred_voice_locale` | en-US | Locale that uses the fixed preferred voice. |
//! | `preferred_voice_identifier` | Alex | Voice used for `preferred_voice_locale`, plain text only. |
//! | `espeak_bin` / GUIDANCE_VOICE__ESPEAK_BIN | `espeak-ng` on PATH | Command engine binary. |

use crate::error::VoiceResult;
use crate::locale::Locale;
use crate::voice::ALEX_VOICE_IDENTIFIER;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_voice_volume() -> f32 {
    1.0
}

fn default_preferred_voice_locale() -> String {
    "en-US".to_string()
}

fn default_preferred_voice_identifier() -> String {
    ALEX_VOICE_IDENTIFIER.to_string()
}

/// Adapter configuration. Load with [`VoiceConfig::load`] or build with `Default`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Locale override. `None` uses [`Locale::current`].
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub muted: bool,
    #[serde(default = "default_voice_volume")]
    pub voice_volume: f32,
    #[serde(default = "default_preferred_voice_locale")]
    pub preferred_voice_locale: String,
    #[serde(default = "default_preferred_voice_identifier")]
    pub preferred_voice_identifier: String,
    #[serde(default)]
    pub espeak_bin: Option<PathBuf>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            locale: None,
            muted: false,
            voice_volume: default_voice_volume(),
            preferred_voice_locale: default_preferred_voice_locale(),
            preferred_voice_identifier: default_preferred_voice_identifier(),
            espeak_bin: None,
        }
    }
}

impl VoiceConfig {
    /// Load config from file and environment. Precedence: env `GUIDANCE_VOICE__*` > file named by
    /// `GUIDANCE_VOICE_CONFIG` (default `config/voice`) > defaults.
    pub fn load() -> VoiceResult<Self> {
        let config_path =
            std::env::var("GUIDANCE_VOICE_CONFIG").unwrap_or_else(|_| "config/voice".to_string());
        Self::load_from(Path::new(&config_path))
    }

    /// Like [`load`](Self::load) with an explicit file path. A missing file is not an error.
    pub fn load_from(path: &Path) -> VoiceResult<Self> {
        let builder = config::Config::builder()
            .set_default("muted", false)?
            .set_default("voice_volume", 1.0_f64)?
            .set_default("preferred_voice_locale", default_preferred_voice_locale())?
            .set_default("preferred_voice_identifier", default_preferred_voice_identifier())?;

        let builder = builder.add_source(config::File::from(path).required(false));

        let built = builder
            .add_source(config::Environment::with_prefix("GUIDANCE_VOICE").separator("__"))
            .build()?;

        let mut cfg: Self = built.try_deserialize()?;
        cfg.voice_volume = cfg.voice_volume.clamp(0.0, 1.0);
        Ok(cfg)
    }

    /// Configured locale, or the system locale when unset.
    pub fn locale(&self) -> Locale {
        self.locale
            .as_deref()
            .map(Locale::new)
            .unwrap_or_else(Locale::current)
    }

    pub fn preferred_voice_locale(&self) -> Locale {
        Locale::new(&self.preferred_voice_locale)
    }
}

/// Read-only source of the user's guidance volume.
pub trait VoiceSettings: Send + Sync {
    fn voice_volume(&self) -> f32;
}

/// Navigation-wide settings as loaded from [`VoiceConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigationSettings {
    pub voice_volume: f32,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            voice_volume: default_voice_volume(),
        }
    }
}

impl From<&VoiceConfig> for NavigationSettings {
    fn from(cfg: &VoiceConfig) -> Self {
        Self {
            voice_volume: cfg.voice_volume,
        }
    }
}

impl VoiceSettings for NavigationSettings {
    fn voice_volume(&self) -> f32 {
        self.voice_volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let cfg = VoiceConfig::default();
        assert!(!cfg.muted);
        assert_eq!(cfg.voice_volume, 1.0);
        assert_eq!(cfg.preferred_voice_locale().identifier(), "en-US");
        assert_eq!(cfg.preferred_voice_identifier, ALEX_VOICE_IDENTIFIER);
    }

    #[test]
    fn explicit_locale_overrides_system() {
        let cfg = VoiceConfig {
            locale: Some("de_DE".to_string()),
            ..Default::default()
        };
        assert_eq!(cfg.locale().identifier(), "de-DE");
    }

    #[test]
    fn loads_toml_file_and_clamps_volume() {
        let dir = std::env::temp_dir().join(format!("guidance-voice-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("voice.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "locale = \"fr-FR\"\nmuted = true\nvoice_volume = 3.5").unwrap();

        let cfg = VoiceConfig::load_from(&path).unwrap();
        assert_eq!(cfg.locale().identifier(), "fr-FR");
        assert!(cfg.muted);
        assert_eq!(cfg.voice_volume, 1.0);
        assert_eq!(NavigationSettings::from(&cfg).voice_volume(), 1.0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let cfg = VoiceConfig::load_from(Path::new("/nonexistent/guidance-voice")).unwrap();
        assert_eq!(cfg.preferred_voice_locale, "en-US");
    }
}
