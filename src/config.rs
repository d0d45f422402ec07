use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, TikbatchError};

fn default_version_arg() -> String {
    "--version".to_string()
}

fn default_probe_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub runtime: RuntimeConfig,
    pub encoder: EncoderConfig,
    pub output: OutputConfig,
    pub caption: CaptionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Candidate runtime commands, probed in order until one answers the
    /// version check with exit code 0
    pub candidates: Vec<String>,
    /// Argument passed to each candidate as a version check
    #[serde(default = "default_version_arg")]
    pub version_arg: String,
    /// Maximum seconds to wait for a single version probe
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Path to the encoder script executed by the resolved runtime
    pub script_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory where converted videos are written
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionConfig {
    /// Font used for the burned-in caption
    pub font: CaptionFont,
}

/// The fixed set of caption fonts understood by the encoder script.
/// The identifier is passed through opaquely on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptionFont {
    Impact,
    ArialBlack,
    MontserratBold,
    BebasNeue,
    OswaldBold,
}

impl CaptionFont {
    pub const ALL: [CaptionFont; 5] = [
        CaptionFont::Impact,
        CaptionFont::ArialBlack,
        CaptionFont::MontserratBold,
        CaptionFont::BebasNeue,
        CaptionFont::OswaldBold,
    ];

    /// Identifier as expected by the encoder script.
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionFont::Impact => "Impact",
            CaptionFont::ArialBlack => "Arial-Black",
            CaptionFont::MontserratBold => "Montserrat-Bold",
            CaptionFont::BebasNeue => "Bebas-Neue",
            CaptionFont::OswaldBold => "Oswald-Bold",
        }
    }
}

impl fmt::Display for CaptionFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptionFont {
    type Err = TikbatchError;

    fn from_str(s: &str) -> Result<Self> {
        CaptionFont::ALL
            .iter()
            .find(|font| font.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| {
                TikbatchError::Config(format!(
                    "Unknown caption font '{}'. Valid fonts: {}",
                    s,
                    CaptionFont::ALL.map(|f| f.as_str()).join(", ")
                ))
            })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig {
                candidates: vec![
                    "python3".to_string(),
                    "python".to_string(),
                    "py".to_string(),
                ],
                version_arg: default_version_arg(),
                probe_timeout_secs: default_probe_timeout_secs(),
            },
            encoder: EncoderConfig {
                script_path: PathBuf::from("processor.py"),
            },
            output: OutputConfig {
                dir: default_output_dir(),
            },
            caption: CaptionConfig {
                font: CaptionFont::Impact,
            },
        }
    }
}

/// Default directory for converted videos: `~/TikTok_Output`, falling back
/// to the current directory when no home directory can be determined.
pub fn default_output_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("TikTok_Output")
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TikbatchError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| TikbatchError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TikbatchError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TikbatchError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caption_font_round_trip() {
        for font in CaptionFont::ALL {
            assert_eq!(font.as_str().parse::<CaptionFont>().unwrap(), font);
        }
        assert!("Comic-Sans".parse::<CaptionFont>().is_err());
    }

    #[test]
    fn test_default_candidates_order() {
        let config = Config::default();
        assert_eq!(config.runtime.candidates, ["python3", "python", "py"]);
    }
}
