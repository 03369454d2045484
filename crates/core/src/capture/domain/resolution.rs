use std::fmt;

use serde::{Deserialize, Serialize};

/// Requested capture size. Lower resolutions keep pose analysis fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// 640x480
    #[default]
    Vga,
    /// 1280x720
    Hd,
    Custom { width: u32, height: u32 },
}

impl Resolution {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Resolution::Vga => (640, 480),
            Resolution::Hd => (1280, 720),
            Resolution::Custom { width, height } => (width, height),
        }
    }

    /// Parses `vga`, `hd` or `WIDTHxHEIGHT`.
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "vga" => Some(Resolution::Vga),
            "hd" => Some(Resolution::Hd),
            other => {
                let (w, h) = other.split_once('x')?;
                let width = w.trim().parse().ok()?;
                let height = h.trim().parse().ok()?;
                (width > 0 && height > 0).then_some(Resolution::Custom { width, height })
            }
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.dimensions();
        write!(f, "{w}x{h}")
    }
}
