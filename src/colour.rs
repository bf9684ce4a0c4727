//! Straight-alpha colour in f32 plus the packed 8-bit pixel written to
//! output images.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Pixel {
    /// Packs as `0xRRGGBBAA`.
    pub fn pack(self) -> u32 {
        u32::from_be_bytes([self.r, self.g, self.b, self.a])
    }

    pub fn unpack(v: u32) -> Self {
        let [r, g, b, a] = v.to_be_bytes();
        Self { r, g, b, a }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColourSpec", into = "[f32; 4]")]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::new(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Rgba = Rgba::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0)
    }

    /// Parses `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        if !hex.is_ascii() || !(hex.len() == 6 || hex.len() == 8) {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        let (r, g, b) = (byte(0)?, byte(2)?, byte(4)?);
        let a = if hex.len() == 8 { byte(6)? } else { 255 };
        let mut c = Self::from_rgb8(r, g, b);
        c.a = a as f32 / 255.0;
        Some(c)
    }

    /// Hue in degrees, saturation and value in [0, 1].
    pub fn from_hsv(hue: f32, s: f32, v: f32, a: f32) -> Self {
        if s <= 0.0 {
            return Self::new(v, v, v, a);
        }
        let h = hue.rem_euclid(360.0) / 60.0;
        let sector = h.floor();
        let f = h - sector;
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));
        let (r, g, b) = match sector as u32 {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        };
        Self::new(r, g, b, a)
    }

    /// Returns `(hue_degrees, saturation, value)`. Greys report hue 0.
    pub fn to_hsv(self) -> (f32, f32, f32) {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        let delta = max - min;
        if max <= 0.0 {
            return (0.0, 0.0, 0.0);
        }
        let s = delta / max;
        if delta <= 0.0 {
            return (0.0, s, max);
        }
        let mut h = if self.r == max {
            (self.g - self.b) / delta
        } else if self.g == max {
            2.0 + (self.b - self.r) / delta
        } else {
            4.0 + (self.r - self.g) / delta
        };
        h *= 60.0;
        if h < 0.0 {
            h += 360.0;
        }
        (h, s, max)
    }

    pub fn lerp(self, other: Rgba, t: f32) -> Rgba {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: f32, b: f32| a + (b - a) * t;
        Rgba::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }

    /// Straight-alpha "over": `self` painted on top of `dst`.
    pub fn over(self, dst: Rgba) -> Rgba {
        let sa = self.a.clamp(0.0, 1.0);
        let da = dst.a.clamp(0.0, 1.0);
        let out_a = sa + da * (1.0 - sa);
        if out_a <= 1e-6 {
            return Rgba::TRANSPARENT;
        }
        if sa >= 1.0 {
            return Rgba::new(self.r, self.g, self.b, 1.0);
        }
        let blend = |sc: f32, dc: f32| (sc * sa + dc * da * (1.0 - sa)) / out_a;
        Rgba::new(
            blend(self.r, dst.r),
            blend(self.g, dst.g),
            blend(self.b, dst.b),
            out_a,
        )
    }

    pub fn is_valid(&self) -> bool {
        [self.r, self.g, self.b, self.a]
            .iter()
            .all(|c| c.is_finite() && (0.0..=1.0).contains(c))
    }

    pub fn to_pixel(self) -> Pixel {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        Pixel {
            r: q(self.r),
            g: q(self.g),
            b: q(self.b),
            a: q(self.a),
        }
    }
}

impl From<Rgba> for [f32; 4] {
    fn from(c: Rgba) -> Self {
        [c.r, c.g, c.b, c.a]
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.to_pixel();
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", p.r, p.g, p.b, p.a)
    }
}

/// Accepted spellings of a colour in settings files.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ColourSpec {
    Hex(String),
    Channels([f32; 4]),
    Rgb([f32; 3]),
    Hsv {
        h: f32,
        s: f32,
        v: f32,
        #[serde(default = "opaque")]
        a: f32,
    },
}

fn opaque() -> f32 {
    1.0
}

impl TryFrom<ColourSpec> for Rgba {
    type Error = String;

    fn try_from(spec: ColourSpec) -> Result<Self, Self::Error> {
        match spec {
            ColourSpec::Hex(s) => Rgba::from_hex(&s).ok_or_else(|| format!("bad hex colour {s:?}")),
            ColourSpec::Channels([r, g, b, a]) => Ok(Rgba::new(r, g, b, a)),
            ColourSpec::Rgb([r, g, b]) => Ok(Rgba::new(r, g, b, 1.0)),
            ColourSpec::Hsv { h, s, v, a } => Ok(Rgba::from_hsv(h, s, v, a)),
        }
    }
}
