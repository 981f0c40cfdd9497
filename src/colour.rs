use serde::{Deserialize, Serialize};

use crate::components::RegionId;

/// Linear RGB colour, each channel in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// From a packed `0xRRGGBB` value.
    pub fn from_u24(hex: u32) -> Self {
        let hex = hex & 0xFF_FFFF;
        Self::new(
            ((hex >> 16) & 0xFF) as f32 / 255.0,
            ((hex >> 8) & 0xFF) as f32 / 255.0,
            (hex & 0xFF) as f32 / 255.0,
        )
    }

    /// Parse `#rrggbb` or `rrggbb`.
    pub fn from_hex(s: &str) -> Option<Self> {
        let digits = s.trim().trim_start_matches('#');
        if digits.len() != 6 {
            return None;
        }
        u32::from_str_radix(digits, 16).ok().map(Self::from_u24)
    }

    pub fn to_u8(self) -> [u8; 3] {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [c(self.r), c(self.g), c(self.b)]
    }

    pub fn to_hex(self) -> String {
        let [r, g, b] = self.to_u8();
        format!("#{r:02x}{g:02x}{b:02x}")
    }

    pub fn to_array(self, alpha: f32) -> [f32; 4] {
        [self.r, self.g, self.b, alpha]
    }

    pub fn is_white(self) -> bool {
        self.to_u8() == [255, 255, 255]
    }

    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        Rgb::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
        )
    }
}

/// Mouseover highlight, `hsl(54, 100%, 50%)`.
pub const MOUSEOVER_YELLOW: Rgb = Rgb::new(1.0, 0.9, 0.0);

/// Replaces pure white on regions marked as added, `hsl(0, 0%, 50%)`.
pub const NEUTRAL_GRAY: Rgb = Rgb::new(0.5, 0.5, 0.5);

/// Default category palette for variable colours, assigned cyclically.
pub const VARIABLE_PALETTE: [&str; 20] = [
    "#bcbd22", "#9467bd", "#17becf", "#ff7f0e", "#98df8a", "#1f77b4", "#dbdb8d", "#aec7e8",
    "#c5b0d5", "#ff9896", "#2ca02c", "#f7b6d2", "#8c564b", "#9edae5", "#d62728", "#7f7f7f",
    "#ffbb78", "#c49c94", "#c7c7c7", "#e377c2",
];

/// Convert HSL to RGB. `h` in degrees, `s` and `l` in [0, 1].
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> Rgb {
    let h = h.rem_euclid(360.0) / 360.0;
    if s == 0.0 {
        return Rgb::new(l, l, l);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    Rgb::new(
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    )
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

/// Heat-map colour schemes over a normalized [0, 1] fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HeatScheme {
    /// Hue sweep from blue (0) to red (1).
    Rainbow,
    /// White to red. Used for base fill and deselected regions.
    #[default]
    Red,
    /// White to green. Used for regions added to the chart.
    Green,
    Blue,
    Orange,
}

impl HeatScheme {
    pub const ALL: [HeatScheme; 5] = [
        HeatScheme::Rainbow,
        HeatScheme::Red,
        HeatScheme::Green,
        HeatScheme::Blue,
        HeatScheme::Orange,
    ];

    /// Colour for a heat fraction. NaN maps to the scheme's fallback;
    /// other values are clamped to [0, 1].
    pub fn colour(self, fraction: f64) -> Rgb {
        if fraction.is_nan() {
            return self.fallback();
        }
        let v = fraction.clamp(0.0, 1.0) as f32;
        match self {
            HeatScheme::Rainbow => hsl_to_rgb((1.0 - v) * 240.0, 1.0, 0.5),
            HeatScheme::Red => hsl_to_rgb(0.0, 1.0, lightness(v, 50.0)),
            HeatScheme::Blue => hsl_to_rgb(240.0, 1.0, lightness(v, 50.0)),
            HeatScheme::Orange => hsl_to_rgb(20.0, 1.0, lightness(v, 50.0)),
            HeatScheme::Green => hsl_to_rgb(120.0, 1.0, lightness(v, 75.0)),
        }
    }

    /// Colour returned for a NaN fraction.
    pub fn fallback(self) -> Rgb {
        match self {
            HeatScheme::Rainbow => Rgb::BLACK,
            _ => Rgb::WHITE,
        }
    }
}

// Whole-percent lightness falling from 100% at v=0 to (100-span)% at v=1.
fn lightness(v: f32, span: f32) -> f32 {
    ((1.0 - v) * span + (100.0 - span)).floor() / 100.0
}

/// Deterministic colour for a region when there is nothing to normalize
/// against: `((id - 20000) / 10000) * 0xFFFFFF`, clamped to the colour range.
pub fn region_identity_colour(id: RegionId) -> Rgb {
    let packed = (id.0 as f64 - 20000.0) / 10000.0 * f64::from(0xFF_FFFFu32);
    let packed = packed.floor().clamp(0.0, f64::from(0xFF_FFFFu32));
    Rgb::from_u24(packed as u32)
}

/// Hash a name into a colour by alternately adding and multiplying its
/// character codes, kept below 1e16.
pub fn colour_from_name(name: &str) -> Rgb {
    const LIMIT: u64 = 10_000_000_000_000_000;
    let mut number: u64 = 1;
    for (i, ch) in name.chars().enumerate() {
        let code = u64::from(u32::from(ch));
        number = if i % 2 == 0 {
            number.wrapping_add(code)
        } else {
            number.wrapping_mul(code)
        };
        if number > LIMIT {
            number %= LIMIT;
        }
    }
    Rgb::from_u24((number % 0xFF_FFFF) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Rgb, b: Rgb) -> bool {
        (a.r - b.r).abs() < 1e-3 && (a.g - b.g).abs() < 1e-3 && (a.b - b.b).abs() < 1e-3
    }

    #[test]
    fn hsl_primaries() {
        assert!(close(hsl_to_rgb(0.0, 1.0, 0.5), Rgb::new(1.0, 0.0, 0.0)));
        assert!(close(hsl_to_rgb(120.0, 1.0, 0.5), Rgb::new(0.0, 1.0, 0.0)));
        assert!(close(hsl_to_rgb(240.0, 1.0, 0.5), Rgb::new(0.0, 0.0, 1.0)));
        assert!(close(hsl_to_rgb(0.0, 0.0, 0.5), NEUTRAL_GRAY));
        assert!(close(hsl_to_rgb(54.0, 1.0, 0.5), MOUSEOVER_YELLOW));
    }

    #[test]
    fn hex_round_trip() {
        let c = Rgb::from_hex("#ff7f0e").unwrap();
        assert_eq!(c.to_hex(), "#ff7f0e");
        assert!(Rgb::from_hex("#fff").is_none());
        assert!(Rgb::from_hex("zzzzzz").is_none());
    }

    #[test]
    fn nan_fallbacks_are_defined() {
        assert_eq!(HeatScheme::Rainbow.colour(f64::NAN), Rgb::BLACK);
        for scheme in [HeatScheme::Red, HeatScheme::Green, HeatScheme::Blue, HeatScheme::Orange] {
            assert_eq!(scheme.colour(f64::NAN), Rgb::WHITE);
        }
    }

    #[test]
    fn red_runs_from_white_to_red() {
        assert!(HeatScheme::Red.colour(0.0).is_white());
        assert!(close(HeatScheme::Red.colour(1.0), Rgb::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn green_ends_darker_than_red() {
        let g = HeatScheme::Green.colour(1.0);
        assert!(close(g, hsl_to_rgb(120.0, 1.0, 0.25)));
    }

    #[test]
    fn lightness_is_monotonic() {
        for scheme in [HeatScheme::Red, HeatScheme::Green, HeatScheme::Blue, HeatScheme::Orange] {
            let mut prev = f32::MAX;
            for i in 0..=20 {
                let c = scheme.colour(i as f64 / 20.0);
                let l = c.r.max(c.g).max(c.b) + c.r.min(c.g).min(c.b);
                assert!(l <= prev + 1e-6, "{scheme:?} lightness rose at step {i}");
                prev = l;
            }
        }
    }

    #[test]
    fn rainbow_hue_sweeps_blue_to_red() {
        assert!(close(HeatScheme::Rainbow.colour(0.0), Rgb::new(0.0, 0.0, 1.0)));
        assert!(close(HeatScheme::Rainbow.colour(1.0), Rgb::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn fractions_are_clamped() {
        assert_eq!(HeatScheme::Red.colour(3.0), HeatScheme::Red.colour(1.0));
        assert_eq!(HeatScheme::Red.colour(-1.0), HeatScheme::Red.colour(0.0));
    }

    #[test]
    fn identity_colour_is_deterministic_and_in_range() {
        let a = region_identity_colour(RegionId(25000));
        assert_eq!(a, region_identity_colour(RegionId(25000)));
        assert_ne!(a, region_identity_colour(RegionId(26000)));
        assert_eq!(region_identity_colour(RegionId(100)), Rgb::BLACK);
        assert!(region_identity_colour(RegionId(99_999)).is_white());
    }

    #[test]
    fn name_colour_differs_between_names() {
        assert_eq!(colour_from_name("owls"), colour_from_name("owls"));
        assert_ne!(colour_from_name("owls"), colour_from_name("hawks"));
    }

    #[test]
    fn palette_parses() {
        for hex in VARIABLE_PALETTE {
            assert!(Rgb::from_hex(hex).is_some(), "{hex}");
        }
    }
}
