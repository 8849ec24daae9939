// Color palettes for categorical series and diverging heatmaps

use plotters::style::RGBColor;
use serde::Deserialize;
use std::collections::HashMap;

/// Named categorical palettes selectable from the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaletteName {
    #[default]
    Category10,
    Set2,
}

#[derive(Debug, Clone)]
pub struct ColorPalette {
    colors: Vec<RGBColor>,
}

impl ColorPalette {
    pub fn named(name: PaletteName) -> Self {
        match name {
            PaletteName::Category10 => Self::category10(),
            PaletteName::Set2 => Self::set2(),
        }
    }

    /// D3 / matplotlib "tab10"
    pub fn category10() -> Self {
        Self {
            colors: vec![
                RGBColor(31, 119, 180),
                RGBColor(255, 127, 14),
                RGBColor(44, 160, 44),
                RGBColor(214, 39, 40),
                RGBColor(148, 103, 189),
                RGBColor(140, 86, 75),
                RGBColor(227, 119, 194),
                RGBColor(127, 127, 127),
                RGBColor(188, 189, 34),
                RGBColor(23, 190, 207),
            ],
        }
    }

    /// ColorBrewer Set2
    pub fn set2() -> Self {
        Self {
            colors: vec![
                RGBColor(102, 194, 165),
                RGBColor(252, 141, 98),
                RGBColor(141, 160, 203),
                RGBColor(231, 138, 195),
                RGBColor(166, 216, 84),
                RGBColor(255, 217, 47),
                RGBColor(229, 196, 148),
                RGBColor(179, 179, 179),
            ],
        }
    }

    /// Color for the i-th series, cycling when the palette runs out
    pub fn color(&self, index: usize) -> RGBColor {
        self.colors[index % self.colors.len()]
    }

    /// Stable key -> color mapping in the order given
    pub fn assign_colors(&self, keys: &[String]) -> HashMap<String, RGBColor> {
        keys.iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), self.color(i)))
            .collect()
    }

    pub fn hex_colors(&self, count: usize) -> Vec<String> {
        (0..count).map(|i| to_hex(self.color(i))).collect()
    }
}

const COOL: (f64, f64, f64) = (59.0, 76.0, 192.0);
const NEUTRAL: (f64, f64, f64) = (221.0, 221.0, 221.0);
const WARM: (f64, f64, f64) = (180.0, 4.0, 38.0);

/// Diverging blue-white-red scale over [-1, 1]; NaN maps to mid gray
pub fn coolwarm(value: f64) -> RGBColor {
    if value.is_nan() {
        return RGBColor(160, 160, 160);
    }
    let v = value.clamp(-1.0, 1.0);
    let (from, to, t) = if v < 0.0 {
        (COOL, NEUTRAL, v + 1.0)
    } else {
        (NEUTRAL, WARM, v)
    };
    let lerp = |a: f64, b: f64| (a + (b - a) * t).round() as u8;
    RGBColor(lerp(from.0, to.0), lerp(from.1, to.1), lerp(from.2, to.2))
}

pub fn to_hex(color: RGBColor) -> String {
    format!("#{:02x}{:02x}{:02x}", color.0, color.1, color.2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_cycles() {
        let palette = ColorPalette::set2();
        assert_eq!(palette.color(0), palette.color(8));
    }

    #[test]
    fn test_assign_colors() {
        let keys = vec!["casual".to_string(), "registered".to_string()];
        let map = ColorPalette::category10().assign_colors(&keys);
        assert_eq!(map["casual"], RGBColor(31, 119, 180));
        assert_eq!(map["registered"], RGBColor(255, 127, 14));
    }

    #[test]
    fn test_coolwarm_endpoints() {
        assert_eq!(coolwarm(-1.0), RGBColor(59, 76, 192));
        assert_eq!(coolwarm(0.0), RGBColor(221, 221, 221));
        assert_eq!(coolwarm(1.0), RGBColor(180, 4, 38));
        assert_eq!(coolwarm(7.0), coolwarm(1.0));
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(RGBColor(31, 119, 180)), "#1f77b4");
        assert_eq!(ColorPalette::category10().hex_colors(2), vec!["#1f77b4", "#ff7f0e"]);
    }
}
