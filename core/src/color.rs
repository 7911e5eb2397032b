//! Golden-angle colour assignment per pattern name.

use std::{collections::HashMap, fmt};

use serde::{
    ser::{SerializeMap, Serializer},
    Deserialize, Serialize,
};

use crate::Finding;

/// Hue rotation and fixed saturation/lightness used for pattern colours.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Palette {
    pub hue_step: f64,
    pub saturation: f64,
    pub lightness: f64,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            hue_step: 137.5,
            saturation: 70.0,
            lightness: 60.0,
        }
    }
}

/// HSL colour; saturation and lightness are percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub hue: f64,
    pub saturation: f64,
    pub lightness: f64,
}

impl Color {
    /// sRGB components, 0-255.
    pub fn to_rgb(&self) -> (u8, u8, u8) {
        let s = (self.saturation / 100.0).clamp(0.0, 1.0);
        let l = (self.lightness / 100.0).clamp(0.0, 1.0);
        let a = s * l.min(1.0 - l);
        let channel = |n: f64| {
            let k = (n + self.hue / 30.0).rem_euclid(12.0);
            let v = l - a * (k - 3.0).min(9.0 - k).clamp(-1.0, 1.0);
            (v * 255.0).round() as u8
        };
        (channel(0.0), channel(8.0), channel(4.0))
    }

    pub fn to_hex(&self) -> String {
        let (r, g, b) = self.to_rgb();
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hsl({}, {}%, {}%)",
            self.hue, self.saturation, self.lightness
        )
    }
}

/// Ordered pattern-name to colour mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorMap {
    entries: Vec<(String, Color)>,
    lookup: HashMap<String, usize>,
}

impl ColorMap {
    pub fn get(&self, pattern_name: &str) -> Option<Color> {
        self.lookup.get(pattern_name).map(|&idx| self.entries[idx].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Color)> {
        self.entries.iter().map(|(name, color)| (name.as_str(), *color))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ColorMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, color) in &self.entries {
            map.serialize_entry(name, &color.to_string())?;
        }
        map.end()
    }
}

/// Pattern names in first-occurrence order, without repeats.
pub fn unique_pattern_names(findings: &[Finding]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for finding in findings {
        if !names.iter().any(|n| n == &finding.pattern_name) {
            names.push(finding.pattern_name.clone());
        }
    }
    names
}

/// Colours each name by its position: `hue = index * hue_step mod 360`.
pub fn assign_colors(pattern_names: &[String], palette: &Palette) -> ColorMap {
    let mut map = ColorMap::default();
    for name in pattern_names {
        if map.lookup.contains_key(name) {
            continue;
        }
        let idx = map.entries.len();
        let color = Color {
            hue: (idx as f64 * palette.hue_step).rem_euclid(360.0),
            saturation: palette.saturation,
            lightness: palette.lightness,
        };
        map.lookup.insert(name.clone(), idx);
        map.entries.push((name.clone(), color));
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn hues_follow_golden_angle() {
        let map = assign_colors(&names(&["A", "B", "C", "D"]), &Palette::default());
        let hues: Vec<f64> = map.iter().map(|(_, c)| c.hue).collect();
        assert_eq!(hues, vec![0.0, 137.5, 275.0, 52.5]);
        assert_eq!(map.get("B").unwrap().to_string(), "hsl(137.5, 70%, 60%)");
        assert!(map.get("missing").is_none());
    }

    #[test]
    fn same_order_same_colors() {
        let list = names(&["Fear", "Guilt", "Flattery"]);
        let a = assign_colors(&list, &Palette::default());
        let b = assign_colors(&list, &Palette::default());
        assert_eq!(a, b);
    }

    #[test]
    fn hex_conversion_matches_known_values() {
        let red = Color {
            hue: 0.0,
            saturation: 100.0,
            lightness: 50.0,
        };
        assert_eq!(red.to_hex(), "#ff0000");
        let default0 = Color {
            hue: 0.0,
            saturation: 70.0,
            lightness: 60.0,
        };
        assert_eq!(default0.to_hex(), "#e05252");
    }

    #[test]
    fn serializes_in_assignment_order() {
        let map = assign_colors(&names(&["Zed", "Alpha"]), &Palette::default());
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(
            json,
            r#"{"Zed":"hsl(0, 70%, 60%)","Alpha":"hsl(137.5, 70%, 60%)"}"#
        );
    }
}
