//! Length values with their source-markup units.

use serde::{Deserialize, Serialize};

/// Pixels per centimeter assumed when converting pixel lengths to the
/// target schema's native unit.
pub const PX_PER_CM: f64 = 44.173513561;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    Px,
    Cm,
    Pt,
    #[serde(rename = "%")]
    Percent,
}

impl LengthUnit {
    pub fn suffix(self) -> &'static str {
        match self {
            LengthUnit::Px => "px",
            LengthUnit::Cm => "cm",
            LengthUnit::Pt => "pt",
            LengthUnit::Percent => "%",
        }
    }
}

/// A numeric value paired with a unit, e.g. `4cm`, `50%`, `120px`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Length {
    pub value: f64,
    pub unit: LengthUnit,
}

impl Length {
    pub fn new(value: f64, unit: LengthUnit) -> Self {
        Length { value, unit }
    }

    pub fn px(value: f64) -> Self {
        Length::new(value, LengthUnit::Px)
    }

    pub fn percent(value: f64) -> Self {
        Length::new(value, LengthUnit::Percent)
    }

    /// Converts this length to centimeters using the given pixel ratio.
    /// Percentages have no absolute equivalent and return `None`.
    pub fn to_cm(self, px_per_cm: f64) -> Option<f64> {
        match self.unit {
            LengthUnit::Cm => Some(self.value),
            LengthUnit::Px => Some(self.value / px_per_cm),
            // 1pt = 1/28.35 cm
            LengthUnit::Pt => Some(self.value / 28.35),
            LengthUnit::Percent => None,
        }
    }
}

impl std::fmt::Display for Length {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", format_number(self.value, 3), self.unit.suffix())
    }
}

/// Formats a number with at most `precision` decimals, trimming trailing
/// zeros (and the decimal point itself when nothing remains behind it).
pub fn format_number(value: f64, precision: usize) -> String {
    let mut s = format!("{value:.precision$}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}
