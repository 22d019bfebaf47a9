//! Worksheet styles.
//!
//! [`Styles::default`] is the built-in look. User overrides never mutate it; they are
//! folded in by [`Styles::merged`], which returns a new value.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ConfigError;

/// One named cell style. `None` fields fall back to the style being merged into.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CellStyle {
    pub bold: Option<bool>,
    pub font_size: Option<f64>,
    /// Background fill as six hex digits, e.g. `"F9B381"`.
    pub fill: Option<String>,
    pub center: Option<bool>,
    pub wrap_text: Option<bool>,
    pub bottom_border: Option<bool>,
    pub num_format: Option<String>,
}

impl CellStyle {
    /// Field-wise overlay: values set in `other` win.
    pub fn merged(&self, other: &CellStyle) -> CellStyle {
        CellStyle {
            bold: other.bold.or(self.bold),
            font_size: other.font_size.or(self.font_size),
            fill: other.fill.clone().or_else(|| self.fill.clone()),
            center: other.center.or(self.center),
            wrap_text: other.wrap_text.or(self.wrap_text),
            bottom_border: other.bottom_border.or(self.bottom_border),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
        }
    }

    /// Fill colour as `0xRRGGBB`.
    pub fn fill_rgb(&self) -> Option<u32> {
        self.fill
            .as_deref()
            .and_then(|hex| u32::from_str_radix(hex.trim_start_matches('#'), 16).ok())
    }
}

/// Overrides keyed by style name (`header_even`, `columns_odd`, …).
pub type StyleOverrides = BTreeMap<String, CellStyle>;

/// Styles used when writing a dataset sheet. Even/odd alternate per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Styles {
    pub header_even: CellStyle,
    pub header_odd: CellStyle,
    pub subheader_even: CellStyle,
    pub subheader_odd: CellStyle,
    pub columns_even: CellStyle,
    pub columns_odd: CellStyle,
}

impl Default for Styles {
    fn default() -> Self {
        let header = |fill: &str| CellStyle {
            bold: Some(true),
            font_size: Some(12.0),
            fill: Some(fill.into()),
            center: Some(true),
            wrap_text: Some(true),
            bottom_border: Some(true),
            num_format: None,
        };
        let subheader = |fill: &str| CellStyle {
            font_size: None,
            ..header(fill)
        };
        let columns = |fill: &str| CellStyle {
            fill: Some(fill.into()),
            center: Some(true),
            num_format: Some("0.00".into()),
            ..CellStyle::default()
        };

        Self {
            header_even: header("F9B381"),
            header_odd: header("73A2DB"),
            subheader_even: subheader("FFEAD6"),
            subheader_odd: subheader("DBEDFF"),
            columns_even: columns("FFEAD6"),
            columns_odd: columns("DBEDFF"),
        }
    }
}

impl Styles {
    /// A new `Styles` with `overrides` laid over `self`.
    pub fn merged(&self, overrides: &StyleOverrides) -> Result<Styles, ConfigError> {
        let mut styles = self.clone();
        for (name, style) in overrides {
            if let Some(fill) = &style.fill {
                let hex = fill.trim_start_matches('#');
                if hex.len() != 6 || u32::from_str_radix(hex, 16).is_err() {
                    return Err(ConfigError::InvalidColor(fill.clone()));
                }
            }
            let slot = match name.as_str() {
                "header_even" => &mut styles.header_even,
                "header_odd" => &mut styles.header_odd,
                "subheader_even" => &mut styles.subheader_even,
                "subheader_odd" => &mut styles.subheader_odd,
                "columns_even" => &mut styles.columns_even,
                "columns_odd" => &mut styles.columns_odd,
                other => return Err(ConfigError::UnknownStyle(other.to_string())),
            };
            *slot = slot.merged(style);
        }
        Ok(styles)
    }

    /// Header, sub-header and column styles for the `index`-th sample.
    pub fn for_sample(&self, index: usize) -> (&CellStyle, &CellStyle, &CellStyle) {
        if index % 2 == 0 {
            (&self.header_even, &self.subheader_even, &self.columns_even)
        } else {
            (&self.header_odd, &self.subheader_odd, &self.columns_odd)
        }
    }
}
