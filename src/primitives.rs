//! Primitive drawing instructions - the renderer-facing output
//!
//! Every reference is resolved by the time a primitive exists: colors are
//! literal, resources are loaded, geometry is absolute.

use serde::{Deserialize, Serialize};

use crate::resources::{ImageResource, VectorGroup};
use crate::templates::TextAlign;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Primitive {
    Color(ColorBlock),
    Line(LineStroke),
    Text(TextRun),
    Image(ImagePlacement),
    Svg(SvgPlacement),
}

impl Primitive {
    pub fn kind(&self) -> &'static str {
        match self {
            Primitive::Color(_) => "color",
            Primitive::Line(_) => "line",
            Primitive::Text(_) => "text",
            Primitive::Image(_) => "image",
            Primitive::Svg(_) => "svg",
        }
    }

    pub fn as_text(&self) -> Option<&TextRun> {
        match self {
            Primitive::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_line(&self) -> Option<&LineStroke> {
        match self {
            Primitive::Line(line) => Some(line),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImagePlacement> {
        match self {
            Primitive::Image(image) => Some(image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorBlock {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineStroke {
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
    pub width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRun {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap_at: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_align: Option<TextAlign>,
}

impl TextRun {
    /// The string a renderer paints: prefix followed by the text
    pub fn display_text(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, self.text),
            None => self.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePlacement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flip_vert: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flip_horiz: Option<bool>,
    pub resource: ImageResource,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvgPlacement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub resource: VectorGroup,
}
