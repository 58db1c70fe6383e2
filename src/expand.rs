//! Field expansion - one field plus its resolved value into primitives
//!
//! Each field kind has its own expander. Expansion never performs I/O:
//! image and svg fields yield `Pending` entries naming what must be fetched,
//! and the pipeline turns those into primitives once resources are loaded.
//! Structural problems (bad payloads, missing urls, unsupported
//! sub-elements) therefore surface before the field issues any fetch.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::color::ColorSchemeTable;
use crate::error::{RenderError, Result};
use crate::primitives::{ColorBlock, ImagePlacement, LineStroke, Primitive, SvgPlacement, TextRun};
use crate::resources::{AsyncFetchers, FetchError, Fetchers, ImageResource, VectorGroup};
use crate::templates::{
    ColorSpec, Field, FieldKind, ImageSpec, KeyValListSpec, KeyValTextSpec, LineSpec, MultiImageSpec, Rect,
    SvgSpec, TextSpec, TextStyle,
};

/// A primitive, or the recipe for one that still needs a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Pending {
    Ready(Primitive),
    Image(PendingImage),
    Svg(PendingSvg),
}

impl Pending {
    /// The url this entry must fetch, if any
    pub fn url(&self) -> Option<&str> {
        match self {
            Pending::Ready(_) => None,
            Pending::Image(image) => match &image.source {
                ImageSource::Url(url) => Some(url),
                ImageSource::Inline(_) => None,
            },
            Pending::Svg(svg) => Some(&svg.url),
        }
    }

    /// The primitive, when no fetch is needed
    pub fn into_ready(self) -> Option<Primitive> {
        match self {
            Pending::Ready(primitive) => Some(primitive),
            Pending::Image(image) => match &image.source {
                ImageSource::Inline(resource) => {
                    let resource = resource.clone();
                    Some(Primitive::Image(image.place(resource)))
                }
                ImageSource::Url(_) => None,
            },
            Pending::Svg(_) => None,
        }
    }

    pub fn resolve(self, fetchers: Fetchers<'_>) -> Result<Primitive> {
        match self {
            Pending::Ready(primitive) => Ok(primitive),
            Pending::Image(image) => {
                let resource = match &image.source {
                    ImageSource::Inline(resource) => resource.clone(),
                    ImageSource::Url(url) => fetchers
                        .images
                        .ok_or(FetchError::NotConfigured("image"))
                        .and_then(|f| f.fetch(url))
                        .map_err(|source| image.fetch_failed(source))?,
                };
                Ok(Primitive::Image(image.place(resource)))
            }
            Pending::Svg(svg) => {
                let resource = fetchers
                    .svgs
                    .ok_or(FetchError::NotConfigured("svg"))
                    .and_then(|l| l.load_from_url(&svg.url))
                    .map_err(|source| svg.fetch_failed(source))?;
                Ok(Primitive::Svg(svg.place(resource)))
            }
        }
    }

    pub async fn resolve_async(self, fetchers: AsyncFetchers<'_>) -> Result<Primitive> {
        match self {
            Pending::Ready(primitive) => Ok(primitive),
            Pending::Image(image) => {
                let resource = match &image.source {
                    ImageSource::Inline(resource) => resource.clone(),
                    ImageSource::Url(url) => {
                        let fetcher = fetchers
                            .images
                            .ok_or_else(|| image.fetch_failed(FetchError::NotConfigured("image")))?;
                        fetcher.fetch(url).await.map_err(|source| image.fetch_failed(source))?
                    }
                };
                Ok(Primitive::Image(image.place(resource)))
            }
            Pending::Svg(svg) => {
                let loader = fetchers
                    .svgs
                    .ok_or_else(|| svg.fetch_failed(FetchError::NotConfigured("svg")))?;
                let resource = loader
                    .load_from_url(&svg.url)
                    .await
                    .map_err(|source| svg.fetch_failed(source))?;
                Ok(Primitive::Svg(svg.place(resource)))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Inline(ImageResource),
    Url(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingImage {
    field: String,
    id: String,
    rect: Rect,
    adjust: ImageAdjust,
    source: ImageSource,
}

impl PendingImage {
    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    fn place(self, resource: ImageResource) -> ImagePlacement {
        let ImageAdjust { pan_x, pan_y, zoom_level, rotate, flip_vert, flip_horiz } = self.adjust;
        ImagePlacement {
            x: self.rect.x,
            y: self.rect.y,
            width: self.rect.width,
            height: self.rect.height,
            pan_x,
            pan_y,
            zoom_level,
            rotate,
            flip_vert,
            flip_horiz,
            resource,
            id: self.id,
        }
    }

    fn fetch_failed(&self, source: FetchError) -> RenderError {
        RenderError::ResourceResolution { field: self.field.clone(), source }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingSvg {
    field: String,
    rect: Rect,
    url: String,
}

impl PendingSvg {
    fn place(self, resource: VectorGroup) -> SvgPlacement {
        SvgPlacement {
            x: self.rect.x,
            y: self.rect.y,
            width: self.rect.width,
            height: self.rect.height,
            resource,
        }
    }

    fn fetch_failed(&self, source: FetchError) -> RenderError {
        RenderError::ResourceResolution { field: self.field.clone(), source }
    }
}

/// What every expander sees besides its own spec and value
pub struct ExpandContext<'a> {
    pub field_id: &'a str,
    pub schemes: &'a ColorSchemeTable,
}

impl ExpandContext<'_> {
    fn color(&self, raw: &str) -> Result<String> {
        self.schemes.resolve_color(raw)
    }

    fn decode<T: DeserializeOwned>(&self, value: Value) -> Result<T> {
        serde_json::from_value(value).map_err(|source| RenderError::InvalidValue {
            field: self.field_id.to_string(),
            source,
        })
    }

    fn require(&self, value: Option<Value>) -> Result<Value> {
        value.ok_or_else(|| RenderError::MissingValue(self.field_id.to_string()))
    }

    fn text_run(&self, x: f64, y: f64, style: &TextStyle, text: Option<String>) -> Result<TextRun> {
        Ok(TextRun {
            x,
            y,
            font: style.font.clone(),
            font_family: style.font_family.clone(),
            font_size: style.font_size,
            color: style.color.as_deref().map(|c| self.color(c)).transpose()?,
            text: text.unwrap_or_default(),
            prefix: style.prefix.clone(),
            wrap_at: style.wrap_at,
            text_align: style.text_align.clone(),
        })
    }

    fn fetch_failed(&self, source: FetchError) -> RenderError {
        RenderError::ResourceResolution { field: self.field_id.to_string(), source }
    }
}

/// Expansion strategy of one field kind
pub trait Expand {
    fn expand(&self, cx: &ExpandContext<'_>, value: Option<Value>) -> Result<Vec<Pending>>;
}

/// Expand a field with its resolved value. Color-scheme fields expand to
/// nothing; their palettes are consumed through `schemes`.
pub fn expand(field: &Field, value: Option<Value>, schemes: &ColorSchemeTable) -> Result<Vec<Pending>> {
    let cx = ExpandContext { field_id: &field.id, schemes };

    match &field.kind {
        FieldKind::Color(spec) => spec.expand(&cx, value),
        FieldKind::Line(spec) => spec.expand(&cx, value),
        FieldKind::Text(spec) => spec.expand(&cx, value),
        FieldKind::KeyValText(spec) => spec.expand(&cx, value),
        FieldKind::KeyValList(spec) => spec.expand(&cx, value),
        FieldKind::Image(spec) => spec.expand(&cx, value),
        FieldKind::MultiImage(spec) => spec.expand(&cx, value),
        FieldKind::Svg(spec) => spec.expand(&cx, value),
        FieldKind::ColorScheme => Ok(vec![]),
    }
}

#[derive(Debug, Deserialize)]
struct ColorValue {
    color: String,
}

#[derive(Debug, Default, Deserialize)]
struct TextValue {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeyValValue {
    #[serde(default)]
    key: Option<TextValue>,
    #[serde(default)]
    val: Option<TextValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageAdjust {
    #[serde(default)]
    pan_x: Option<f64>,
    #[serde(default)]
    pan_y: Option<f64>,
    #[serde(default)]
    zoom_level: Option<f64>,
    #[serde(default)]
    rotate: Option<f64>,
    #[serde(default)]
    flip_vert: Option<bool>,
    #[serde(default)]
    flip_horiz: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ImageValue {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    image: Option<ImageResource>,
    #[serde(default)]
    credit: Option<TextValue>,
    #[serde(flatten)]
    adjust: ImageAdjust,
}

#[derive(Debug, Default, Deserialize)]
struct SvgValue {
    #[serde(default)]
    url: Option<String>,
}

impl Expand for ColorSpec {
    fn expand(&self, cx: &ExpandContext<'_>, value: Option<Value>) -> Result<Vec<Pending>> {
        let ColorValue { color } = cx.decode(cx.require(value)?)?;
        let Rect { x, y, width, height } = self.rect;

        Ok(vec![Pending::Ready(Primitive::Color(ColorBlock {
            x,
            y,
            width,
            height,
            color: cx.color(&color)?,
        }))])
    }
}

impl LineSpec {
    fn stroke(&self, cx: &ExpandContext<'_>, y_offset: f64) -> Result<LineStroke> {
        Ok(LineStroke {
            start_x: self.start_x,
            start_y: self.start_y + y_offset,
            end_x: self.end_x,
            end_y: self.end_y + y_offset,
            width: self.width,
            color: self.color.as_deref().map(|c| cx.color(c)).transpose()?,
        })
    }
}

impl Expand for LineSpec {
    fn expand(&self, cx: &ExpandContext<'_>, _value: Option<Value>) -> Result<Vec<Pending>> {
        Ok(vec![Pending::Ready(Primitive::Line(self.stroke(cx, 0.0)?))])
    }
}

impl Expand for TextSpec {
    fn expand(&self, cx: &ExpandContext<'_>, value: Option<Value>) -> Result<Vec<Pending>> {
        let text = match value {
            Some(value) => cx.decode::<TextValue>(value)?.text,
            None => None,
        };
        let run = cx.text_run(self.x, self.y, &self.style, text)?;
        Ok(vec![Pending::Ready(Primitive::Text(run))])
    }
}

impl KeyValTextSpec {
    fn runs(&self, cx: &ExpandContext<'_>, value: KeyValValue, y_offset: f64) -> Result<[Pending; 2]> {
        let y = self.y + y_offset;
        let key = cx.text_run(self.key_x, y, &self.style, value.key.and_then(|k| k.text))?;
        let val = cx.text_run(self.val_x, y, &self.style, value.val.and_then(|v| v.text))?;
        Ok([Pending::Ready(Primitive::Text(key)), Pending::Ready(Primitive::Text(val))])
    }
}

impl Expand for KeyValTextSpec {
    fn expand(&self, cx: &ExpandContext<'_>, value: Option<Value>) -> Result<Vec<Pending>> {
        let value = cx.decode(cx.require(value)?)?;
        Ok(self.runs(cx, value, 0.0)?.into())
    }
}

impl Expand for KeyValListSpec {
    fn expand(&self, cx: &ExpandContext<'_>, value: Option<Value>) -> Result<Vec<Pending>> {
        let lines = self
            .additional_elements
            .iter()
            .map(|element| match element {
                FieldKind::Line(line) => Ok(line),
                other => Err(RenderError::UnsupportedFieldType {
                    field: cx.field_id.to_string(),
                    type_name: other.field_type().to_string(),
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        let entries: Vec<KeyValValue> = match value {
            Some(value) => cx.decode(value)?,
            None => vec![],
        };

        let mut results = Vec::with_capacity(entries.len() * (2 + lines.len()));
        for (i, entry) in entries.into_iter().enumerate() {
            let y_offset = i as f64 * self.y_incr + self.y;
            results.extend(self.key_val_spec.runs(cx, entry, y_offset)?);
            for line in &lines {
                results.push(Pending::Ready(Primitive::Line(line.stroke(cx, y_offset)?)));
            }
        }
        Ok(results)
    }
}

fn pending_image(cx: &ExpandContext<'_>, id: String, rect: Rect, value: ImageValue) -> Result<Pending> {
    let source = match (value.image, value.url) {
        (Some(image), _) => ImageSource::Inline(image),
        (None, Some(url)) => ImageSource::Url(url),
        (None, None) => return Err(cx.fetch_failed(FetchError::NoUrl)),
    };

    Ok(Pending::Image(PendingImage {
        field: cx.field_id.to_string(),
        id,
        rect,
        adjust: value.adjust,
        source,
    }))
}

impl Expand for ImageSpec {
    fn expand(&self, cx: &ExpandContext<'_>, value: Option<Value>) -> Result<Vec<Pending>> {
        let mut value: ImageValue = match value {
            Some(value) => cx.decode(value)?,
            None => ImageValue::default(),
        };

        let mut results = Vec::with_capacity(2);
        if let Some(credit) = &self.credit {
            let text = value.credit.take().and_then(|c| c.text);
            let run = cx.text_run(credit.x, credit.y, &credit.style, text)?;
            results.push(Pending::Ready(Primitive::Text(run)));
        }
        results.push(pending_image(cx, cx.field_id.to_string(), self.rect, value)?);
        Ok(results)
    }
}

impl Expand for MultiImageSpec {
    fn expand(&self, cx: &ExpandContext<'_>, value: Option<Value>) -> Result<Vec<Pending>> {
        let values: Vec<ImageValue> = match value {
            Some(value) => cx.decode(value)?,
            None => vec![],
        };
        if values.is_empty() {
            return Ok(vec![]);
        }

        let specs = self.specs.get(values.len() - 1).ok_or_else(|| {
            RenderError::Lookup(format!(
                "multi-image field `{}` has no layout for {} images",
                cx.field_id,
                values.len()
            ))
        })?;
        if specs.len() != values.len() {
            return Err(RenderError::Lookup(format!(
                "multi-image field `{}` layout for {} images has {} slots",
                cx.field_id,
                values.len(),
                specs.len()
            )));
        }

        specs
            .iter()
            .zip(values)
            .enumerate()
            .map(|(i, (rect, value))| pending_image(cx, format!("{}.{}", cx.field_id, i), *rect, value))
            .collect()
    }
}

impl Expand for SvgSpec {
    fn expand(&self, cx: &ExpandContext<'_>, value: Option<Value>) -> Result<Vec<Pending>> {
        let value: SvgValue = match value {
            Some(value) => cx.decode(value)?,
            None => SvgValue::default(),
        };
        let url = value.url.ok_or_else(|| cx.fetch_failed(FetchError::NoUrl))?;

        Ok(vec![Pending::Svg(PendingSvg {
            field: cx.field_id.to_string(),
            rect: self.rect,
            url,
        })])
    }
}
