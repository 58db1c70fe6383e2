//! Drawing Pipeline - Single Entry Point
//!
//! A render pass:
//! 1. Color schemes are resolved, before any other field.
//! 2. Every other field, in declaration order, is resolved and expanded
//!    into a plan, then its pending images and vector art are fetched.
//!
//! Errors are reported in declaration order: the first failing field wins,
//! whether it failed on its data or on a fetch. The first error aborts the
//! pass. Nothing is returned or painted on error.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::canvas::{CanvasSupplier, DrawingSurface};
use crate::card::Card;
use crate::color::{self, ColorSchemeTable};
use crate::config::RenderConfig;
use crate::editor::CardEditor;
use crate::error::{RenderError, Result};
use crate::expand::{self, Pending};
use crate::hashing;
use crate::primitives::Primitive;
use crate::resolver;
use crate::resources::{AsyncFetchers, AsyncImageFetcher, AsyncSvgLoader, Fetchers};
use crate::templates::{Field, FieldId, FieldType, Template, TemplateSupplier};
use crate::ENGINE_VERSION;

/// State of one render pass. Lives exactly as long as one build.
pub struct RenderSession<'a> {
    template: &'a Template,
    card: &'a Card,
    schemes: ColorSchemeTable,
}

impl<'a> RenderSession<'a> {
    /// Start a pass: resolve every color scheme up front.
    pub fn open(template: &'a Template, card: &'a Card) -> Result<Self> {
        let scheme_fields = template
            .fields
            .iter()
            .filter(|f| f.field_type() == FieldType::ColorScheme);
        let schemes = color::build_schemes(scheme_fields, card)?;

        Ok(Self { template, card, schemes })
    }

    pub fn schemes(&self) -> &ColorSchemeTable {
        &self.schemes
    }

    fn drawable_fields(&self) -> impl Iterator<Item = &'a Field> {
        self.template
            .fields
            .iter()
            .filter(|f| f.field_type() != FieldType::ColorScheme)
    }

    /// Resolve and expand one field
    pub fn plan_field(&self, field: &Field) -> Result<FieldPlan> {
        let value = resolver::resolve(field, self.card)?;
        let pending = expand::expand(field, value, &self.schemes)?;
        let plan = FieldPlan { field: field.id.clone(), pending };
        debug!(
            field = %field.id,
            kind = %field.field_type(),
            entries = plan.pending.len(),
            fetches = plan.fetch_count(),
            "planned field"
        );
        Ok(plan)
    }

    /// Plan one field and fetch what it needs through blocking collaborators
    pub fn render_field(&self, field: &Field, fetchers: Fetchers<'_>) -> Result<Vec<Primitive>> {
        self.plan_field(field)?.resolve(fetchers)
    }

    /// Plan one field and fetch what it needs, one fetch at a time
    pub async fn render_field_async(&self, field: &Field, fetchers: AsyncFetchers<'_>) -> Result<Vec<Primitive>> {
        self.plan_field(field)?.resolve_async(fetchers).await
    }
}

/// Expansion of one field, possibly waiting on resources
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPlan {
    pub field: FieldId,
    pub pending: Vec<Pending>,
}

impl FieldPlan {
    pub fn fetch_count(&self) -> usize {
        self.pending.iter().filter(|p| p.url().is_some()).count()
    }

    pub fn resolve(self, fetchers: Fetchers<'_>) -> Result<Vec<Primitive>> {
        self.pending.into_iter().map(|p| p.resolve(fetchers)).collect()
    }

    /// A field's own fetches run one after another
    pub async fn resolve_async(self, fetchers: AsyncFetchers<'_>) -> Result<Vec<Primitive>> {
        let mut primitives = Vec::with_capacity(self.pending.len());
        for pending in self.pending {
            primitives.push(pending.resolve_async(fetchers).await?);
        }
        Ok(primitives)
    }
}

/// Build the ordered instruction list without suspending. Fetches, if any,
/// go through the blocking collaborators one at a time.
#[instrument(skip_all, fields(template = %card.template_name))]
pub fn build(template: &Template, card: &Card, fetchers: Fetchers<'_>) -> Result<Vec<Primitive>> {
    let session = RenderSession::open(template, card)?;

    let mut instructions = Vec::new();
    for field in session.drawable_fields() {
        instructions.extend(session.render_field(field, fetchers)?);
    }
    info!(instructions = instructions.len(), "built drawing data");
    Ok(instructions)
}

/// Build the ordered instruction list, working on up to `limit` fields at
/// once. Output and error order are declaration order whatever order the
/// fetches finish in. Fields after a failure are never started.
#[instrument(skip_all, fields(template = %card.template_name, limit = limit))]
pub async fn build_async(
    template: &Template,
    card: &Card,
    fetchers: AsyncFetchers<'_>,
    limit: usize,
) -> Result<Vec<Primitive>> {
    let session = RenderSession::open(template, card)?;
    debug!(schemes = session.schemes().len(), "resolving fields");

    let groups: Vec<Vec<Primitive>> = stream::iter(session.drawable_fields())
        .map(|field| session.render_field_async(field, fetchers))
        .buffered(limit.max(1))
        .try_collect()
        .await?;

    let instructions: Vec<Primitive> = groups.into_iter().flatten().collect();
    info!(instructions = instructions.len(), "built drawing data");
    Ok(instructions)
}

/// Output of a render pass, with enough metadata to audit or cache it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingManifest {
    pub pass_id: Uuid,
    pub template_name: String,
    pub engine_version: String,
    pub rendered_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub fingerprint: String,
    pub instructions: Vec<Primitive>,
}

impl DrawingManifest {
    pub fn new(template_name: &str, template: &Template, instructions: Vec<Primitive>) -> Result<Self> {
        Ok(Self {
            pass_id: Uuid::new_v4(),
            template_name: template_name.to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            rendered_at: Utc::now(),
            width: template.width,
            height: template.height,
            fingerprint: hashing::fingerprint(&instructions)?,
            instructions,
        })
    }
}

/// A painted surface and what was painted on it
pub struct RenderedCard {
    pub surface: Box<dyn DrawingSurface>,
    pub manifest: DrawingManifest,
}

/// Front door for rendering cards: owns the collaborators a render pass
/// needs and hands out one `RenderSession` per call.
pub struct Renderer {
    templates: Option<Arc<dyn TemplateSupplier>>,
    canvases: Option<Arc<dyn CanvasSupplier>>,
    images: Option<Arc<dyn AsyncImageFetcher>>,
    svgs: Option<Arc<dyn AsyncSvgLoader>>,
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            templates: None,
            canvases: None,
            images: None,
            svgs: None,
            config,
        }
    }

    pub fn with_template_supplier(mut self, supplier: Arc<dyn TemplateSupplier>) -> Self {
        self.templates = Some(supplier);
        self
    }

    pub fn with_canvas_supplier(mut self, supplier: Arc<dyn CanvasSupplier>) -> Self {
        self.canvases = Some(supplier);
        self
    }

    pub fn with_image_fetcher(mut self, fetcher: Arc<dyn AsyncImageFetcher>) -> Self {
        self.images = Some(fetcher);
        self
    }

    pub fn with_svg_loader(mut self, loader: Arc<dyn AsyncSvgLoader>) -> Self {
        self.svgs = Some(loader);
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// The template a card is drawn with
    pub fn template_for(&self, card: &Card) -> Result<Arc<Template>> {
        let supplier = self
            .templates
            .as_ref()
            .ok_or_else(|| RenderError::Configuration("Template supplier not set".into()))?;
        let template = supplier.supply(&card.template_name)?;

        if self.config.check_engine_version {
            template.check_engine_version(ENGINE_VERSION)?;
        }
        Ok(template)
    }

    fn fetchers(&self) -> AsyncFetchers<'_> {
        AsyncFetchers {
            images: self.images.as_deref(),
            svgs: self.svgs.as_deref(),
        }
    }

    /// Build the card's instruction list
    pub async fn build(&self, card: &Card) -> Result<Vec<Primitive>> {
        let template = self.template_for(card)?;
        build_async(&template, card, self.fetchers(), self.config.fetch_limit()).await
    }

    /// Build the card's instruction list and wrap it in a manifest
    pub async fn compile(&self, card: &Card) -> Result<DrawingManifest> {
        let template = self.template_for(card)?;
        let instructions = build_async(&template, card, self.fetchers(), self.config.fetch_limit()).await?;
        DrawingManifest::new(&card.template_name, &template, instructions)
    }

    /// Build, then paint onto a fresh surface sized from the template. The
    /// surface is only requested once the instruction list is complete.
    pub async fn draw(&self, card: &Card) -> Result<RenderedCard> {
        let canvases = self
            .canvases
            .clone()
            .ok_or_else(|| RenderError::Configuration("Canvas supplier not set".into()))?;

        let manifest = self.compile(card).await?;
        let mut surface = canvases.supply(manifest.width, manifest.height);
        for instruction in &manifest.instructions {
            surface.paint(instruction);
        }
        debug!(pass = %manifest.pass_id, painted = manifest.instructions.len(), "painted surface");

        Ok(RenderedCard { surface, manifest })
    }

    /// Open an editor over the card and its template
    pub fn editor(&self, card: Card) -> Result<CardEditor> {
        let template = self.template_for(&card)?;
        Ok(CardEditor::new(card, template))
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(RenderConfig::default())
    }
}
