//! CardForge Core - Drawing-Data Compiler
//!
//! Turns a card template plus sparse card data into an ordered list of
//! drawing primitives (color blocks, lines, text runs, images, vector art).
//!
//! # Ground Rules
//! 1. Templates Are Contracts: field order is drawing order
//! 2. User data beats card defaults beats field defaults
//! 3. Colors may name a scheme entry as `$scheme.key`
//! 4. One failure aborts the whole pass
//! 5. Identical input yields an identical instruction list

pub mod canvas;
pub mod card;
pub mod color;
pub mod config;
pub mod editor;
pub mod error;
pub mod expand;
pub mod hashing;
pub mod pipeline;
pub mod primitives;
pub mod resolver;
pub mod resources;
pub mod templates;

pub use canvas::{CanvasSupplier, DrawingSurface, RecordingCanvasSupplier, RecordingSurface};
pub use card::{Card, ChoiceIndex, DataEntry};
pub use color::{resolve_color, ColorSchemeTable};
pub use config::RenderConfig;
pub use editor::CardEditor;
pub use error::{RenderError, Result};
pub use hashing::{canonical_json, fingerprint};
pub use pipeline::{build, build_async, DrawingManifest, RenderSession, RenderedCard, Renderer};
pub use primitives::Primitive;
pub use resolver::{resolve_choice, DataSource};
pub use resources::{
    AsyncImageFetcher, AsyncSvgLoader, Blocking, FetchError, FileResources, ImageFetcher,
    ImageResource, SvgLoader, VectorGroup,
};
pub use templates::{Field, FieldKind, FieldType, Template, TemplateRegistry, TemplateSupplier};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
