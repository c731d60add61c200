//! Turns an image into a Telegram `.attheme` theme: median-cut color sampling, role
//! mapping with contrast checks, and serialization with a validation report.

pub mod color;
pub mod config;
pub mod error;
pub mod mapper;
pub mod pipeline;
pub mod roles;
pub mod sampler;
pub mod serializer;

pub use color::{contrast_ratio, distance, relative_luminance, Color, Hsl};
pub use config::{SamplerConfig, ThemeConfig};
pub use error::{StageFailure, ThemeError};
pub use mapper::{map_roles, Provenance, SourceInfo, ThemeMapping};
pub use pipeline::{generate_theme, GenerationHandle, PipelineEvent, Stage, ThemeGenerator};
pub use roles::RoleKey;
pub use sampler::{decode, sample, Palette, Swatch};
pub use serializer::{serialize, validate, GeneratedTheme, ValidationReport};
