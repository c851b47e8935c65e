#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]

pub mod accessor;
pub mod asset;
pub mod buffer;
pub mod dict;
pub mod errors;
pub mod export;
mod json;
pub mod mesh;
pub mod scene;
pub mod writer;

pub use accessor::{Accessor, AccessorView, ComponentType, ElementType};
pub use asset::{Asset, AssetMetadata};
pub use buffer::{Buffer, BufferKind, BufferView, BufferViewTarget, EncodedRegion};
pub use dict::{AssetObject, LazyDict, LoadContext, Object, Ref};
pub use errors::{AssetError, Result};
pub use export::{SourceBone, SourceMesh, VertexWeight, export_data, export_meshes};
pub use mesh::{Attributes, Material, Mesh, Primitive, PrimitiveMode, Semantic};
pub use scene::{Node, Scene, Skin};
pub use writer::AssetWriter;
