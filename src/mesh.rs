//! Meshes, primitives, and vertex attribute tables.

use serde_json::Value;
use smallvec::SmallVec;

use crate::accessor::Accessor;
use crate::dict::{AssetObject, LazyDict, LoadContext, Ref, impl_object};
use crate::errors::Result;
use crate::json::{JsonObject, member_str, member_u32};

/// Primitive topology, round-tripped as a numeric code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PrimitiveMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl PrimitiveMode {
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            Self::Points => 0,
            Self::Lines => 1,
            Self::LineLoop => 2,
            Self::LineStrip => 3,
            Self::Triangles => 4,
            Self::TriangleStrip => 5,
            Self::TriangleFan => 6,
        }
    }

    /// Unknown codes fall back to triangles.
    #[must_use]
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Points,
            1 => Self::Lines,
            2 => Self::LineLoop,
            3 => Self::LineStrip,
            5 => Self::TriangleStrip,
            6 => Self::TriangleFan,
            _ => Self::Triangles,
        }
    }
}

/// Opaque material entry: shading parameters pass through untouched.
#[derive(Default)]
pub struct Material {
    id: String,
    name: String,
    pub values: Value,
}

impl_object!(Material);

impl AssetObject for Material {
    const DICT_ID: &'static str = "materials";

    fn dict(asset: &crate::Asset) -> &LazyDict<Self> {
        &asset.materials
    }

    fn dict_mut(asset: &mut crate::Asset) -> &mut LazyDict<Self> {
        &mut asset.materials
    }

    fn read(&mut self, obj: &JsonObject, _ctx: &mut LoadContext<'_, '_>) -> Result<()> {
        self.values = Value::Object(obj.clone());
        Ok(())
    }
}

// ============================================================================
// Attributes
// ============================================================================

/// Recognized attribute semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Semantic {
    Position,
    Normal,
    TexCoord,
    Color,
    Joint,
    JointMatrix,
    Weight,
}

impl Semantic {
    /// Matches a semantic prefix in an attribute key, longest literal first
    /// so `JOINTMATRIX` wins over `JOINT`. Returns the semantic and the
    /// prefix length.
    pub(crate) fn match_prefix(key: &str) -> Option<(Self, usize)> {
        const TABLE: [(&str, Semantic); 7] = [
            ("POSITION", Semantic::Position),
            ("NORMAL", Semantic::Normal),
            ("TEXCOORD", Semantic::TexCoord),
            ("COLOR", Semantic::Color),
            ("JOINTMATRIX", Semantic::JointMatrix),
            ("JOINT", Semantic::Joint),
            ("WEIGHT", Semantic::Weight),
        ];
        TABLE
            .iter()
            .filter(|(lit, _)| key.starts_with(lit))
            .max_by_key(|(lit, _)| lit.len())
            .map(|&(lit, sem)| (sem, lit.len()))
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Position => "POSITION",
            Self::Normal => "NORMAL",
            Self::TexCoord => "TEXCOORD",
            Self::Color => "COLOR",
            Self::Joint => "JOINT",
            Self::JointMatrix => "JOINTMATRIX",
            Self::Weight => "WEIGHT",
        }
    }
}

/// Per-semantic accessor slots; almost always a single set, so inline one.
pub type AccessorList = SmallVec<[Option<Ref<Accessor>>; 1]>;

/// Vertex attribute table of one primitive: per semantic, a numbered list
/// of accessor slots (`TEXCOORD_0`, `TEXCOORD_1`, ...).
#[derive(Default)]
pub struct Attributes {
    pub position: AccessorList,
    pub normal: AccessorList,
    pub texcoord: AccessorList,
    pub color: AccessorList,
    pub joint: AccessorList,
    pub joint_matrix: AccessorList,
    pub weight: AccessorList,
}

impl Attributes {
    #[must_use]
    pub fn list(&self, semantic: Semantic) -> &AccessorList {
        match semantic {
            Semantic::Position => &self.position,
            Semantic::Normal => &self.normal,
            Semantic::TexCoord => &self.texcoord,
            Semantic::Color => &self.color,
            Semantic::Joint => &self.joint,
            Semantic::JointMatrix => &self.joint_matrix,
            Semantic::Weight => &self.weight,
        }
    }

    pub fn list_mut(&mut self, semantic: Semantic) -> &mut AccessorList {
        match semantic {
            Semantic::Position => &mut self.position,
            Semantic::Normal => &mut self.normal,
            Semantic::TexCoord => &mut self.texcoord,
            Semantic::Color => &mut self.color,
            Semantic::Joint => &mut self.joint,
            Semantic::JointMatrix => &mut self.joint_matrix,
            Semantic::Weight => &mut self.weight,
        }
    }

    /// Places `accessor` in the given numbered slot, growing the list with
    /// empty slots as needed.
    pub fn set(&mut self, semantic: Semantic, slot: usize, accessor: Ref<Accessor>) {
        let list = self.list_mut(semantic);
        if list.len() <= slot {
            list.resize(slot + 1, None);
        }
        list[slot] = Some(accessor);
    }
}

/// One drawable part of a mesh.
#[derive(Default)]
pub struct Primitive {
    pub mode: PrimitiveMode,
    pub indices: Option<Ref<Accessor>>,
    pub material: Option<Ref<Material>>,
    pub attributes: Attributes,
}

/// A named collection of primitives.
#[derive(Default)]
pub struct Mesh {
    id: String,
    name: String,
    pub primitives: Vec<Primitive>,
}

impl_object!(Mesh);

impl AssetObject for Mesh {
    const DICT_ID: &'static str = "meshes";

    fn dict(asset: &crate::Asset) -> &LazyDict<Self> {
        &asset.meshes
    }

    fn dict_mut(asset: &mut crate::Asset) -> &mut LazyDict<Self> {
        &mut asset.meshes
    }

    fn read(&mut self, obj: &JsonObject, ctx: &mut LoadContext<'_, '_>) -> Result<()> {
        let Some(primitives) = obj.get("primitives").and_then(Value::as_array) else {
            return Ok(());
        };

        for entry in primitives {
            let Some(entry) = entry.as_object() else {
                continue;
            };
            let mut prim = Primitive {
                mode: PrimitiveMode::from_code(member_u32(entry, "mode").unwrap_or(4)),
                ..Primitive::default()
            };
            if let Some(indices) = member_str(entry, "indices") {
                prim.indices = Some(ctx.get::<Accessor>(indices)?);
            }
            if let Some(material) = member_str(entry, "material") {
                prim.material = Some(ctx.get::<Material>(material)?);
            }

            if let Some(attrs) = entry.get("attributes").and_then(Value::as_object) {
                for (key, value) in attrs {
                    let Some(id) = value.as_str() else {
                        continue;
                    };
                    // Unrecognized semantics are skipped, not an error.
                    let Some((semantic, prefix_len)) = Semantic::match_prefix(key) else {
                        continue;
                    };
                    let slot = parse_slot(&key[prefix_len..]);
                    let accessor = ctx.get::<Accessor>(id)?;
                    prim.attributes.set(semantic, slot, accessor);
                }
            }
            self.primitives.push(prim);
        }
        Ok(())
    }
}

/// Parses the `_N` suffix of an attribute key; anything malformed maps to
/// slot 0.
fn parse_slot(suffix: &str) -> usize {
    suffix
        .strip_prefix('_')
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}
