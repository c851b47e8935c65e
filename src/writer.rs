//! Serializes an [`Asset`] back to its JSON document plus payload files.

use std::path::Path;

use glam::Mat4;
use serde_json::{Map, Value, json};

use crate::accessor::Accessor;
use crate::asset::Asset;
use crate::buffer::{Buffer, BufferView};
use crate::dict::{LazyDict, Object, Ref};
use crate::errors::{AssetError, Result};
use crate::mesh::{Material, Mesh, Semantic};
use crate::scene::{Node, Scene, Skin};

/// Builds the JSON document for an asset and writes it out alongside one
/// `.bin` payload file per non-empty buffer.
pub struct AssetWriter<'a> {
    asset: &'a Asset,
    doc: Value,
}

impl<'a> AssetWriter<'a> {
    pub fn new(asset: &'a Asset) -> Result<Self> {
        let mut doc = Map::new();

        let mut meta = asset.metadata.clone();
        if meta.version.is_empty() {
            meta.version = "1.0".to_owned();
        }
        doc.insert("asset".into(), serde_json::to_value(&meta)?);

        if !asset.extensions_used.is_empty() {
            doc.insert("extensionsUsed".into(), json!(asset.extensions_used));
        }

        write_section(&mut doc, "buffers", &asset.buffers, |b| {
            Ok(write_buffer(b))
        })?;
        write_section(&mut doc, "bufferViews", &asset.buffer_views, |v| {
            write_view(asset, v)
        })?;
        write_section(&mut doc, "accessors", &asset.accessors, |a| {
            write_accessor(asset, a)
        })?;
        write_section(&mut doc, "materials", &asset.materials, |m| {
            Ok(write_material(m))
        })?;
        write_section(&mut doc, "meshes", &asset.meshes, |m| {
            write_mesh(asset, m)
        })?;
        write_section(&mut doc, "nodes", &asset.nodes, |n| Ok(write_node(asset, n)))?;
        write_section(&mut doc, "skins", &asset.skins, |s| Ok(write_skin(asset, s)))?;
        write_section(&mut doc, "scenes", &asset.scenes, |s| {
            Ok(write_scene(asset, s))
        })?;

        if let Some(scene) = asset.scene {
            doc.insert("scene".into(), asset.scenes[scene].id().into());
        }

        Ok(Self {
            asset,
            doc: Value::Object(doc),
        })
    }

    /// The assembled JSON document.
    #[must_use]
    pub fn document(&self) -> &Value {
        &self.doc
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.doc)?)
    }

    /// Writes the document to `path` and each non-empty buffer's payload
    /// next to it.
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_string()?)?;

        let parent = path.parent().unwrap_or_else(|| Path::new(""));
        for buffer in self.asset.buffers.iter() {
            if buffer.byte_length() == 0 {
                continue;
            }
            std::fs::write(parent.join(buffer.uri()), buffer.raw_data())?;
        }
        Ok(())
    }
}

/// Writes one dictionary as an id-keyed JSON section; empty dictionaries
/// are omitted entirely.
fn write_section<T: Object>(
    doc: &mut Map<String, Value>,
    key: &str,
    dict: &LazyDict<T>,
    mut write: impl FnMut(&T) -> Result<Map<String, Value>>,
) -> Result<()> {
    if dict.is_empty() {
        return Ok(());
    }
    let mut section = Map::new();
    for obj in dict.iter() {
        let mut entry = write(obj)?;
        if !obj.name().is_empty() {
            entry.insert("name".into(), obj.name().into());
        }
        section.insert(obj.id().to_owned(), Value::Object(entry));
    }
    doc.insert(key.into(), Value::Object(section));
    Ok(())
}

fn write_buffer(b: &Buffer) -> Map<String, Value> {
    let mut entry = Map::new();
    entry.insert("byteLength".into(), b.byte_length().into());
    entry.insert("type".into(), b.kind.as_str().into());
    entry.insert("uri".into(), b.uri().into());
    entry
}

fn write_view(asset: &Asset, v: &BufferView) -> Result<Map<String, Value>> {
    let buffer = v.buffer.ok_or(AssetError::UnsetReference { what: "buffer" })?;
    let mut entry = Map::new();
    entry.insert("buffer".into(), asset.buffers[buffer].id().into());
    entry.insert("byteOffset".into(), v.byte_offset.into());
    entry.insert("byteLength".into(), v.byte_length.into());
    if let Some(target) = v.target {
        entry.insert("target".into(), target.code().into());
    }
    Ok(entry)
}

fn write_accessor(asset: &Asset, a: &Accessor) -> Result<Map<String, Value>> {
    let view = a
        .buffer_view
        .ok_or(AssetError::UnsetReference { what: "bufferView" })?;
    let mut entry = Map::new();
    entry.insert("bufferView".into(), asset.buffer_views[view].id().into());
    entry.insert("byteOffset".into(), a.byte_offset.into());
    entry.insert("byteStride".into(), a.byte_stride.into());
    entry.insert("componentType".into(), a.component_type.code().into());
    entry.insert("count".into(), a.count.into());
    entry.insert("type".into(), a.element_type.as_str().into());

    // Integer accessors get integral bounds; float accessors keep them as-is.
    let bounds = |values: &[f64]| -> Value {
        if a.component_type.is_float() {
            json!(values)
        } else {
            json!(values.iter().map(|v| v.round() as i64).collect::<Vec<_>>())
        }
    };
    if !a.min.is_empty() {
        entry.insert("min".into(), bounds(&a.min));
    }
    if !a.max.is_empty() {
        entry.insert("max".into(), bounds(&a.max));
    }
    Ok(entry)
}

fn write_material(m: &Material) -> Map<String, Value> {
    match &m.values {
        Value::Object(obj) => obj.clone(),
        _ => Map::new(),
    }
}

fn write_mesh(asset: &Asset, m: &Mesh) -> Result<Map<String, Value>> {
    let mut primitives = Vec::with_capacity(m.primitives.len());
    for prim in &m.primitives {
        let mut p = Map::new();
        p.insert("mode".into(), prim.mode.code().into());
        if let Some(material) = prim.material {
            p.insert("material".into(), asset.materials[material].id().into());
        }
        if let Some(indices) = prim.indices {
            p.insert("indices".into(), asset.accessors[indices].id().into());
        }

        let mut attrs = Map::new();
        for semantic in [
            Semantic::Position,
            Semantic::Normal,
            Semantic::TexCoord,
            Semantic::Color,
            Semantic::Joint,
            Semantic::JointMatrix,
            Semantic::Weight,
        ] {
            write_attribute_list(asset, &mut attrs, prim, semantic);
        }
        if !attrs.is_empty() {
            p.insert("attributes".into(), Value::Object(attrs));
        }
        primitives.push(Value::Object(p));
    }
    let mut entry = Map::new();
    entry.insert("primitives".into(), Value::Array(primitives));
    Ok(entry)
}

/// Writes one semantic's accessor slots as attribute keys.
///
/// A sole accessor in slot 0 writes the bare semantic name, except
/// `TEXCOORD` which is always numbered; everything else writes
/// `SEMANTIC_<slot>`. Empty slots are skipped.
fn write_attribute_list(
    asset: &Asset,
    attrs: &mut Map<String, Value>,
    prim: &crate::mesh::Primitive,
    semantic: Semantic,
) {
    let list = prim.attributes.list(semantic);
    let force_number = semantic == Semantic::TexCoord;
    for (slot, entry) in list.iter().enumerate() {
        let Some(accessor) = entry else { continue };
        let key = if slot == 0 && list.len() == 1 && !force_number {
            semantic.as_str().to_owned()
        } else {
            format!("{}_{slot}", semantic.as_str())
        };
        attrs.insert(key, asset.accessors[*accessor].id().into());
    }
}

fn write_node(asset: &Asset, n: &Node) -> Map<String, Value> {
    let mut entry = Map::new();
    if let Some(matrix) = n.matrix {
        entry.insert("matrix".into(), mat4_array(matrix));
    } else {
        if let Some(t) = n.translation {
            entry.insert("translation".into(), json!(t.to_array()));
        }
        if let Some(r) = n.rotation {
            entry.insert("rotation".into(), json!(r.to_array()));
        }
        if let Some(s) = n.scale {
            entry.insert("scale".into(), json!(s.to_array()));
        }
    }

    let ids = |nodes: &[Ref<Node>]| -> Value {
        json!(
            nodes
                .iter()
                .map(|&r| asset.nodes[r].id())
                .collect::<Vec<_>>()
        )
    };
    if !n.children.is_empty() {
        entry.insert("children".into(), ids(&n.children));
    }
    if !n.meshes.is_empty() {
        entry.insert(
            "meshes".into(),
            json!(
                n.meshes
                    .iter()
                    .map(|&r| asset.meshes[r].id())
                    .collect::<Vec<_>>()
            ),
        );
    }
    if !n.skeletons.is_empty() {
        entry.insert("skeletons".into(), ids(&n.skeletons));
    }
    if let Some(skin) = n.skin {
        entry.insert("skin".into(), asset.skins[skin].id().into());
    }
    if !n.joint_name.is_empty() {
        entry.insert("jointName".into(), n.joint_name.clone().into());
    }
    entry
}

fn write_skin(asset: &Asset, s: &Skin) -> Map<String, Value> {
    let mut entry = Map::new();
    let joint_names: Vec<&str> = s
        .joint_names
        .iter()
        .map(|&j| asset.nodes[j].joint_name.as_str())
        .collect();
    entry.insert("jointNames".into(), json!(joint_names));
    if let Some(bsm) = s.bind_shape_matrix {
        entry.insert("bindShapeMatrix".into(), mat4_array(bsm));
    }
    if let Some(ibm) = s.inverse_bind_matrices {
        entry.insert(
            "inverseBindMatrices".into(),
            asset.accessors[ibm].id().into(),
        );
    }
    entry
}

fn write_scene(asset: &Asset, s: &Scene) -> Map<String, Value> {
    let mut entry = Map::new();
    entry.insert(
        "nodes".into(),
        json!(
            s.nodes
                .iter()
                .map(|&r| asset.nodes[r].id())
                .collect::<Vec<_>>()
        ),
    );
    entry
}

/// Column-major 16-element array form.
fn mat4_array(m: Mat4) -> Value {
    json!(m.to_cols_array())
}
