//! Mesh and skin export.
//!
//! Turns source-side mesh data ([`SourceMesh`]) into asset objects: vertex
//! and index data packed into a shared buffer behind fresh
//! view/accessor pairs, plus one shared [`Skin`] covering every bone any
//! exported mesh references.

use bytemuck::Pod;
use glam::{Mat4, Vec3, Vec4};

use crate::accessor::{Accessor, ComponentType, ElementType};
use crate::asset::Asset;
use crate::buffer::{Buffer, BufferView, BufferViewTarget};
use crate::dict::{Object, Ref};
use crate::errors::Result;
use crate::mesh::{Mesh, Primitive, Semantic};
use crate::scene::{Node, Skin};

/// One bone's influence on one vertex.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexWeight {
    pub vertex: u32,
    pub weight: f32,
}

/// A source-side bone: a node name, its inverse bind matrix, and its
/// vertex influences.
pub struct SourceBone {
    pub name: String,
    pub offset_matrix: Mat4,
    pub weights: Vec<VertexWeight>,
}

/// Source-side mesh data to export.
#[derive(Default)]
pub struct SourceMesh {
    pub name: String,
    /// Id of the scene node instantiating this mesh, when the host scene
    /// places it; the node is created if it does not exist yet.
    pub node: Option<String>,
    pub vertex_count: usize,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u16>,
    pub bones: Vec<SourceBone>,
}

impl SourceMesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Appends `data` to `buffer` and wraps it in a fresh view/accessor pair.
///
/// Returns `None` for empty data. The accessor's min/max are computed
/// per component over all elements.
pub fn export_data<T: Pod>(
    asset: &mut Asset,
    base_id: &str,
    buffer: Ref<Buffer>,
    data: &[T],
    element_type: ElementType,
    component_type: ComponentType,
    is_indices: bool,
) -> Result<Option<Ref<Accessor>>> {
    if data.is_empty() {
        return Ok(None);
    }

    let bytes: &[u8] = bytemuck::cast_slice(data);
    let offset = asset.buffers[buffer].append_data(bytes);

    let view_id = asset.find_unique_id(base_id, "view");
    let view = asset.create::<BufferView>(&view_id)?;
    {
        let v = &mut asset.buffer_views[view];
        v.buffer = Some(buffer);
        v.byte_offset = offset;
        v.byte_length = bytes.len();
        v.target = Some(if is_indices {
            BufferViewTarget::ElementArrayBuffer
        } else {
            BufferViewTarget::ArrayBuffer
        });
    }

    let (min, max) = component_bounds(bytes, element_type, component_type);
    let accessor_id = asset.find_unique_id(base_id, "accessor");
    let accessor = asset.create::<Accessor>(&accessor_id)?;
    {
        let a = &mut asset.accessors[accessor];
        a.buffer_view = Some(view);
        a.byte_offset = 0;
        a.byte_stride = 0;
        a.component_type = component_type;
        a.count = data.len() as u32;
        a.element_type = element_type;
        a.min = min;
        a.max = max;
    }
    Ok(Some(accessor))
}

/// Per-component min/max over tightly-packed element bytes.
fn component_bounds(
    bytes: &[u8],
    element_type: ElementType,
    component_type: ComponentType,
) -> (Vec<f64>, Vec<f64>) {
    let comps = element_type.component_count();
    let comp_size = component_type.size();
    let elem_size = comps * comp_size;
    let count = bytes.len() / elem_size;

    let mut min = vec![f64::INFINITY; comps];
    let mut max = vec![f64::NEG_INFINITY; comps];
    for i in 0..count {
        for c in 0..comps {
            let at = i * elem_size + c * comp_size;
            let v = component_as_f64(&bytes[at..at + comp_size], component_type);
            if v < min[c] {
                min[c] = v;
            }
            if v > max[c] {
                max[c] = v;
            }
        }
    }
    (min, max)
}

fn component_as_f64(raw: &[u8], component_type: ComponentType) -> f64 {
    match component_type {
        ComponentType::I8 => f64::from(raw[0] as i8),
        ComponentType::U8 => f64::from(raw[0]),
        ComponentType::I16 => f64::from(i16::from_le_bytes([raw[0], raw[1]])),
        ComponentType::U16 => f64::from(u16::from_le_bytes([raw[0], raw[1]])),
        ComponentType::U32 => f64::from(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
        ComponentType::F32 => f64::from(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
    }
}

/// Exports every source mesh into `asset`, sharing one buffer and (when
/// any mesh is skinned) one skin.
pub fn export_meshes(asset: &mut Asset, meshes: &[SourceMesh]) -> Result<()> {
    let buffer = match asset.body_buffer() {
        Some(b) => b,
        None => {
            let id = asset.find_unique_id("buffer", "buffer");
            asset.create::<Buffer>(&id)?
        }
    };

    let mut skin_state = if meshes.iter().any(|m| !m.bones.is_empty()) {
        let skin_id = asset.find_unique_id("skin", "skin");
        let skin = asset.create::<Skin>(&skin_id)?;
        asset.skins[skin].set_name(skin_id);
        Some(SkinExport {
            skin,
            inverse_bind_matrices: Vec::new(),
        })
    } else {
        None
    };

    let mut first_mesh = None;
    for source in meshes {
        let mesh_id = asset.find_unique_id(&source.name, "mesh");
        let mesh = asset.create::<Mesh>(&mesh_id)?;
        asset.meshes[mesh].set_name(source.name.clone());
        first_mesh.get_or_insert(mesh);

        if let Some(node_id) = &source.node {
            let node = node_by_id_or_create(asset, node_id)?;
            asset.nodes[node].meshes.push(mesh);
        }

        let mut prim = Primitive::default();
        if let Some(acc) = export_data(
            asset,
            &mesh_id,
            buffer,
            &source.positions,
            ElementType::Vec3,
            ComponentType::F32,
            false,
        )? {
            prim.attributes.set(Semantic::Position, 0, acc);
        }
        if let Some(acc) = export_data(
            asset,
            &mesh_id,
            buffer,
            &source.normals,
            ElementType::Vec3,
            ComponentType::F32,
            false,
        )? {
            prim.attributes.set(Semantic::Normal, 0, acc);
        }
        prim.indices = export_data(
            asset,
            &mesh_id,
            buffer,
            &source.indices,
            ElementType::Scalar,
            ComponentType::U16,
            true,
        )?;

        if let Some(state) = skin_state.as_mut()
            && !source.bones.is_empty()
        {
            export_skin(asset, source, &mut prim, buffer, state)?;
        }
        asset.meshes[mesh].primitives.push(prim);
    }

    if let Some(state) = skin_state {
        finish_skin(asset, buffer, state, first_mesh)?;
    }
    Ok(())
}

/// Shared-skin accumulator across the meshes of one export call.
struct SkinExport {
    skin: Ref<Skin>,
    /// One matrix per joint, parallel to the skin's joint list.
    inverse_bind_matrices: Vec<Mat4>,
}

/// Folds one mesh's bones into the shared skin and attaches per-vertex
/// joint/weight accessors to `prim`.
///
/// A vertex keeps at most four influences: the first four bones that claim
/// it win, later ones are dropped.
fn export_skin(
    asset: &mut Asset,
    source: &SourceMesh,
    prim: &mut Primitive,
    buffer: Ref<Buffer>,
    state: &mut SkinExport,
) -> Result<()> {
    let vertex_count = source.vertex_count;
    let mut joint_data = vec![Vec4::ZERO; vertex_count];
    let mut weight_data = vec![Vec4::ZERO; vertex_count];
    let mut influences = vec![0u8; vertex_count];

    for bone in &source.bones {
        let node = node_by_id_or_create(asset, &bone.name)?;

        // Joints answer to their node id; a bone shared between meshes
        // maps onto the same skin slot.
        let joint_name = asset.nodes[node].id().to_owned();
        asset.nodes[node].joint_name = joint_name;

        let joint_index = {
            let skin = &asset.skins[state.skin];
            skin.joint_names.iter().position(|&j| j == node)
        };
        let joint_index = match joint_index {
            Some(i) => i,
            None => {
                let skin = &mut asset.skins[state.skin];
                skin.joint_names.push(node);
                state.inverse_bind_matrices.push(bone.offset_matrix);
                skin.joint_names.len() - 1
            }
        };

        for vw in &bone.weights {
            let v = vw.vertex as usize;
            if v >= vertex_count {
                continue;
            }
            let slot = influences[v] as usize;
            if slot >= 4 {
                continue;
            }
            joint_data[v][slot] = joint_index as f32;
            weight_data[v][slot] = vw.weight;
            influences[v] += 1;
        }
    }

    let base = format!("{}_skin", source.name);
    if let Some(acc) = export_data(
        asset,
        &base,
        buffer,
        &joint_data,
        ElementType::Vec4,
        ComponentType::F32,
        false,
    )? {
        prim.attributes.set(Semantic::Joint, 0, acc);
    }
    if let Some(acc) = export_data(
        asset,
        &base,
        buffer,
        &weight_data,
        ElementType::Vec4,
        ComponentType::F32,
        false,
    )? {
        prim.attributes.set(Semantic::Weight, 0, acc);
    }
    Ok(())
}

/// Writes the skin's bind-pose data and wires the skin onto the node that
/// instantiates the first exported mesh.
fn finish_skin(
    asset: &mut Asset,
    buffer: Ref<Buffer>,
    state: SkinExport,
    first_mesh: Option<Ref<Mesh>>,
) -> Result<()> {
    let ibm = export_data(
        asset,
        "inverseBindMatrices",
        buffer,
        &state.inverse_bind_matrices,
        ElementType::Mat4,
        ComponentType::F32,
        false,
    )?;
    {
        let skin = &mut asset.skins[state.skin];
        skin.inverse_bind_matrices = ibm;
        skin.bind_shape_matrix = Some(Mat4::IDENTITY);
    }

    let Some(mesh) = first_mesh else {
        return Ok(());
    };
    let Some(mesh_node) = find_mesh_node(asset, mesh) else {
        return Ok(());
    };
    let root = find_skeleton_root(asset, state.skin);

    let node = &mut asset.nodes[mesh_node];
    node.skin = Some(state.skin);
    if let Some(root) = root {
        node.skeletons.push(root);
    }
    Ok(())
}

fn node_by_id_or_create(asset: &mut Asset, id: &str) -> Result<Ref<Node>> {
    match asset.nodes.ref_by_id(id) {
        Some(r) => Ok(r),
        None => asset.create::<Node>(id),
    }
}

/// Depth-first search for the node instantiating `mesh`.
fn find_mesh_node(asset: &Asset, mesh: Ref<Mesh>) -> Option<Ref<Node>> {
    fn walk(asset: &Asset, node: Ref<Node>, mesh: Ref<Mesh>) -> Option<Ref<Node>> {
        if asset.nodes[node].meshes.contains(&mesh) {
            return Some(node);
        }
        asset.nodes[node]
            .children
            .iter()
            .find_map(|&child| walk(asset, child, mesh))
    }
    asset
        .nodes
        .iter_refs()
        .find_map(|(r, _)| walk(asset, r, mesh))
}

/// Walks up from the skin's first joint to the first ancestor that is not
/// itself a joint; a parentless joint is its own root.
fn find_skeleton_root(asset: &Asset, skin: Ref<Skin>) -> Option<Ref<Node>> {
    let mut current = *asset.skins[skin].joint_names.first()?;
    loop {
        let Some(parent) = asset.nodes[current].parent else {
            return Some(current);
        };
        if asset.nodes[parent].joint_name.is_empty() {
            return Some(parent);
        }
        current = parent;
    }
}
