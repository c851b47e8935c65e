//! Export Tests
//!
//! Tests for:
//! - export_data: buffer packing, view/accessor creation, min/max bounds
//! - export_meshes: primitive assembly, shared skin, joint deduplication
//! - Influence capping: first four bones to claim a vertex win
//! - Skeleton root discovery and mesh node wiring

use glam::{Mat4, Vec3, Vec4};
use vellum::{
    Asset, Buffer, ComponentType, ElementType, Node, Scene, Semantic, SourceBone, SourceMesh,
    VertexWeight, export_data, export_meshes,
};

// ============================================================================
// export_data
// ============================================================================

#[test]
fn export_data_packs_and_bounds() {
    let mut asset = Asset::new();
    let buffer = asset.create::<Buffer>("buf").unwrap();

    let data = [
        Vec3::new(1.0, -2.0, 0.5),
        Vec3::new(-1.0, 3.0, 0.0),
        Vec3::new(0.0, 0.0, 2.0),
    ];
    let acc = export_data(
        &mut asset,
        "verts",
        buffer,
        &data,
        ElementType::Vec3,
        ComponentType::F32,
        false,
    )
    .unwrap()
    .unwrap();

    let a = &asset.accessors[acc];
    assert_eq!(a.count, 3);
    assert_eq!(a.element_type, ElementType::Vec3);
    assert_eq!(a.min, vec![-1.0, -2.0, 0.0]);
    assert_eq!(a.max, vec![1.0, 3.0, 2.0]);

    assert_eq!(asset.buffers[buffer].byte_length(), 36);
    let back: Vec<Vec3> = a.extract(&asset.buffer_views, &asset.buffers).unwrap();
    assert_eq!(back, data.to_vec());
}

#[test]
fn export_data_empty_yields_none() {
    let mut asset = Asset::new();
    let buffer = asset.create::<Buffer>("buf").unwrap();
    let none = export_data::<Vec3>(
        &mut asset,
        "verts",
        buffer,
        &[],
        ElementType::Vec3,
        ComponentType::F32,
        false,
    )
    .unwrap();
    assert!(none.is_none());
    assert_eq!(asset.buffers[buffer].byte_length(), 0);
}

#[test]
fn export_data_appends_sequentially() {
    let mut asset = Asset::new();
    let buffer = asset.create::<Buffer>("buf").unwrap();

    let a = export_data(
        &mut asset,
        "m",
        buffer,
        &[1u16, 2],
        ElementType::Scalar,
        ComponentType::U16,
        true,
    )
    .unwrap()
    .unwrap();
    let b = export_data(
        &mut asset,
        "m",
        buffer,
        &[3u16],
        ElementType::Scalar,
        ComponentType::U16,
        true,
    )
    .unwrap()
    .unwrap();

    // Fresh, non-colliding view/accessor ids per call.
    assert_ne!(asset.accessors[a].buffer_view, asset.accessors[b].buffer_view);
    let second_view = asset.accessors[b].buffer_view.unwrap();
    assert_eq!(asset.buffer_views[second_view].byte_offset, 4);
}

// ============================================================================
// export_meshes
// ============================================================================

/// Node chain armature -> hip -> leg, with the armature holding the mesh.
fn skeleton_asset() -> Asset {
    let mut asset = Asset::new();
    let armature = asset.create::<Node>("armature").unwrap();
    let hip = asset.create::<Node>("hip").unwrap();
    let leg = asset.create::<Node>("leg").unwrap();
    asset.nodes[armature].children.push(hip);
    asset.nodes[hip].parent = Some(armature);
    asset.nodes[hip].children.push(leg);
    asset.nodes[leg].parent = Some(hip);

    let scene = asset.create::<Scene>("main").unwrap();
    asset.scenes[scene].nodes.push(armature);
    asset.scene = Some(scene);
    asset
}

fn skinned_mesh(name: &str, bones: Vec<SourceBone>) -> SourceMesh {
    let mut mesh = SourceMesh::new(name);
    mesh.vertex_count = 3;
    mesh.positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
    mesh.indices = vec![0, 1, 2];
    mesh.bones = bones;
    mesh
}

fn bone(name: &str, weights: &[(u32, f32)]) -> SourceBone {
    SourceBone {
        name: name.to_owned(),
        offset_matrix: Mat4::IDENTITY,
        weights: weights
            .iter()
            .map(|&(vertex, weight)| VertexWeight { vertex, weight })
            .collect(),
    }
}

#[test]
fn export_creates_mesh_and_primitive() {
    let mut asset = Asset::new();
    let mut mesh = SourceMesh::new("quad");
    mesh.vertex_count = 3;
    mesh.positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
    mesh.normals = vec![Vec3::Z; 3];
    mesh.indices = vec![0, 1, 2];

    export_meshes(&mut asset, &[mesh]).unwrap();

    assert_eq!(asset.meshes.len(), 1);
    let m = asset.meshes.iter().next().unwrap();
    let prim = &m.primitives[0];
    assert!(prim.attributes.list(Semantic::Position)[0].is_some());
    assert!(prim.attributes.list(Semantic::Normal)[0].is_some());
    let idx = prim.indices.unwrap();
    assert_eq!(asset.accessors[idx].component_type, ComponentType::U16);
    assert!(asset.skins.is_empty());
}

#[test]
fn fifth_influence_is_dropped() {
    let mut asset = skeleton_asset();
    // Five single-weight bones, all targeting vertex 0. Only the first
    // four may land, regardless of weight.
    let influence = [0.25, 0.5, 0.75, 1.0, 0.125];
    let bones: Vec<SourceBone> = influence
        .iter()
        .enumerate()
        .map(|(i, &w)| bone(&format!("bone{i}"), &[(0, w)]))
        .collect();

    export_meshes(&mut asset, &[skinned_mesh("fig", bones)]).unwrap();

    let skin = asset.skins.iter().next().unwrap();
    assert_eq!(skin.joint_names.len(), 5);

    let mesh = asset.meshes.ref_by_id("fig").unwrap();
    let prim = &asset.meshes[mesh].primitives[0];
    let joints = prim.attributes.list(Semantic::Joint)[0].unwrap();
    let weights = prim.attributes.list(Semantic::Weight)[0].unwrap();

    let jd: Vec<Vec4> = asset.accessors[joints]
        .extract(&asset.buffer_views, &asset.buffers)
        .unwrap();
    let wd: Vec<Vec4> = asset.accessors[weights]
        .extract(&asset.buffer_views, &asset.buffers)
        .unwrap();

    // bone4's influence is dropped even though it outweighs bone0's.
    assert_eq!(jd[0], Vec4::new(0.0, 1.0, 2.0, 3.0));
    assert_eq!(wd[0], Vec4::new(0.25, 0.5, 0.75, 1.0));
    // Untouched vertices stay all-zero.
    assert_eq!(wd[1], Vec4::ZERO);
}

#[test]
fn shared_bones_deduplicate_across_meshes() {
    let mut asset = skeleton_asset();
    let meshes = vec![
        skinned_mesh("body", vec![bone("hip", &[(0, 1.0)]), bone("leg", &[(1, 1.0)])]),
        skinned_mesh("cape", vec![bone("hip", &[(2, 1.0)])]),
    ];

    export_meshes(&mut asset, &meshes).unwrap();

    assert_eq!(asset.skins.len(), 1);
    let skin = asset.skins.iter().next().unwrap();
    // "hip" appears in both meshes but occupies one joint slot.
    assert_eq!(skin.joint_names.len(), 2);

    let ibm = skin.inverse_bind_matrices.unwrap();
    let a = &asset.accessors[ibm];
    assert_eq!(a.element_type, ElementType::Mat4);
    assert_eq!(a.count, 2);

    // Both meshes' joint data indexes into the shared table.
    let cape = asset.meshes.ref_by_id("cape").unwrap();
    let prim = &asset.meshes[cape].primitives[0];
    let joints = prim.attributes.list(Semantic::Joint)[0].unwrap();
    let weights = prim.attributes.list(Semantic::Weight)[0].unwrap();
    let jd: Vec<Vec4> = asset.accessors[joints]
        .extract(&asset.buffer_views, &asset.buffers)
        .unwrap();
    let wd: Vec<Vec4> = asset.accessors[weights]
        .extract(&asset.buffer_views, &asset.buffers)
        .unwrap();
    assert_eq!(jd[2].x, 0.0); // hip is joint 0
    assert_eq!(wd[2].x, 1.0);
}

#[test]
fn skeleton_root_is_first_non_joint_ancestor() {
    let mut asset = skeleton_asset();
    let mut mesh = skinned_mesh("fig", vec![bone("leg", &[(0, 1.0)])]);
    mesh.node = Some("armature".to_owned());

    export_meshes(&mut asset, &[mesh]).unwrap();

    // "leg" became a joint; its parent "hip" is not one, so "hip" is the
    // skeleton root recorded on the mesh node.
    let armature = asset.nodes.ref_by_id("armature").unwrap();
    let hip = asset.nodes.ref_by_id("hip").unwrap();
    let leg = asset.nodes.ref_by_id("leg").unwrap();
    assert_eq!(asset.nodes[leg].joint_name, "leg");
    assert!(asset.nodes[hip].joint_name.is_empty());

    let node = &asset.nodes[armature];
    let skin = node.skin.unwrap();
    assert_eq!(asset.skins[skin].joint_names, vec![leg]);
    assert_eq!(node.skeletons, vec![hip]);
    assert_eq!(asset.skins[skin].bind_shape_matrix, Some(Mat4::IDENTITY));
}

#[test]
fn parentless_joint_is_its_own_root() {
    let mut asset = skeleton_asset();
    let mut mesh = skinned_mesh("fig", vec![bone("armature", &[(0, 1.0)])]);
    mesh.node = Some("holder".to_owned());

    export_meshes(&mut asset, &[mesh]).unwrap();

    // The armature joint has no parent, so the walk stops on it.
    let armature = asset.nodes.ref_by_id("armature").unwrap();
    let holder = asset.nodes.ref_by_id("holder").unwrap();
    assert_eq!(asset.nodes[holder].skeletons, vec![armature]);
}

#[test]
fn bone_nodes_are_created_on_demand() {
    let mut asset = Asset::new();
    export_meshes(
        &mut asset,
        &[skinned_mesh("fig", vec![bone("fresh", &[(0, 1.0)])])],
    )
    .unwrap();
    let fresh = asset.nodes.ref_by_id("fresh").unwrap();
    assert_eq!(asset.nodes[fresh].joint_name, "fresh");
}
