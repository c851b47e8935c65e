//! Scene graph: nodes, skins, and scenes.

use glam::{Mat4, Quat, Vec3};

use crate::accessor::Accessor;
use crate::dict::{AssetObject, LazyDict, LoadContext, Ref, impl_object};
use crate::errors::Result;
use crate::json::{JsonObject, member_mat4, member_quat, member_str, member_str_array, member_vec3};
use crate::mesh::Mesh;

/// A scene graph node.
///
/// Local transform is either a whole `matrix` or a TRS triple; both absent
/// means identity. `parent` is derived during load, not read from the
/// document.
#[derive(Default)]
pub struct Node {
    id: String,
    name: String,
    /// Skinning name this node answers to; empty for non-joint nodes.
    pub joint_name: String,
    pub parent: Option<Ref<Node>>,
    pub children: Vec<Ref<Node>>,
    pub meshes: Vec<Ref<Mesh>>,
    pub skin: Option<Ref<Skin>>,
    /// Skeleton roots. Populated by the skin exporter and written out, but
    /// not resolved on load.
    pub skeletons: Vec<Ref<Node>>,
    pub matrix: Option<Mat4>,
    pub translation: Option<Vec3>,
    pub rotation: Option<Quat>,
    pub scale: Option<Vec3>,
}

impl_object!(Node);

impl Node {
    /// Local transform as a single matrix.
    #[must_use]
    pub fn local_matrix(&self) -> Mat4 {
        if let Some(matrix) = self.matrix {
            return matrix;
        }
        Mat4::from_scale_rotation_translation(
            self.scale.unwrap_or(Vec3::ONE),
            self.rotation.unwrap_or(Quat::IDENTITY),
            self.translation.unwrap_or(Vec3::ZERO),
        )
    }
}

impl AssetObject for Node {
    const DICT_ID: &'static str = "nodes";

    fn dict(asset: &crate::Asset) -> &LazyDict<Self> {
        &asset.nodes
    }

    fn dict_mut(asset: &mut crate::Asset) -> &mut LazyDict<Self> {
        &mut asset.nodes
    }

    fn read(&mut self, obj: &JsonObject, ctx: &mut LoadContext<'_, '_>) -> Result<()> {
        for child_id in member_str_array(obj, "children") {
            self.children.push(ctx.get::<Node>(child_id)?);
        }
        for mesh_id in member_str_array(obj, "meshes") {
            self.meshes.push(ctx.get::<Mesh>(mesh_id)?);
        }
        // The skeletons member is export-side output only. Resolving it
        // here could re-enter a node that is still being read (a skeleton
        // root is an ancestor of its joints), so the reader leaves it alone.
        if let Some(skin_id) = member_str(obj, "skin") {
            self.skin = Some(ctx.get::<Skin>(skin_id)?);
        }
        if let Some(joint_name) = member_str(obj, "jointName") {
            self.joint_name = joint_name.to_owned();
        }

        self.matrix = member_mat4(obj, "matrix");
        self.translation = member_vec3(obj, "translation");
        self.rotation = member_quat(obj, "rotation");
        self.scale = member_vec3(obj, "scale");
        Ok(())
    }

    fn post_add(asset: &mut crate::Asset, me: Ref<Self>) {
        // Children already exist (they were resolved during read), so the
        // back-pointers can be wired up here.
        let children = asset.nodes[me].children.clone();
        for child in children {
            asset.nodes[child].parent = Some(me);
        }
    }
}

/// Joint set plus bind-pose data for skinning one or more meshes.
#[derive(Default)]
pub struct Skin {
    id: String,
    name: String,
    pub bind_shape_matrix: Option<Mat4>,
    pub inverse_bind_matrices: Option<Ref<Accessor>>,
    pub joint_names: Vec<Ref<Node>>,
}

impl_object!(Skin);

impl AssetObject for Skin {
    const DICT_ID: &'static str = "skins";

    fn dict(asset: &crate::Asset) -> &LazyDict<Self> {
        &asset.skins
    }

    fn dict_mut(asset: &mut crate::Asset) -> &mut LazyDict<Self> {
        &mut asset.skins
    }

    fn read(&mut self, obj: &JsonObject, ctx: &mut LoadContext<'_, '_>) -> Result<()> {
        self.bind_shape_matrix = member_mat4(obj, "bindShapeMatrix");
        if let Some(ibm) = member_str(obj, "inverseBindMatrices") {
            self.inverse_bind_matrices = Some(ctx.get::<Accessor>(ibm)?);
        }
        // Joint names are node ids by convention.
        for joint in member_str_array(obj, "jointNames") {
            self.joint_names.push(ctx.get::<Node>(joint)?);
        }
        Ok(())
    }
}

/// Root node list of one displayable scene.
#[derive(Default)]
pub struct Scene {
    id: String,
    name: String,
    pub nodes: Vec<Ref<Node>>,
}

impl_object!(Scene);

impl AssetObject for Scene {
    const DICT_ID: &'static str = "scenes";

    fn dict(asset: &crate::Asset) -> &LazyDict<Self> {
        &asset.scenes
    }

    fn dict_mut(asset: &mut crate::Asset) -> &mut LazyDict<Self> {
        &mut asset.scenes
    }

    fn read(&mut self, obj: &JsonObject, ctx: &mut LoadContext<'_, '_>) -> Result<()> {
        for node_id in member_str_array(obj, "nodes") {
            self.nodes.push(ctx.get::<Node>(node_id)?);
        }
        Ok(())
    }
}
