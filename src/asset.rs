//! The asset container and load orchestration.
//!
//! [`Asset`] owns every object dictionary plus document-level metadata, and
//! drives loading from both the plain-text form (a JSON document with
//! sibling payload files) and the binary container form (a fixed header,
//! the JSON document, then an embedded binary body).

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::accessor::Accessor;
use crate::buffer::{Buffer, BufferView};
use crate::dict::{AssetObject, LazyDict, LoadContext, Object, Ref};
use crate::errors::{AssetError, Result};
use crate::json::{JsonObject, member_str};
use crate::mesh::{Material, Mesh};
use crate::scene::{Node, Scene, Skin};

/// Magic bytes opening the binary container form.
const BINARY_MAGIC: [u8; 4] = *b"glTF";
/// Fixed size of the binary container header.
const HEADER_LEN: usize = 20;
/// Dictionary id of the embedded binary body buffer.
const BODY_BUFFER_ID: &str = "binary_body";

/// Document-level metadata from the `asset` section. Unknown members are
/// dropped on load.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetMetadata {
    pub version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub generator: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub copyright: String,
}

/// A complete in-memory scene asset.
#[derive(Default)]
pub struct Asset {
    pub metadata: AssetMetadata,
    pub extensions_used: Vec<String>,

    pub buffers: LazyDict<Buffer>,
    pub buffer_views: LazyDict<BufferView>,
    pub accessors: LazyDict<Accessor>,
    pub materials: LazyDict<Material>,
    pub meshes: LazyDict<Mesh>,
    pub nodes: LazyDict<Node>,
    pub skins: LazyDict<Skin>,
    pub scenes: LazyDict<Scene>,

    /// The default scene, when the document names one.
    pub scene: Option<Ref<Scene>>,

    /// Every id ever handed out, across all dictionaries.
    used_ids: FxHashSet<String>,
    /// Directory external buffer URIs resolve against.
    asset_dir: PathBuf,
    /// The embedded body buffer of a binary-container load.
    body_buffer: Option<Ref<Buffer>>,
}

impl Asset {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn asset_dir(&self) -> &Path {
        &self.asset_dir
    }

    /// The embedded binary body buffer, when loaded from the binary form.
    #[must_use]
    pub fn body_buffer(&self) -> Option<Ref<Buffer>> {
        self.body_buffer
    }

    /// Registers `obj` under its current id and returns its ref.
    pub fn add<T: AssetObject>(&mut self, obj: T) -> Ref<T> {
        self.used_ids.insert(obj.id().to_owned());
        let id = obj.id().to_owned();
        T::dict_mut(self).push(obj, id)
    }

    /// Creates a fresh default `T` under `id`. Ids are unique across every
    /// dictionary, not just `T`'s.
    pub fn create<T: AssetObject>(&mut self, id: &str) -> Result<Ref<T>> {
        if self.used_ids.contains(id) {
            return Err(AssetError::DuplicateId { id: id.to_owned() });
        }
        let mut obj = T::default();
        obj.set_id(id.to_owned());
        Ok(self.add(obj))
    }

    /// Derives an id from `base`/`suffix` that no dictionary has handed out
    /// yet: `base`, then `base_suffix`, then `base_suffix_0`, `_1`, ...
    /// An empty base falls back to `suffix` alone.
    #[must_use]
    pub fn find_unique_id(&self, base: &str, suffix: &str) -> String {
        let base = if base.is_empty() { suffix } else { base };
        if !self.used_ids.contains(base) {
            return base.to_owned();
        }
        let candidate = format!("{base}_{suffix}");
        if !self.used_ids.contains(&candidate) {
            return candidate;
        }
        for n in 0.. {
            let candidate = format!("{base}_{suffix}_{n}");
            if !self.used_ids.contains(&candidate) {
                return candidate;
            }
        }
        unreachable!()
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Loads an asset from `path`; `is_binary` selects the container form.
    pub fn load(path: impl AsRef<Path>, is_binary: bool) -> Result<Self> {
        let path = path.as_ref();
        let asset_dir = path.parent().map(Path::to_owned).unwrap_or_default();
        let bytes = std::fs::read(path)?;
        Self::load_from_reader(Cursor::new(bytes), is_binary, asset_dir)
    }

    /// Loads an asset from an arbitrary seekable stream. `asset_dir` is the
    /// directory external buffer URIs resolve against.
    pub fn load_from_reader<R: Read + Seek>(
        mut reader: R,
        is_binary: bool,
        asset_dir: PathBuf,
    ) -> Result<Self> {
        let mut asset = Self {
            asset_dir,
            ..Self::default()
        };

        let (scene_offset, scene_length, body) = if is_binary {
            let header = read_binary_header(&mut reader)?;
            (
                HEADER_LEN as u64,
                header.scene_length,
                Some((header.body_offset, header.body_length)),
            )
        } else {
            let total = reader.seek(SeekFrom::End(0))? as usize;
            (0, total, None)
        };

        if scene_length < 2 {
            return Err(AssetError::NoJsonContent);
        }
        if scene_length as u64 >= u64::from(u32::MAX) {
            return Err(AssetError::JsonTooLarge);
        }

        reader.seek(SeekFrom::Start(scene_offset))?;
        let mut scene_json = vec![0u8; scene_length];
        reader.read_exact(&mut scene_json)?;

        let root: Value = serde_json::from_slice(&scene_json)?;
        let Value::Object(doc) = root else {
            return Err(AssetError::RootNotObject);
        };

        if let Some((body_offset, body_length)) = body
            && body_length > 0
        {
            let mut buffer = Buffer::default();
            buffer.set_id(BODY_BUFFER_ID.to_owned());
            buffer.mark_special();
            buffer.load_from_stream(&mut reader, body_length, body_offset)?;
            asset.body_buffer = Some(asset.add(buffer));
        }

        asset.read_metadata(&doc);
        asset.read_extensions_used(&doc);

        // Everything reachable from the default scene loads lazily through
        // the context; objects no scene references stay untouched.
        let default_scene = {
            let mut ctx = LoadContext::new(&mut asset, &doc);
            match member_str(&doc, "scene") {
                Some(scene_id) => Some(ctx.get::<Scene>(scene_id)?),
                None => None,
            }
        };
        asset.scene = default_scene;

        log::debug!(
            "loaded asset: {} buffers, {} accessors, {} meshes, {} nodes, {} skins",
            asset.buffers.len(),
            asset.accessors.len(),
            asset.meshes.len(),
            asset.nodes.len(),
            asset.skins.len()
        );
        Ok(asset)
    }

    fn read_metadata(&mut self, doc: &JsonObject) {
        // A missing or malformed asset section is tolerated; metadata just
        // stays empty.
        match doc.get("asset") {
            Some(section) => match serde_json::from_value(section.clone()) {
                Ok(meta) => self.metadata = meta,
                Err(err) => log::warn!("ignoring malformed asset metadata: {err}"),
            },
            None => log::warn!("document has no asset metadata section"),
        }
    }

    fn read_extensions_used(&mut self, doc: &JsonObject) {
        if let Some(list) = doc.get("extensionsUsed").and_then(Value::as_array) {
            self.extensions_used = list
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect();
        }
    }
}

/// The decoded 20-byte binary container header.
struct BinaryHeader {
    scene_length: usize,
    body_offset: u64,
    body_length: usize,
}

fn read_binary_header<R: Read>(reader: &mut R) -> Result<BinaryHeader> {
    let mut raw = [0u8; HEADER_LEN];
    reader.read_exact(&mut raw)?;

    if raw[0..4] != BINARY_MAGIC {
        return Err(AssetError::InvalidHeader { reason: "bad magic" });
    }
    let word = |i: usize| u32::from_le_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
    let total_length = word(8) as usize;
    let scene_length = word(12) as usize;
    let scene_format = word(16);
    if scene_format != 0 {
        return Err(AssetError::InvalidHeader {
            reason: "unknown scene format",
        });
    }

    let body_offset = HEADER_LEN + scene_length;
    Ok(BinaryHeader {
        scene_length,
        body_offset: body_offset as u64,
        body_length: total_length.saturating_sub(body_offset),
    })
}
