//! Identity and lazy-resolution machinery.
//!
//! Every top-level entity is owned by a [`LazyDict`], an insertion-ordered
//! arena with an id lookup map. Cross-entity references are [`Ref`] values —
//! plain indices into the owning dictionary, never pointers — so a reference
//! can be created before its target is materialized and can never dangle
//! across buffer reallocation.
//!
//! During a load, a [`LoadContext`] borrows the parsed JSON document; it is
//! the "attached" state of all dictionaries at once. Resolving an id that is
//! not yet materialized parses it from the document on the spot. Dropping the
//! context detaches everything: the [`crate::Asset`] itself holds nothing
//! that points into the parse buffer.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

use crate::asset::Asset;
use crate::errors::{AssetError, Result};
use crate::json::JsonObject;

// ============================================================================
// Ref
// ============================================================================

/// A non-owning handle into a [`LazyDict`].
///
/// Two refs compare equal when they carry the same dense index; comparing
/// refs from different dictionaries of the same type is meaningless.
pub struct Ref<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Ref<T> {
    pub(crate) fn new(index: u32) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// The dense index of the referenced object within its dictionary.
    #[inline]
    #[must_use]
    pub fn index(self) -> u32 {
        self.index
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Ref<T> {}

impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Ref<T> {}

impl<T> Hash for Ref<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref({})", self.index)
    }
}

// ============================================================================
// Object traits
// ============================================================================

/// Common identity of every dictionary-owned entity: a globally unique `id`
/// and a display-only `name`.
pub trait Object {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn set_name(&mut self, name: String);
}

macro_rules! impl_object {
    ($ty:ty) => {
        impl $crate::dict::Object for $ty {
            fn id(&self) -> &str {
                &self.id
            }
            fn name(&self) -> &str {
                &self.name
            }
            fn set_id(&mut self, id: String) {
                self.id = id;
            }
            fn set_name(&mut self, name: String) {
                self.name = name;
            }
        }
    };
}

pub(crate) use impl_object;

/// A dictionary-owned entity type: names its backing JSON section and knows
/// how to populate itself from a section entry.
pub trait AssetObject: Object + Default + Sized {
    /// Name of the document section holding this type's objects.
    const DICT_ID: &'static str;

    /// When set, the section lives under `extensions.<EXT_ID>` instead of
    /// the document root.
    const EXT_ID: Option<&'static str> = None;

    fn dict(asset: &Asset) -> &LazyDict<Self>;
    fn dict_mut(asset: &mut Asset) -> &mut LazyDict<Self>;

    /// Populates `self` from its JSON object. `id` and `name` are already
    /// set when this runs.
    fn read(&mut self, obj: &JsonObject, ctx: &mut LoadContext<'_, '_>) -> Result<()>;

    /// Runs after the object has been registered; `me` is its new ref.
    fn post_add(_asset: &mut Asset, _me: Ref<Self>) {}
}

// ============================================================================
// LazyDict
// ============================================================================

/// The owning collection for one entity type: an insertion-ordered arena
/// plus an id→index map.
pub struct LazyDict<T> {
    objs: Vec<T>,
    by_id: FxHashMap<String, u32>,
}

impl<T> Default for LazyDict<T> {
    fn default() -> Self {
        Self {
            objs: Vec::new(),
            by_id: FxHashMap::default(),
        }
    }
}

impl<T> LazyDict<T> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.objs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objs.is_empty()
    }

    /// Bounds-checked dereference of a ref.
    #[must_use]
    pub fn get(&self, r: Ref<T>) -> Option<&T> {
        self.objs.get(r.index as usize)
    }

    #[must_use]
    pub fn get_mut(&mut self, r: Ref<T>) -> Option<&mut T> {
        self.objs.get_mut(r.index as usize)
    }

    /// Direct lookup by dense index.
    #[must_use]
    pub fn by_index(&self, index: u32) -> Option<Ref<T>> {
        ((index as usize) < self.objs.len()).then(|| Ref::new(index))
    }

    /// Returns the ref of an already-materialized id.
    #[must_use]
    pub fn ref_by_id(&self, id: &str) -> Option<Ref<T>> {
        self.by_id.get(id).map(|&i| Ref::new(i))
    }

    /// Iterates objects in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.objs.iter()
    }

    /// Iterates (ref, object) pairs in insertion order.
    pub fn iter_refs(&self) -> impl Iterator<Item = (Ref<T>, &T)> {
        self.objs
            .iter()
            .enumerate()
            .map(|(i, o)| (Ref::new(i as u32), o))
    }

    pub(crate) fn push(&mut self, obj: T, id: String) -> Ref<T> {
        let index = self.objs.len() as u32;
        self.objs.push(obj);
        self.by_id.insert(id, index);
        Ref::new(index)
    }
}

impl<T> Index<Ref<T>> for LazyDict<T> {
    type Output = T;

    fn index(&self, r: Ref<T>) -> &T {
        &self.objs[r.index as usize]
    }
}

impl<T> IndexMut<Ref<T>> for LazyDict<T> {
    fn index_mut(&mut self, r: Ref<T>) -> &mut T {
        &mut self.objs[r.index as usize]
    }
}

// ============================================================================
// LoadContext
// ============================================================================

/// Attached-document state for one load.
///
/// Holds the parsed JSON root alongside the asset being populated; every
/// dictionary resolves ids through it while it lives. All attachment ends
/// when it is dropped.
pub struct LoadContext<'doc, 'a> {
    pub asset: &'a mut Asset,
    doc: &'doc JsonObject,
    /// Ids currently mid-`read`, keyed by section. An id resolved again
    /// before its first resolution finishes is a reference cycle.
    materializing: FxHashSet<(&'static str, String)>,
}

impl<'doc, 'a> LoadContext<'doc, 'a> {
    pub(crate) fn new(asset: &'a mut Asset, doc: &'doc JsonObject) -> Self {
        Self {
            asset,
            doc,
            materializing: FxHashSet::default(),
        }
    }

    /// Resolves `id` within `T`'s dictionary, parsing the object from the
    /// document on first use.
    ///
    /// Calling this twice with the same id returns equal refs.
    pub fn get<T: AssetObject>(&mut self, id: &str) -> Result<Ref<T>> {
        if let Some(r) = T::dict(self.asset).ref_by_id(id) {
            return Ok(r);
        }
        if !self.materializing.insert((T::DICT_ID, id.to_owned())) {
            return Err(AssetError::CyclicReference { id: id.to_owned() });
        }

        let section = self.section::<T>()?;
        let value = section.get(id).ok_or_else(|| AssetError::MissingObject {
            id: id.to_owned(),
            section: T::DICT_ID,
        })?;
        let obj = value
            .as_object()
            .ok_or_else(|| AssetError::NotAnObject { id: id.to_owned() })?;

        let mut inst = T::default();
        inst.set_id(id.to_owned());
        if let Some(name) = obj.get("name").and_then(Value::as_str) {
            inst.set_name(name.to_owned());
        }
        inst.read(obj, self)?;
        self.materializing.remove(&(T::DICT_ID, id.to_owned()));

        let r = self.asset.add(inst);
        T::post_add(self.asset, r);
        Ok(r)
    }

    /// Locates `T`'s backing section in the document.
    fn section<T: AssetObject>(&self) -> Result<&'doc JsonObject> {
        let container: &'doc JsonObject = match T::EXT_ID {
            None => self.doc,
            Some(ext) => self
                .doc
                .get("extensions")
                .and_then(Value::as_object)
                .and_then(|exts| exts.get(ext))
                .and_then(Value::as_object)
                .ok_or(AssetError::MissingSection { section: T::DICT_ID })?,
        };

        container
            .get(T::DICT_ID)
            .and_then(Value::as_object)
            .ok_or(AssetError::MissingSection { section: T::DICT_ID })
    }
}
