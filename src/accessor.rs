//! Typed views over buffer bytes.
//!
//! An [`Accessor`] interprets a strided range of a [`BufferView`] as a
//! sequence of fixed-shape elements (scalar through 4x4 matrix, six scalar
//! component types). [`Accessor::extract`] copies elements out into a plain
//! `Vec`; [`AccessorView`] reads them lazily in place.

use bytemuck::Pod;

use crate::buffer::{Buffer, BufferView};
use crate::dict::{AssetObject, LazyDict, LoadContext, Ref, impl_object};
use crate::errors::{AssetError, Result};
use crate::json::{JsonObject, member_f64_array, member_str, member_u32, member_usize};

/// Scalar component type, round-tripped as a numeric code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ComponentType {
    #[default]
    I8,
    U8,
    I16,
    U16,
    U32,
    F32,
}

impl ComponentType {
    /// Size of one component in bytes.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::U32 | Self::F32 => 4,
        }
    }

    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, Self::F32)
    }

    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            Self::I8 => 5120,
            Self::U8 => 5121,
            Self::I16 => 5122,
            Self::U16 => 5123,
            Self::U32 => 5125,
            Self::F32 => 5126,
        }
    }

    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            5120 => Ok(Self::I8),
            5121 => Ok(Self::U8),
            5122 => Ok(Self::I16),
            5123 => Ok(Self::U16),
            5125 => Ok(Self::U32),
            5126 => Ok(Self::F32),
            other => Err(AssetError::UnknownComponentType(other)),
        }
    }
}

/// Element shape: how many components make up one element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ElementType {
    #[default]
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl ElementType {
    #[must_use]
    pub fn component_count(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "SCALAR",
            Self::Vec2 => "VEC2",
            Self::Vec3 => "VEC3",
            Self::Vec4 => "VEC4",
            Self::Mat2 => "MAT2",
            Self::Mat3 => "MAT3",
            Self::Mat4 => "MAT4",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "SCALAR" => Ok(Self::Scalar),
            "VEC2" => Ok(Self::Vec2),
            "VEC3" => Ok(Self::Vec3),
            "VEC4" => Ok(Self::Vec4),
            "MAT2" => Ok(Self::Mat2),
            "MAT3" => Ok(Self::Mat3),
            "MAT4" => Ok(Self::Mat4),
            other => Err(AssetError::UnknownElementType(other.to_owned())),
        }
    }
}

/// A typed, strided range of a buffer view.
#[derive(Default)]
pub struct Accessor {
    id: String,
    name: String,
    pub buffer_view: Option<Ref<BufferView>>,
    pub byte_offset: usize,
    /// Distance between element starts; 0 means tightly packed.
    pub byte_stride: usize,
    pub component_type: ComponentType,
    pub count: u32,
    pub element_type: ElementType,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

impl_object!(Accessor);

impl Accessor {
    /// Size of one element in bytes.
    #[must_use]
    pub fn element_size(&self) -> usize {
        self.component_type.size() * self.element_type.component_count()
    }

    /// Effective distance between consecutive elements.
    #[must_use]
    pub fn stride(&self) -> usize {
        if self.byte_stride > 0 {
            self.byte_stride
        } else {
            self.element_size()
        }
    }

    /// The backing buffer ref and the absolute byte offset of element 0.
    fn resolve(&self, views: &LazyDict<BufferView>) -> Result<(Ref<Buffer>, usize)> {
        let view_ref = self
            .buffer_view
            .ok_or(AssetError::UnsetReference { what: "bufferView" })?;
        let view = &views[view_ref];
        let buffer = view
            .buffer
            .ok_or(AssetError::UnsetReference { what: "buffer" })?;
        Ok((buffer, view.byte_offset + self.byte_offset))
    }

    /// Copies all elements out into a `Vec<T>`, one `T` per element.
    ///
    /// Elements smaller than `T` are zero-extended; elements larger than `T`
    /// are refused rather than truncated.
    pub fn extract<T: Pod>(
        &self,
        views: &LazyDict<BufferView>,
        buffers: &LazyDict<Buffer>,
    ) -> Result<Vec<T>> {
        let elem = self.element_size();
        if elem > size_of::<T>() {
            return Err(AssetError::ElementTooLarge {
                element: elem,
                output: size_of::<T>(),
            });
        }

        let count = self.count as usize;
        let mut out = vec![T::zeroed(); count];
        if count == 0 {
            return Ok(out);
        }

        let (buffer_ref, base) = self.resolve(views)?;
        let buffer = &buffers[buffer_ref];
        let stride = self.stride();

        if stride == elem && elem == size_of::<T>() {
            let src = buffer.read_bytes(base, count * elem)?;
            bytemuck::cast_slice_mut::<T, u8>(&mut out).copy_from_slice(src);
        } else {
            for (i, slot) in out.iter_mut().enumerate() {
                let src = buffer.read_bytes(base + i * stride, elem)?;
                bytemuck::bytes_of_mut(slot)[..elem].copy_from_slice(src);
            }
        }
        Ok(out)
    }

    /// Writes `count` elements from `src` (strided by `src_stride`) into the
    /// backing buffer, converting between strides and zero-padding when the
    /// destination element is wider.
    pub fn write_data(
        &self,
        views: &LazyDict<BufferView>,
        buffers: &mut LazyDict<Buffer>,
        count: usize,
        src: &[u8],
        src_stride: usize,
    ) -> Result<()> {
        let needed = count * src_stride;
        if src.len() < needed {
            return Err(AssetError::OutOfRange {
                offset: 0,
                len: needed,
                available: src.len(),
            });
        }

        let (buffer_ref, base) = self.resolve(views)?;
        let dst_stride = self.stride();
        let buffer = &mut buffers[buffer_ref];
        let dst = buffer.bytes_mut(base, count * dst_stride)?;
        copy_strided(dst, dst_stride, src, src_stride, count);
        Ok(())
    }

    /// A lazy element reader over the backing bytes.
    pub fn view<'b, T: Pod>(
        &self,
        views: &LazyDict<BufferView>,
        buffers: &'b LazyDict<Buffer>,
    ) -> Result<AccessorView<'b, T>> {
        let elem = self.element_size();
        if elem > size_of::<T>() {
            return Err(AssetError::ElementTooLarge {
                element: elem,
                output: size_of::<T>(),
            });
        }

        let count = self.count as usize;
        let stride = self.stride();
        let data = if count == 0 {
            &[]
        } else {
            let (buffer_ref, base) = self.resolve(views)?;
            buffers[buffer_ref].read_bytes(base, (count - 1) * stride + elem)?
        };
        Ok(AccessorView {
            data,
            stride,
            elem,
            count,
            _marker: std::marker::PhantomData,
        })
    }
}

/// Copies `count` elements between differently-strided byte layouts. Each
/// element copies `min(src_stride, dst_stride)` bytes; wider destination
/// elements keep their tail bytes zeroed.
fn copy_strided(dst: &mut [u8], dst_stride: usize, src: &[u8], src_stride: usize, count: usize) {
    let chunk = src_stride.min(dst_stride);
    for i in 0..count {
        let s = i * src_stride;
        let d = i * dst_stride;
        dst[d..d + chunk].copy_from_slice(&src[s..s + chunk]);
        dst[d + chunk..d + dst_stride].fill(0);
    }
}

/// Borrowed, lazily-decoded element sequence.
pub struct AccessorView<'b, T> {
    data: &'b [u8],
    stride: usize,
    elem: usize,
    count: usize,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Pod> AccessorView<'_, T> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Element `i`, zero-extended into `T` when narrower.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<T> {
        if i >= self.count {
            return None;
        }
        let start = i * self.stride;
        let src = self.data.get(start..start + self.elem)?;
        let mut out = T::zeroed();
        bytemuck::bytes_of_mut(&mut out)[..self.elem].copy_from_slice(src);
        Some(out)
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.count).filter_map(|i| self.get(i))
    }
}

impl AssetObject for Accessor {
    const DICT_ID: &'static str = "accessors";

    fn dict(asset: &crate::Asset) -> &LazyDict<Self> {
        &asset.accessors
    }

    fn dict_mut(asset: &mut crate::Asset) -> &mut LazyDict<Self> {
        &mut asset.accessors
    }

    fn read(&mut self, obj: &JsonObject, ctx: &mut LoadContext<'_, '_>) -> Result<()> {
        if let Some(view_id) = member_str(obj, "bufferView") {
            self.buffer_view = Some(ctx.get::<BufferView>(view_id)?);
        }
        self.byte_offset = member_usize(obj, "byteOffset").unwrap_or(0);
        self.byte_stride = member_usize(obj, "byteStride").unwrap_or(0);
        self.component_type =
            ComponentType::from_code(member_u32(obj, "componentType").unwrap_or(5120))?;
        self.count = member_u32(obj, "count").unwrap_or(0);
        if let Some(name) = member_str(obj, "type") {
            self.element_type = ElementType::from_name(name)?;
        }
        self.min = member_f64_array(obj, "min").unwrap_or_default();
        self.max = member_f64_array(obj, "max").unwrap_or_default();

        if let Some(view_ref) = self.buffer_view {
            let view = &ctx.asset.buffer_views[view_ref];
            let needed = self.count as usize * self.stride();
            if self.byte_offset + needed > view.byte_length {
                return Err(AssetError::AccessorBounds {
                    id: self.id.clone(),
                    count: self.count,
                    stride: self.stride(),
                    view_length: view.byte_length,
                });
            }
        }
        Ok(())
    }
}
