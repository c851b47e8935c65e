//! Byte buffers and views.
//!
//! A [`Buffer`] owns a growable byte arena. It can be populated from an
//! external file, from an inline base64 `data:` URI, or by appending binary
//! regions during export. Sub-ranges whose on-disk bytes are compressed can
//! be marked as *encoded regions*: while a region is active, reads inside
//! its logical span resolve into a cached decoded array instead of raw
//! storage, so one physical buffer can hold several independently-compressed
//! chunks without ever materializing all of them at once.
//!
//! A [`BufferView`] is a named `[offset, offset+length)` window into one
//! buffer.

use std::io::{Read, Seek, SeekFrom};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::dict::{AssetObject, LazyDict, LoadContext, Ref, impl_object};
use crate::errors::{AssetError, Result};
use crate::json::{JsonObject, member_str, member_u32, member_usize};

/// Storage category of a buffer, round-tripped through the `type` member.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BufferKind {
    #[default]
    Binary,
    Text,
}

impl BufferKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Binary => "arraybuffer",
            Self::Text => "text",
        }
    }

    fn from_json(s: &str) -> Self {
        match s {
            "text" => Self::Text,
            _ => Self::Binary,
        }
    }
}

/// A sub-range of a buffer whose on-disk bytes are compressed.
///
/// `offset`/`encoded_length` describe the raw stored bytes; `decoded` is the
/// cached decompressed payload that reads resolve into while the region is
/// active.
#[derive(Debug)]
pub struct EncodedRegion {
    pub offset: usize,
    pub encoded_length: usize,
    pub decoded: Vec<u8>,
    pub id: String,
}

/// A growable byte arena backing vertex/animation data.
#[derive(Default)]
pub struct Buffer {
    id: String,
    name: String,
    pub kind: BufferKind,
    /// Logical size in bytes. Diverges from raw storage size once encoded
    /// regions are marked: marking re-states the length in decoded space.
    byte_length: usize,
    data: Vec<u8>,
    special: bool,
    regions: Vec<EncodedRegion>,
    current_region: Option<usize>,
}

impl_object!(Buffer);

impl Buffer {
    /// Logical length in bytes (decoded space once regions are marked).
    #[inline]
    #[must_use]
    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    /// Raw storage capacity in bytes. Monotonically non-decreasing.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Raw stored bytes, ignoring encoded regions.
    #[inline]
    #[must_use]
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    /// Marks this buffer as owned by the container itself (the embedded
    /// body buffer of a binary file).
    pub fn mark_special(&mut self) {
        self.special = true;
    }

    #[must_use]
    pub fn is_special(&self) -> bool {
        self.special
    }

    /// Relative URI of this buffer's payload file.
    #[must_use]
    pub fn uri(&self) -> String {
        format!("{}.bin", self.id)
    }

    /// Reads exactly `length` bytes (the whole stream when 0) starting at
    /// `base_offset`, replacing the current contents. A short read fails.
    pub fn load_from_stream<R: Read + Seek>(
        &mut self,
        stream: &mut R,
        length: usize,
        base_offset: u64,
    ) -> Result<()> {
        let length = if length == 0 {
            stream.seek(SeekFrom::End(0))? as usize
        } else {
            length
        };
        stream.seek(SeekFrom::Start(base_offset))?;

        let mut data = vec![0u8; length];
        stream.read_exact(&mut data)?;
        self.data = data;
        self.byte_length = length;
        Ok(())
    }

    /// Extends the logical length by `amount` bytes (zero-filled).
    ///
    /// Extends in place when spare capacity suffices; otherwise reallocates
    /// to `max(capacity * 1.5, byte_length + amount)` so repeated appends
    /// stay amortized O(1). Bytes in `[0, old_length)` are unchanged.
    pub fn grow(&mut self, amount: usize) {
        if amount == 0 {
            return;
        }
        let needed = self.data.len() + amount;
        if needed > self.data.capacity() {
            let target = (self.data.capacity() + (self.data.capacity() >> 1)).max(needed);
            self.data.reserve_exact(target - self.data.len());
        }
        self.data.resize(needed, 0);
        self.byte_length += amount;
    }

    /// Appends `bytes`, returning the logical offset they were placed at
    /// (the pre-append byte length).
    pub fn append_data(&mut self, bytes: &[u8]) -> usize {
        let offset = self.byte_length;
        let raw_offset = self.data.len();
        self.grow(bytes.len());
        self.data[raw_offset..raw_offset + bytes.len()].copy_from_slice(bytes);
        offset
    }

    /// Splices `replacement` over the raw byte range `[offset, offset+count)`.
    ///
    /// Returns false without touching the buffer when `count` is zero,
    /// `replacement` is empty, or the range does not fit.
    pub fn replace_data(&mut self, offset: usize, count: usize, replacement: &[u8]) -> bool {
        if count == 0 || replacement.is_empty() {
            return false;
        }
        let Some(end) = offset.checked_add(count) else {
            return false;
        };
        if end > self.data.len() {
            return false;
        }

        self.data.splice(offset..end, replacement.iter().copied());
        self.byte_length = self.byte_length - count + replacement.len();
        true
    }

    // ========================================================================
    // Encoded regions
    // ========================================================================

    /// Marks `[offset, offset+encoded_length)` as an encoded region with the
    /// given decoded payload.
    ///
    /// The logical byte length is adjusted by `decoded.len() -
    /// encoded_length` so all subsequent offsets are in decoded space.
    pub fn mark_encoded_region(
        &mut self,
        offset: usize,
        encoded_length: usize,
        decoded: Vec<u8>,
        id: impl Into<String>,
    ) -> Result<()> {
        if decoded.is_empty() {
            return Err(AssetError::EmptyRegionData);
        }
        if offset > self.byte_length || offset + encoded_length > self.byte_length {
            return Err(AssetError::RegionOutOfRange {
                offset,
                length: encoded_length,
                byte_length: self.byte_length,
            });
        }

        self.byte_length = self.byte_length - encoded_length + decoded.len();
        self.regions.push(EncodedRegion {
            offset,
            encoded_length,
            decoded,
            id: id.into(),
        });
        Ok(())
    }

    /// Activates the encoded region with the given id. No-op when it is
    /// already active; unknown ids are a hard error.
    pub fn set_current_encoded_region(&mut self, id: &str) -> Result<()> {
        if let Some(current) = self.current_region
            && self.regions[current].id == id
        {
            return Ok(());
        }

        match self.regions.iter().position(|r| r.id == id) {
            Some(pos) => {
                self.current_region = Some(pos);
                Ok(())
            }
            None => Err(AssetError::RegionNotFound { id: id.to_owned() }),
        }
    }

    /// Deactivates any active encoded region.
    pub fn clear_current_encoded_region(&mut self) {
        self.current_region = None;
    }

    /// The currently active encoded region, if any.
    #[must_use]
    pub fn current_encoded_region(&self) -> Option<&EncodedRegion> {
        self.current_region.map(|i| &self.regions[i])
    }

    /// Reads `len` bytes at logical `offset`.
    ///
    /// Offsets inside the active region's decoded span resolve into the
    /// decoded cache; everything else reads raw storage.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<&[u8]> {
        if let Some(region) = self.current_encoded_region() {
            let begin = region.offset;
            let end = begin + region.decoded.len();
            if offset >= begin && offset < end {
                let local = offset - begin;
                return region
                    .decoded
                    .get(local..local + len)
                    .ok_or(AssetError::OutOfRange {
                        offset,
                        len,
                        available: end,
                    });
            }
        }

        self.data
            .get(offset..offset + len)
            .ok_or(AssetError::OutOfRange {
                offset,
                len,
                available: self.data.len(),
            })
    }

    /// Mutable access to a raw storage range (encoded regions are not
    /// writable through this path).
    pub(crate) fn bytes_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8]> {
        let available = self.data.len();
        self.data
            .get_mut(offset..offset + len)
            .ok_or(AssetError::OutOfRange {
                offset,
                len,
                available,
            })
    }
}

impl AssetObject for Buffer {
    const DICT_ID: &'static str = "buffers";

    fn dict(asset: &crate::Asset) -> &LazyDict<Self> {
        &asset.buffers
    }

    fn dict_mut(asset: &mut crate::Asset) -> &mut LazyDict<Self> {
        &mut asset.buffers
    }

    fn read(&mut self, obj: &JsonObject, ctx: &mut LoadContext<'_, '_>) -> Result<()> {
        let stated = member_usize(obj, "byteLength").unwrap_or(0);
        self.byte_length = stated;
        if let Some(kind) = member_str(obj, "type") {
            self.kind = BufferKind::from_json(kind);
        }

        let Some(uri) = member_str(obj, "uri") else {
            if stated > 0 {
                return Err(AssetError::MissingUri {
                    id: self.id.clone(),
                });
            }
            return Ok(());
        };

        if let Some(data_uri) = DataUri::parse(uri) {
            if data_uri.base64 {
                let decoded = BASE64.decode(data_uri.data)?;
                if stated > 0 && decoded.len() != stated {
                    return Err(AssetError::SizeMismatch {
                        id: self.id.clone(),
                        expected: stated,
                        found: decoded.len(),
                    });
                }
                self.byte_length = decoded.len();
                self.data = decoded;
            } else {
                // Raw (non-base64) data URI: lengths must agree exactly.
                let raw = data_uri.data.as_bytes();
                if stated != raw.len() {
                    return Err(AssetError::SizeMismatch {
                        id: self.id.clone(),
                        expected: stated,
                        found: raw.len(),
                    });
                }
                self.data = raw.to_vec();
            }
        } else if stated > 0 {
            let path = ctx.asset.asset_dir().join(uri);
            let mut file = std::fs::File::open(&path)?;
            self.load_from_stream(&mut file, stated, 0)?;
        }

        Ok(())
    }
}

/// A parsed `data:` URI: optional media type, optional base64 marker, and
/// the payload after the comma.
struct DataUri<'a> {
    base64: bool,
    data: &'a str,
}

impl<'a> DataUri<'a> {
    fn parse(uri: &'a str) -> Option<Self> {
        let rest = uri.strip_prefix("data:")?;
        let comma = rest.find(',')?;
        let (meta, payload) = rest.split_at(comma);
        Some(Self {
            base64: meta.ends_with(";base64"),
            data: &payload[1..],
        })
    }
}

// ============================================================================
// BufferView
// ============================================================================

/// Intended binding target of a view, round-tripped as a numeric code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferViewTarget {
    ArrayBuffer,
    ElementArrayBuffer,
}

impl BufferViewTarget {
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            Self::ArrayBuffer => 34962,
            Self::ElementArrayBuffer => 34963,
        }
    }

    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            34962 => Some(Self::ArrayBuffer),
            34963 => Some(Self::ElementArrayBuffer),
            _ => None,
        }
    }
}

/// A named byte window into one buffer.
#[derive(Default)]
pub struct BufferView {
    id: String,
    name: String,
    pub buffer: Option<Ref<Buffer>>,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub target: Option<BufferViewTarget>,
}

impl_object!(BufferView);

impl AssetObject for BufferView {
    const DICT_ID: &'static str = "bufferViews";

    fn dict(asset: &crate::Asset) -> &LazyDict<Self> {
        &asset.buffer_views
    }

    fn dict_mut(asset: &mut crate::Asset) -> &mut LazyDict<Self> {
        &mut asset.buffer_views
    }

    fn read(&mut self, obj: &JsonObject, ctx: &mut LoadContext<'_, '_>) -> Result<()> {
        if let Some(buffer_id) = member_str(obj, "buffer") {
            self.buffer = Some(ctx.get::<Buffer>(buffer_id)?);
        }
        self.byte_offset = member_usize(obj, "byteOffset").unwrap_or(0);
        self.byte_length = member_usize(obj, "byteLength").unwrap_or(0);
        if let Some(code) = member_u32(obj, "target") {
            self.target = BufferViewTarget::from_code(code);
        }

        if let Some(buffer) = self.buffer {
            let buffer_length = ctx.asset.buffers.get(buffer).map_or(0, Buffer::byte_length);
            if self.byte_offset + self.byte_length > buffer_length {
                return Err(AssetError::ViewOutOfRange {
                    id: self.id.clone(),
                    offset: self.byte_offset,
                    length: self.byte_length,
                    buffer_length,
                });
            }
        }
        Ok(())
    }
}
