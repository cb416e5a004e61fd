use std::ops::Range;
use zerocopy::byteorder::little_endian::F32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

pub const PLY_MAGIC_LINE: &str = "ply";
pub const FORMAT_LINE: &str = "format binary_little_endian 1.0";
pub const ELEMENT_PREFIX: &str = "element vertex ";
pub const PROPERTY_PREFIX: &str = "property float ";
pub const END_HEADER: &str = "end_header";

pub const RESIDUAL_COUNT: usize = 45;
pub const RECORD_FIELDS: usize = 3 + 3 + 3 + RESIDUAL_COUNT + 1 + 3 + 4;
pub const RECORD_BYTES: usize = RECORD_FIELDS * 4;

/// Multiplier applied to normalized source RGB. Results are left unclamped.
pub const LUMINANCE_SCALE: f64 = 1.7;
pub const OPACITY: f32 = 4.6;
pub const IDENTITY_ROTATION: [f32; 4] = [1.0, 0.0, 0.0, 0.0];
pub const RESIDUAL_RANGE: Range<f32> = -0.03..0.02;

pub const SPHERE_SCALE: [f32; 3] = [0.636, 0.636, 0.636];
pub const PLANE_SCALE: [f32; 3] = [0.636, 0.0636, 0.636];
pub const UP_NORMAL: [f32; 3] = [0.0, 1.0, 0.0];

/// Older skybox assets spell the first normal property this way.
pub const LEGACY_NORMAL_NAME: &str = "nxx";

pub fn canonical_property_names() -> Vec<String> {
    let mut names: Vec<String> = ["x", "y", "z", "nx", "ny", "nz", "f_dc_0", "f_dc_1", "f_dc_2"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    names.extend((0..RESIDUAL_COUNT).map(|i| format!("f_rest_{}", i)));
    names.extend(
        [
            "opacity", "scale_0", "scale_1", "scale_2", "rot_0", "rot_1", "rot_2", "rot_3",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    names
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointRecord {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
    pub color_residual: [f32; RESIDUAL_COUNT],
    pub opacity: f32,
    pub scale: [f32; 3],
    pub rotation: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub(crate) struct RawRecord {
    pub position: [F32; 3],
    pub normal: [F32; 3],
    pub color: [F32; 3],
    pub color_residual: [F32; RESIDUAL_COUNT],
    pub opacity: F32,
    pub scale: [F32; 3],
    pub rotation: [F32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordTemplate {
    pub normal: [f32; 3],
    pub scale: [f32; 3],
}

pub const SPHERE_TEMPLATE: RecordTemplate = RecordTemplate {
    normal: [0.0, 0.0, 0.0],
    scale: SPHERE_SCALE,
};

pub const PLANE_TEMPLATE: RecordTemplate = RecordTemplate {
    normal: UP_NORMAL,
    scale: PLANE_SCALE,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetHeader {
    pub vertex_count: usize,
    pub properties: Vec<String>,
    pub data_offset: usize,
}

impl AssetHeader {
    pub fn new(vertex_count: usize) -> Self {
        Self::with_properties(vertex_count, canonical_property_names())
    }

    pub fn with_properties(vertex_count: usize, properties: Vec<String>) -> Self {
        let mut header = AssetHeader {
            vertex_count,
            properties,
            data_offset: 0,
        };
        header.data_offset = header.to_bytes().len();
        header
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::with_capacity(64 + self.properties.len() * 24);
        out.push_str(PLY_MAGIC_LINE);
        out.push('\n');
        out.push_str(FORMAT_LINE);
        out.push('\n');
        out.push_str(ELEMENT_PREFIX);
        out.push_str(&self.vertex_count.to_string());
        out.push('\n');
        for name in &self.properties {
            out.push_str(PROPERTY_PREFIX);
            out.push_str(name);
            out.push('\n');
        }
        out.push_str(END_HEADER);
        out.push('\n');
        out.into_bytes()
    }

    pub fn body_len(&self) -> usize {
        self.vertex_count * RECORD_BYTES
    }
}
