use crate::common::next_line;
use crate::error::SkysplatError;
use crate::structures::{
    canonical_property_names, AssetHeader, PointRecord, RawRecord, ELEMENT_PREFIX, END_HEADER,
    FORMAT_LINE, LEGACY_NORMAL_NAME, PLY_MAGIC_LINE, PROPERTY_PREFIX, RECORD_BYTES,
    RECORD_FIELDS,
};
use foldhash::{HashMap, HashMapExt};
use std::io::BufRead;
use zerocopy::byteorder::little_endian::F32;
use zerocopy::{FromBytes, IntoBytes};

const MAX_HEADER_BYTES: usize = 64 * 1024;
const HEX_DUMP_BYTES: usize = 100;

pub fn encode(record: &PointRecord) -> [u8; RECORD_BYTES] {
    let raw = RawRecord {
        position: record.position.map(F32::new),
        normal: record.normal.map(F32::new),
        color: record.color.map(F32::new),
        color_residual: record.color_residual.map(F32::new),
        opacity: F32::new(record.opacity),
        scale: record.scale.map(F32::new),
        rotation: record.rotation.map(F32::new),
    };
    let mut out = [0u8; RECORD_BYTES];
    out.copy_from_slice(raw.as_bytes());
    out
}

// Short input is reported as record 0; stream readers report their own index.
pub fn decode(bytes: &[u8]) -> Result<PointRecord, SkysplatError> {
    let (raw, _) = RawRecord::read_from_prefix(bytes).map_err(|_| {
        SkysplatError::TruncatedRecord {
            index: 0,
            available: bytes.len(),
        }
    })?;
    Ok(PointRecord {
        position: raw.position.map(F32::get),
        normal: raw.normal.map(F32::get),
        color: raw.color.map(F32::get),
        color_residual: raw.color_residual.map(F32::get),
        opacity: raw.opacity.get(),
        scale: raw.scale.map(F32::get),
        rotation: raw.rotation.map(F32::get),
    })
}

pub fn write_header(vertex_count: usize) -> Vec<u8> {
    AssetHeader::new(vertex_count).to_bytes()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderEncoding {
    Utf8,
    Latin1,
    Ascii,
}

impl HeaderEncoding {
    pub const FALLBACK_ORDER: [HeaderEncoding; 3] = [
        HeaderEncoding::Utf8,
        HeaderEncoding::Latin1,
        HeaderEncoding::Ascii,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            HeaderEncoding::Utf8 => "utf-8",
            HeaderEncoding::Latin1 => "latin-1",
            HeaderEncoding::Ascii => "ascii",
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            HeaderEncoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_owned),
            HeaderEncoding::Latin1 => Some(bytes.iter().map(|&b| b as char).collect()),
            HeaderEncoding::Ascii => bytes
                .is_ascii()
                .then(|| bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

pub fn decode_header_text(
    bytes: &[u8],
    encodings: &[HeaderEncoding],
) -> Option<(HeaderEncoding, String)> {
    encodings
        .iter()
        .find_map(|enc| enc.decode(bytes).map(|text| (*enc, text)))
}

fn header_len(raw: &[u8]) -> Option<usize> {
    let mut offset = 0;
    while let Some(line) = next_line(raw, &mut offset) {
        if line.trim_ascii() == END_HEADER.as_bytes() {
            return Some(offset);
        }
    }
    None
}

fn malformed(msg: impl Into<String>) -> SkysplatError {
    SkysplatError::MalformedHeader(msg.into())
}

pub fn parse_header(raw: &[u8]) -> Result<AssetHeader, SkysplatError> {
    let data_offset =
        header_len(raw).ok_or_else(|| malformed("No 'end_header' found before EOF"))?;
    let (encoding, text) = decode_header_text(&raw[..data_offset], &HeaderEncoding::FALLBACK_ORDER)
        .ok_or_else(|| malformed("Header bytes are not valid text"))?;
    log::debug!("decoded {} header bytes as {}", data_offset, encoding.name());

    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.starts_with("comment") && !l.starts_with("obj_info"));

    if lines.next() != Some(PLY_MAGIC_LINE) {
        return Err(malformed("Not a .ply file (missing 'ply' header)"));
    }
    if lines.next() != Some(FORMAT_LINE) {
        return Err(malformed(
            "Unsupported .ply format (only binary_little_endian 1.0 is supported)",
        ));
    }

    let element = lines
        .next()
        .and_then(|l| l.strip_prefix(ELEMENT_PREFIX))
        .ok_or_else(|| malformed("Missing 'element vertex' definition"))?;
    let vertex_count: usize = element
        .trim()
        .parse()
        .map_err(|e| malformed(format!("Parse error in vertex count: {}", e)))?;

    let mut properties = Vec::with_capacity(RECORD_FIELDS);
    for line in lines {
        if line == END_HEADER {
            break;
        }
        let name = line
            .strip_prefix(PROPERTY_PREFIX)
            .ok_or_else(|| malformed(format!("Unsupported property line: {:?}", line)))?;
        properties.push(name.trim().to_string());
    }

    check_schema(&properties)?;

    Ok(AssetHeader {
        vertex_count,
        properties,
        data_offset,
    })
}

fn check_schema(properties: &[String]) -> Result<(), SkysplatError> {
    if properties.len() != RECORD_FIELDS {
        return Err(malformed(format!(
            "Expected {} float properties, found {}",
            RECORD_FIELDS,
            properties.len()
        )));
    }

    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(properties.len());
    for (i, name) in properties.iter().enumerate() {
        if let Some(first) = seen.insert(name.as_str(), i) {
            return Err(malformed(format!(
                "Duplicate property '{}' at positions {} and {}",
                name, first, i
            )));
        }
    }

    for (i, (found, expected)) in properties
        .iter()
        .zip(canonical_property_names())
        .enumerate()
    {
        let legacy_normal = expected == "nx" && found == LEGACY_NORMAL_NAME;
        if *found != expected && !legacy_normal {
            return Err(malformed(format!(
                "Property {} is '{}', expected '{}'",
                i, found, expected
            )));
        }
    }
    Ok(())
}

pub fn read_header<R: BufRead>(reader: &mut R) -> Result<AssetHeader, SkysplatError> {
    let mut buf = Vec::with_capacity(2048);
    loop {
        let start = buf.len();
        let n = reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Err(malformed("No 'end_header' found before EOF"));
        }
        if buf[start..].trim_ascii() == END_HEADER.as_bytes() {
            break;
        }
        if buf.len() > MAX_HEADER_BYTES {
            return Err(malformed(format!(
                "Header exceeds {} bytes without 'end_header'",
                MAX_HEADER_BYTES
            )));
        }
    }
    parse_header(&buf)
}

pub fn dump_header(raw: &[u8]) -> String {
    dump_header_with(raw, &HeaderEncoding::FALLBACK_ORDER)
}

pub fn dump_header_with(raw: &[u8], encodings: &[HeaderEncoding]) -> String {
    let header = &raw[..header_len(raw).unwrap_or(raw.len())];
    match decode_header_text(header, encodings) {
        Some((encoding, text)) => {
            log::debug!("header decoded as {}", encoding.name());
            text.lines()
                .map(str::trim)
                .collect::<Vec<_>>()
                .join("\n")
        }
        None => {
            let hex = header
                .iter()
                .take(HEX_DUMP_BYTES)
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<String>>()
                .join(" ");
            format!("Binary PLY header (first 100 bytes in hex):\n{}", hex)
        }
    }
}
