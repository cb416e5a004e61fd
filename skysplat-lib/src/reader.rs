use crate::codec::{decode, read_header};
use crate::common::length3;
use crate::error::SkysplatError;
use crate::structures::{AssetHeader, PointRecord, RECORD_BYTES};
use std::fmt;
use std::io::{BufRead, ErrorKind, Read, Seek, SeekFrom, Write};

pub struct AssetReader<R> {
    inner: R,
    header: AssetHeader,
}

impl<R: BufRead + Seek> AssetReader<R> {
    pub fn new(mut inner: R) -> Result<Self, SkysplatError> {
        inner.seek(SeekFrom::Start(0))?;
        let header = read_header(&mut inner)?;
        Ok(AssetReader { inner, header })
    }

    pub fn header(&self) -> &AssetHeader {
        &self.header
    }

    pub fn vertex_count(&self) -> usize {
        self.header.vertex_count
    }

    pub fn properties(&self) -> &[String] {
        &self.header.properties
    }

    pub fn raw_header(&mut self) -> Result<Vec<u8>, SkysplatError> {
        let mut raw = vec![0u8; self.header.data_offset];
        self.inner.seek(SeekFrom::Start(0))?;
        self.inner.read_exact(&mut raw)?;
        Ok(raw)
    }

    pub fn check_length(&mut self) -> Result<(), SkysplatError> {
        let end = self.inner.seek(SeekFrom::End(0))? as usize;
        let body = end.saturating_sub(self.header.data_offset);
        let expected = self.header.body_len();
        if body < expected {
            return Err(SkysplatError::TruncatedRecord {
                index: body / RECORD_BYTES,
                available: body % RECORD_BYTES,
            });
        }
        if body > expected {
            return Err(SkysplatError::VertexCountMismatch {
                declared: self.header.vertex_count,
                actual: body.div_ceil(RECORD_BYTES),
            });
        }
        Ok(())
    }

    // Each call restarts from the first record.
    pub fn records(&mut self) -> Result<Records<'_, R>, SkysplatError> {
        self.inner
            .seek(SeekFrom::Start(self.header.data_offset as u64))?;
        Ok(Records {
            inner: &mut self.inner,
            remaining: self.header.vertex_count,
            index: 0,
            buf: [0u8; RECORD_BYTES],
        })
    }

    pub fn read_all(&mut self) -> Result<Vec<PointRecord>, SkysplatError> {
        let mut out = Vec::with_capacity(self.header.vertex_count.min(1 << 20));
        for record in self.records()? {
            out.push(record?);
        }
        Ok(out)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

pub struct Records<'a, R> {
    inner: &'a mut R,
    remaining: usize,
    index: usize,
    buf: [u8; RECORD_BYTES],
}

impl<R: Read> Records<'_, R> {
    fn read_record(&mut self) -> Result<PointRecord, SkysplatError> {
        let mut filled = 0;
        while filled < RECORD_BYTES {
            match self.inner.read(&mut self.buf[filled..]) {
                Ok(0) => {
                    return Err(SkysplatError::TruncatedRecord {
                        index: self.index,
                        available: filled,
                    })
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        decode(&self.buf)
    }
}

impl<R: Read> Iterator for Records<'_, R> {
    type Item = Result<PointRecord, SkysplatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let result = self.read_record();
        self.remaining = if result.is_ok() { self.remaining - 1 } else { 0 };
        self.index += 1;
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSummary {
    pub index: usize,
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
    pub distance: f32,
    pub residual_min: f32,
    pub residual_max: f32,
    pub opacity: f32,
    pub scale: [f32; 3],
    pub rotation: [f32; 4],
}

impl RecordSummary {
    pub fn new(index: usize, record: &PointRecord) -> Self {
        let (residual_min, residual_max) = record
            .color_residual
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        RecordSummary {
            index,
            position: record.position,
            normal: record.normal,
            color: record.color,
            distance: length3(record.position),
            residual_min,
            residual_max,
            opacity: record.opacity,
            scale: record.scale,
            rotation: record.rotation,
        }
    }
}

impl fmt::Display for RecordSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.position;
        let [nx, ny, nz] = self.normal;
        let [r, g, b] = self.color;
        let [s0, s1, s2] = self.scale;
        let [r0, r1, r2, r3] = self.rotation;
        writeln!(f, "Vertex {}:", self.index + 1)?;
        writeln!(f, "  position (x, y, z): ({}, {}, {})", x, y, z)?;
        writeln!(f, "  normal (nx, ny, nz): ({}, {}, {})", nx, ny, nz)?;
        writeln!(f, "  color (f_dc_0, f_dc_1, f_dc_2): ({}, {}, {})", r, g, b)?;
        writeln!(f, "  distance from origin: {}", self.distance)?;
        writeln!(
            f,
            "  f_rest_* range: [{}, {}]",
            self.residual_min, self.residual_max
        )?;
        writeln!(f, "  opacity: {}", self.opacity)?;
        writeln!(f, "  scale (scale_0, scale_1, scale_2): ({}, {}, {})", s0, s1, s2)?;
        write!(
            f,
            "  rotation (rot_0, rot_1, rot_2, rot_3): ({}, {}, {}, {})",
            r0, r1, r2, r3
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    pub path: String,
    pub vertex_count: usize,
    pub properties: Vec<String>,
}

impl AssetInfo {
    pub fn new(path: impl Into<String>, header: &AssetHeader) -> Self {
        AssetInfo {
            path: path.into(),
            vertex_count: header.vertex_count,
            properties: header.properties.clone(),
        }
    }
}

impl fmt::Display for AssetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PLY file: {}", self.path)?;
        writeln!(f, "Vertex count: {}", self.vertex_count)?;
        writeln!(f, "Properties: {}", self.properties.join(", "))?;
        let formats = vec!["float32"; self.properties.len()];
        writeln!(f, "Formats: {}", formats.join(", "))
    }
}

pub fn export_xyz<R: BufRead + Seek, W: Write>(
    reader: &mut AssetReader<R>,
    out: &mut W,
) -> Result<usize, SkysplatError> {
    writeln!(out, "# X Y Z coordinates of every point")?;
    writeln!(out, "# format: X Y Z")?;
    let mut count = 0;
    for record in reader.records()? {
        let [x, y, z] = record?.position;
        writeln!(out, "{} {} {}", x, y, z)?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;
    use crate::structures::{RESIDUAL_COUNT, SPHERE_TEMPLATE};
    use crate::writer::AssetWriter;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Cursor;

    fn asset(n: usize) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(1);
        let mut writer = AssetWriter::new(Vec::new());
        writer.write_header(&AssetHeader::new(n)).unwrap();
        for i in 0..n {
            let rec = SPHERE_TEMPLATE.build([3.0, 4.0, i as f32], [0.1, 0.2, 0.3], &mut rng);
            writer.append(&rec).unwrap();
        }
        writer.finish().unwrap();
        writer.into_inner()
    }

    #[test]
    fn records_are_lazy_and_restartable() {
        let mut reader = AssetReader::new(Cursor::new(asset(4))).unwrap();
        assert_eq!(reader.vertex_count(), 4);
        assert_eq!(reader.properties().len(), 60);

        let first: Vec<_> = reader.records().unwrap().take(2).collect();
        assert_eq!(first.len(), 2);

        let all = reader.read_all().unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0], *first[0].as_ref().unwrap());
        assert_eq!(all[3].position, [3.0, 4.0, 3.0]);
        reader.check_length().unwrap();
    }

    #[test]
    fn raw_header_keeps_comment_lines() {
        let bytes = asset(2);
        let offset = AssetHeader::new(2).data_offset;
        let with_comment = String::from_utf8(bytes[..offset].to_vec())
            .unwrap()
            .replace("element vertex", "comment scanned by hand\nelement vertex");
        let mut source = with_comment.clone().into_bytes();
        source.extend_from_slice(&bytes[offset..]);

        let mut reader = AssetReader::new(Cursor::new(source)).unwrap();
        assert_eq!(reader.raw_header().unwrap(), with_comment.as_bytes());
        assert_eq!(reader.read_all().unwrap().len(), 2);
    }

    #[test]
    fn truncated_body_is_reported() {
        let mut bytes = asset(3);
        bytes.truncate(bytes.len() - 10);
        let mut reader = AssetReader::new(Cursor::new(bytes)).unwrap();
        let results: Vec<_> = reader.records().unwrap().collect();
        assert_eq!(results.len(), 3);
        assert!(results[1].is_ok());
        assert!(matches!(
            results[2],
            Err(SkysplatError::TruncatedRecord {
                index: 2,
                available: 230
            })
        ));
        assert!(matches!(
            reader.check_length(),
            Err(SkysplatError::TruncatedRecord { index: 2, .. })
        ));
    }

    #[test]
    fn trailing_data_is_a_count_mismatch() {
        let mut bytes = asset(2);
        bytes.extend_from_slice(&[0u8; 4]);
        let mut reader = AssetReader::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            reader.check_length(),
            Err(SkysplatError::VertexCountMismatch {
                declared: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn missing_sentinel_fails_instead_of_reading_nothing() {
        let bytes = b"ply\nformat binary_little_endian 1.0\nelement vertex 0\n".to_vec();
        assert!(matches!(
            AssetReader::new(Cursor::new(bytes)),
            Err(SkysplatError::MalformedHeader(_))
        ));
    }

    #[test]
    fn summary_reports_distance_and_residual_range() {
        let mut residual = [0.01f32; RESIDUAL_COUNT];
        residual[5] = -0.025;
        residual[40] = 0.019;
        let record = PointRecord {
            position: [3.0, 4.0, 0.0],
            normal: [0.0; 3],
            color: [1.7, 0.0, 0.0],
            color_residual: residual,
            opacity: 4.6,
            scale: [0.636; 3],
            rotation: [1.0, 0.0, 0.0, 0.0],
        };
        let summary = RecordSummary::new(0, &record);
        assert_eq!(summary.distance, 5.0);
        assert_eq!(summary.residual_min, -0.025);
        assert_eq!(summary.residual_max, 0.019);
        let text = summary.to_string();
        assert!(text.starts_with("Vertex 1:"));
        assert!(text.contains("distance from origin: 5"));
        assert!(decode(&encode(&record)).is_ok());
    }

    #[test]
    fn xyz_export_lists_every_point() {
        let mut reader = AssetReader::new(Cursor::new(asset(2))).unwrap();
        let mut out = Vec::new();
        assert_eq!(export_xyz(&mut reader, &mut out).unwrap(), 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "3 4 0");
        assert_eq!(lines[3], "3 4 1");
    }

    #[test]
    fn info_lists_schema() {
        let reader = AssetReader::new(Cursor::new(asset(1))).unwrap();
        let info = AssetInfo::new("sky.ply", reader.header());
        let text = info.to_string();
        assert!(text.contains("Vertex count: 1"));
        assert!(text.contains("x, y, z, nx, ny, nz, f_dc_0"));
    }
}
