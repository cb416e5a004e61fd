use crate::codec::{encode, parse_header};
use crate::error::SkysplatError;
use crate::structures::{
    AssetHeader, PointRecord, RecordTemplate, IDENTITY_ROTATION, OPACITY, RESIDUAL_COUNT,
    RESIDUAL_RANGE,
};
use rand::Rng;
use std::io::Write;

impl RecordTemplate {
    pub fn build<R: Rng>(
        &self,
        position: [f32; 3],
        color: [f32; 3],
        rng: &mut R,
    ) -> PointRecord {
        let mut color_residual = [0.0f32; RESIDUAL_COUNT];
        for r in color_residual.iter_mut() {
            *r = rng.random_range(RESIDUAL_RANGE);
        }
        PointRecord {
            position,
            normal: self.normal,
            color,
            color_residual,
            opacity: OPACITY,
            scale: self.scale,
            rotation: IDENTITY_ROTATION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Init,
    HeaderWritten,
    Finalized,
}

impl WriterState {
    fn describe(&self) -> &'static str {
        match self {
            WriterState::Init => "waiting for a header",
            WriterState::HeaderWritten => "accepting records",
            WriterState::Finalized => "finalized",
        }
    }
}

// A failed `finish` leaves an invalid file behind; callers discard it.
pub struct AssetWriter<W: Write> {
    out: W,
    state: WriterState,
    declared: usize,
    written: usize,
}

impl<W: Write> AssetWriter<W> {
    pub fn new(out: W) -> Self {
        AssetWriter {
            out,
            state: WriterState::Init,
            declared: 0,
            written: 0,
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn records_written(&self) -> usize {
        self.written
    }

    fn expect_state(&self, expected: WriterState, operation: &'static str) -> Result<(), SkysplatError> {
        if self.state != expected {
            return Err(SkysplatError::InvalidWriterState {
                state: self.state.describe(),
                operation,
            });
        }
        Ok(())
    }

    pub fn write_header(&mut self, header: &AssetHeader) -> Result<(), SkysplatError> {
        self.expect_state(WriterState::Init, "write a header")?;
        self.out.write_all(&header.to_bytes())?;
        self.declared = header.vertex_count;
        self.state = WriterState::HeaderWritten;
        Ok(())
    }

    // Writes an existing header byte for byte, comments and line endings included.
    pub fn copy_header(&mut self, raw: &[u8]) -> Result<AssetHeader, SkysplatError> {
        self.expect_state(WriterState::Init, "write a header")?;
        let header = parse_header(raw)?;
        self.out.write_all(&raw[..header.data_offset])?;
        self.declared = header.vertex_count;
        self.state = WriterState::HeaderWritten;
        Ok(header)
    }

    pub fn append(&mut self, record: &PointRecord) -> Result<(), SkysplatError> {
        self.expect_state(WriterState::HeaderWritten, "append a record")?;
        if self.written == self.declared {
            return Err(SkysplatError::VertexCountMismatch {
                declared: self.declared,
                actual: self.written + 1,
            });
        }
        self.out.write_all(&encode(record))?;
        self.written += 1;
        Ok(())
    }

    pub fn finish(&mut self) -> Result<(), SkysplatError> {
        self.expect_state(WriterState::HeaderWritten, "finalize")?;
        if self.written != self.declared {
            return Err(SkysplatError::VertexCountMismatch {
                declared: self.declared,
                actual: self.written,
            });
        }
        self.out.flush()?;
        self.state = WriterState::Finalized;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, parse_header};
    use crate::structures::{PLANE_TEMPLATE, RECORD_BYTES, SPHERE_TEMPLATE};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn record(i: usize) -> PointRecord {
        let mut rng = StdRng::seed_from_u64(i as u64);
        SPHERE_TEMPLATE.build([i as f32, 0.0, 0.0], [0.5, 0.5, 0.5], &mut rng)
    }

    #[test]
    fn template_fills_constant_fields() {
        let mut rng = StdRng::seed_from_u64(7);
        let r = PLANE_TEMPLATE.build([1.0, 0.0, 2.0], [1.7, 0.0, 0.0], &mut rng);
        assert_eq!(r.normal, [0.0, 1.0, 0.0]);
        assert_eq!(r.scale, [0.636, 0.0636, 0.636]);
        assert_eq!(r.opacity, 4.6);
        assert_eq!(r.rotation, [1.0, 0.0, 0.0, 0.0]);
        assert!(r
            .color_residual
            .iter()
            .all(|&v| (-0.03..0.02).contains(&v)));

        let s = SPHERE_TEMPLATE.build([0.0; 3], [0.0; 3], &mut rng);
        assert_eq!(s.normal, [0.0, 0.0, 0.0]);
        assert_eq!(s.scale, [0.636; 3]);
    }

    #[test]
    fn writes_header_then_records() {
        let mut writer = AssetWriter::new(Vec::new());
        writer.write_header(&AssetHeader::new(3)).unwrap();
        for i in 0..3 {
            writer.append(&record(i)).unwrap();
        }
        writer.finish().unwrap();
        assert_eq!(writer.state(), WriterState::Finalized);

        let bytes = writer.into_inner();
        let header = parse_header(&bytes).unwrap();
        assert_eq!(header.vertex_count, 3);
        assert_eq!(bytes.len(), header.data_offset + 3 * RECORD_BYTES);
        let second = decode(&bytes[header.data_offset + RECORD_BYTES..]).unwrap();
        assert_eq!(second, record(1));
    }

    #[test]
    fn copied_header_is_verbatim() {
        let raw = String::from_utf8(AssetHeader::new(1).to_bytes())
            .unwrap()
            .replace("element vertex", "comment kept\nelement vertex")
            .into_bytes();
        let mut writer = AssetWriter::new(Vec::new());
        let header = writer.copy_header(&raw).unwrap();
        assert_eq!(header.vertex_count, 1);
        writer.append(&record(0)).unwrap();
        writer.finish().unwrap();

        let bytes = writer.into_inner();
        assert_eq!(&bytes[..raw.len()], &raw[..]);
        assert_eq!(bytes.len(), raw.len() + RECORD_BYTES);
    }

    #[test]
    fn append_before_header_is_rejected() {
        let mut writer = AssetWriter::new(Vec::new());
        assert!(matches!(
            writer.append(&record(0)),
            Err(SkysplatError::InvalidWriterState { .. })
        ));
        assert!(writer.into_inner().is_empty());
    }

    #[test]
    fn append_after_finish_is_rejected() {
        let mut writer = AssetWriter::new(Vec::new());
        writer.write_header(&AssetHeader::new(0)).unwrap();
        writer.finish().unwrap();
        assert!(matches!(
            writer.append(&record(0)),
            Err(SkysplatError::InvalidWriterState { .. })
        ));
        assert!(matches!(
            writer.write_header(&AssetHeader::new(0)),
            Err(SkysplatError::InvalidWriterState { .. })
        ));
    }

    #[test]
    fn short_asset_fails_to_finish() {
        let mut writer = AssetWriter::new(Vec::new());
        writer.write_header(&AssetHeader::new(2)).unwrap();
        writer.append(&record(0)).unwrap();
        match writer.finish() {
            Err(SkysplatError::VertexCountMismatch { declared, actual }) => {
                assert_eq!((declared, actual), (2, 1));
            }
            other => panic!("expected VertexCountMismatch, got {:?}", other),
        }
        assert_eq!(writer.state(), WriterState::HeaderWritten);
    }

    #[test]
    fn extra_record_is_rejected() {
        let mut writer = AssetWriter::new(Vec::new());
        writer.write_header(&AssetHeader::new(1)).unwrap();
        writer.append(&record(0)).unwrap();
        assert!(matches!(
            writer.append(&record(1)),
            Err(SkysplatError::VertexCountMismatch { declared: 1, actual: 2 })
        ));
        assert_eq!(writer.records_written(), 1);
    }
}
