pub mod codec;
mod common;
pub mod config;
pub mod error;
pub mod projector;
pub mod reader;
pub mod sampler;
pub mod structures;
pub mod writer;

use config::{PlaneParams, SphereParams};
use error::SkysplatError;
use image::DynamicImage;
use projector::{DiskProjector, EquirectProjector, SourceImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reader::AssetReader;
use sampler::{concentric_disk, fibonacci_sphere};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use structures::{AssetHeader, PLANE_TEMPLATE, SPHERE_TEMPLATE};
use writer::AssetWriter;

type Projected = Result<[f32; 3], SkysplatError>;

cfg_if::cfg_if! {
if #[cfg(feature = "parallel")] {
    use rayon::prelude::*;

    // Collecting an indexed parallel iterator keeps sample order.
    fn project_all<T, F>(samples: &[T], project: F) -> Vec<Projected>
    where
        T: Sync,
        F: Fn(&T) -> Projected + Sync + Send,
    {
        samples.par_iter().map(project).collect()
    }
} else {
    fn project_all<T, F>(samples: &[T], project: F) -> Vec<Projected>
    where
        T: Sync,
        F: Fn(&T) -> Projected + Sync + Send,
    {
        samples.iter().map(project).collect()
    }
}
}

#[inline]
fn to_f32(p: [f64; 3]) -> [f32; 3] {
    [p[0] as f32, p[1] as f32, p[2] as f32]
}

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}

pub fn generate_sphere<W: Write, R: Rng>(
    image: &DynamicImage,
    params: &SphereParams,
    rng: &mut R,
    out: &mut W,
) -> Result<usize, SkysplatError> {
    let source = SourceImage::new(image)?;
    let projector = EquirectProjector {
        flip_vertical: params.flip_vertical,
    };
    let points = fibonacci_sphere(params.samples, params.radius)?;
    let colors = project_all(&points, |p| projector.project(&source, *p));

    let mut writer = AssetWriter::new(out);
    writer.write_header(&AssetHeader::new(points.len()))?;
    for (point, color) in points.iter().zip(colors) {
        let record = SPHERE_TEMPLATE.build(to_f32(*point), color?, rng);
        writer.append(&record)?;
    }
    writer.finish()?;

    log::debug!(
        "sphere: {} points, radius {}, image {}x{}",
        points.len(),
        params.radius,
        source.width(),
        source.height()
    );
    Ok(points.len())
}

// Samples whose pixel falls outside the image are skipped, so the returned
// count can be lower than the sampler's.
pub fn generate_plane<W: Write, R: Rng>(
    image: &DynamicImage,
    params: &PlaneParams,
    rng: &mut R,
    out: &mut W,
) -> Result<usize, SkysplatError> {
    let source = SourceImage::new(image)?;
    let samples = concentric_disk(params.samples, params.diameter)?;
    let colors = project_all(&samples, |s| DiskProjector.project(&source, s));

    let mut kept = Vec::with_capacity(samples.len());
    let mut skipped = 0usize;
    for (sample, color) in samples.iter().zip(colors) {
        match color {
            Ok(color) => kept.push((to_f32(sample.position), color)),
            Err(SkysplatError::OutOfBoundsProjection { .. }) => skipped += 1,
            Err(e) => return Err(e),
        }
    }
    if skipped > 0 {
        log::warn!("plane: skipped {} samples outside the image", skipped);
    }

    let mut writer = AssetWriter::new(out);
    writer.write_header(&AssetHeader::new(kept.len()))?;
    for (position, color) in &kept {
        let record = PLANE_TEMPLATE.build(*position, *color, rng);
        writer.append(&record)?;
    }
    writer.finish()?;

    log::debug!(
        "plane: {} of {} requested points, diameter {}",
        kept.len(),
        params.samples,
        params.diameter
    );
    Ok(kept.len())
}

// Every field except the colour, and the header bytes, are copied unchanged.
pub fn recolor<R: BufRead + Seek, W: Write>(
    source: R,
    rgb: [u8; 3],
    out: &mut W,
) -> Result<usize, SkysplatError> {
    let color = rgb.map(|c| (c as f64 / 255.0) as f32);
    let mut reader = AssetReader::new(source)?;
    reader.check_length()?;
    let raw_header = reader.raw_header()?;

    let mut writer = AssetWriter::new(out);
    let header = writer.copy_header(&raw_header)?;
    for record in reader.records()? {
        let mut record = record?;
        record.color = color;
        writer.append(&record)?;
    }
    writer.finish()?;
    Ok(header.vertex_count)
}

fn write_asset_file<F>(path: &Path, write: F) -> Result<usize, SkysplatError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<usize, SkysplatError>,
{
    let mut out = BufWriter::new(File::create(path)?);
    let result = write(&mut out).and_then(|n| {
        out.flush()?;
        Ok(n)
    });
    if result.is_err() {
        drop(out);
        if let Err(e) = fs::remove_file(path) {
            log::warn!("Could not remove partial file {}: {}", path.display(), e);
        }
    }
    result
}

pub fn generate_sphere_file(
    image_path: &Path,
    output_path: &Path,
    params: &SphereParams,
) -> Result<usize, SkysplatError> {
    let image = image::open(image_path)?;
    let mut rng = rng_for(params.seed);
    let n = write_asset_file(output_path, |out| {
        generate_sphere(&image, params, &mut rng, out)
    })?;
    log::info!("Sky sphere written: {} ({} points)", output_path.display(), n);
    Ok(n)
}

pub fn generate_plane_file(
    image_path: &Path,
    output_path: &Path,
    params: &PlaneParams,
) -> Result<usize, SkysplatError> {
    let image = image::open(image_path)?;
    let mut rng = rng_for(params.seed);
    let n = write_asset_file(output_path, |out| {
        generate_plane(&image, params, &mut rng, out)
    })?;
    log::info!(
        "Ground plane written: {} ({} points, diameter {})",
        output_path.display(),
        n,
        params.diameter
    );
    Ok(n)
}

pub fn recolor_file(
    template_path: &Path,
    output_path: &Path,
    rgb: [u8; 3],
) -> Result<usize, SkysplatError> {
    let source = BufReader::new(File::open(template_path)?);
    let n = write_asset_file(output_path, |out| recolor(source, rgb, out))?;
    log::info!(
        "Solid colour asset RGB{:?} written: {}",
        rgb,
        output_path.display()
    );
    Ok(n)
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<(PathBuf, usize)>,
    pub failed: Vec<(PathBuf, SkysplatError)>,
}

pub fn run_batch<I, F>(inputs: I, mut op: F) -> BatchReport
where
    I: IntoIterator<Item = PathBuf>,
    F: FnMut(&Path) -> Result<usize, SkysplatError>,
{
    let mut report = BatchReport::default();
    for input in inputs {
        match op(&input) {
            Ok(n) => report.succeeded.push((input, n)),
            Err(e) => {
                log::warn!("Failed to process {}: {}", input.display(), e);
                report.failed.push((input, e));
            }
        }
    }
    report
}
