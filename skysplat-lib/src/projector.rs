use crate::common::{azimuth, luminance};
use crate::error::SkysplatError;
use crate::sampler::DiskSample;
use crate::structures::LUMINANCE_SCALE;
use image::DynamicImage;
use std::f64::consts::{PI, TAU};

#[derive(Debug, Clone, Copy)]
pub struct SourceImage<'a> {
    image: &'a DynamicImage,
    width: u32,
    height: u32,
}

impl<'a> SourceImage<'a> {
    pub fn new(image: &'a DynamicImage) -> Result<Self, SkysplatError> {
        let channels = image.color().channel_count();
        if !matches!(channels, 1 | 3 | 4) {
            return Err(SkysplatError::UnsupportedPixelFormat(channels));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(SkysplatError::InvalidParameter(
                "source image has no pixels".to_string(),
            ));
        }
        Ok(SourceImage {
            image,
            width: image.width(),
            height: image.height(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    // Alpha is dropped; greyscale is broadcast to all three channels.
    pub fn normalized_rgb(&self, x: u32, y: u32) -> Result<[f64; 3], SkysplatError> {
        if x >= self.width || y >= self.height {
            return Err(SkysplatError::OutOfBoundsProjection {
                x: x as i64,
                y: y as i64,
                width: self.width,
                height: self.height,
            });
        }

        const U8_MAX: f64 = u8::MAX as f64;
        const U16_MAX: f64 = u16::MAX as f64;

        let rgb = match self.image {
            DynamicImage::ImageLuma8(buf) => [buf.get_pixel(x, y).0[0] as f64 / U8_MAX; 3],
            DynamicImage::ImageLuma16(buf) => [buf.get_pixel(x, y).0[0] as f64 / U16_MAX; 3],
            DynamicImage::ImageRgb8(buf) => {
                let p = buf.get_pixel(x, y).0;
                [p[0] as f64 / U8_MAX, p[1] as f64 / U8_MAX, p[2] as f64 / U8_MAX]
            }
            DynamicImage::ImageRgba8(buf) => {
                let p = buf.get_pixel(x, y).0;
                [p[0] as f64 / U8_MAX, p[1] as f64 / U8_MAX, p[2] as f64 / U8_MAX]
            }
            DynamicImage::ImageRgb16(buf) => {
                let p = buf.get_pixel(x, y).0;
                [p[0] as f64 / U16_MAX, p[1] as f64 / U16_MAX, p[2] as f64 / U16_MAX]
            }
            DynamicImage::ImageRgba16(buf) => {
                let p = buf.get_pixel(x, y).0;
                [p[0] as f64 / U16_MAX, p[1] as f64 / U16_MAX, p[2] as f64 / U16_MAX]
            }
            // HDR sources are already linear floats.
            DynamicImage::ImageRgb32F(buf) => {
                let p = buf.get_pixel(x, y).0;
                [p[0] as f64, p[1] as f64, p[2] as f64]
            }
            DynamicImage::ImageRgba32F(buf) => {
                let p = buf.get_pixel(x, y).0;
                [p[0] as f64, p[1] as f64, p[2] as f64]
            }
            other => {
                return Err(SkysplatError::UnsupportedPixelFormat(
                    other.color().channel_count(),
                ))
            }
        };
        Ok(rgb)
    }

    pub fn color(&self, x: u32, y: u32) -> Result<[f32; 3], SkysplatError> {
        Ok(luminance(self.normalized_rgb(x, y)?, LUMINANCE_SCALE))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EquirectProjector {
    pub flip_vertical: bool,
}

impl EquirectProjector {
    pub fn pixel_for_angles(&self, theta: f64, phi: f64, width: u32, height: u32) -> (u32, u32) {
        let u = ((phi / TAU * width as f64).floor() as i64).rem_euclid(width as i64);
        let row = if self.flip_vertical {
            1.0 - theta / PI
        } else {
            theta / PI
        };
        let v = ((row * height as f64).floor() as i64).clamp(0, height as i64 - 1);
        (u as u32, v as u32)
    }

    pub fn pixel_for_point(&self, point: [f64; 3], width: u32, height: u32) -> (u32, u32) {
        let [x, y, z] = point;
        let r = (x * x + y * y + z * z).sqrt();
        let theta = if r > 0.0 {
            (y / r).clamp(-1.0, 1.0).acos()
        } else {
            0.0
        };
        self.pixel_for_angles(theta, azimuth(x, z), width, height)
    }

    pub fn project(&self, image: &SourceImage, point: [f64; 3]) -> Result<[f32; 3], SkysplatError> {
        let (u, v) = self.pixel_for_point(point, image.width(), image.height());
        image.color(u, v)
    }
}

// The pixel angle is the sample's own placement angle, so the image is laid
// onto the disk without rotation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskProjector;

impl DiskProjector {
    pub fn pixel_for_sample(
        &self,
        sample: &DiskSample,
        width: u32,
        height: u32,
    ) -> Result<(u32, u32), SkysplatError> {
        let center_x = width as f64 / 2.0;
        let center_y = height as f64 / 2.0;
        let inscribed = center_x.min(center_y);

        // `as` truncates toward zero, matching integer conversion of the offset.
        let x = (center_x + sample.ratio * inscribed * sample.theta.cos()) as i64;
        let y = (center_y + sample.ratio * inscribed * sample.theta.sin()) as i64;

        if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
            return Err(SkysplatError::OutOfBoundsProjection {
                x,
                y,
                width,
                height,
            });
        }
        Ok((x as u32, y as u32))
    }

    pub fn project(&self, image: &SourceImage, sample: &DiskSample) -> Result<[f32; 3], SkysplatError> {
        let (x, y) = self.pixel_for_sample(sample, image.width(), image.height())?;
        image.color(x, y)
    }
}
