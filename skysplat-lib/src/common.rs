use std::f64::consts::{PI, TAU};

#[inline]
pub(crate) fn golden_angle() -> f64 {
    PI * (3.0 - 5.0_f64.sqrt())
}

#[inline]
pub(crate) fn azimuth(x: f64, z: f64) -> f64 {
    let phi = z.atan2(x);
    if phi < 0.0 {
        phi + TAU
    } else {
        phi
    }
}

#[inline]
pub(crate) fn luminance(normalized: [f64; 3], scale: f64) -> [f32; 3] {
    [
        (normalized[0] * scale) as f32,
        (normalized[1] * scale) as f32,
        (normalized[2] * scale) as f32,
    ]
}

#[inline]
pub(crate) fn length3(v: [f32; 3]) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

#[inline]
pub(crate) fn next_line<'b>(buffer: &'b [u8], offset: &mut usize) -> Option<&'b [u8]> {
    if *offset >= buffer.len() {
        return None;
    }
    let start = *offset;

    match memchr::memchr(b'\n', &buffer[*offset..]) {
        Some(pos) => {
            *offset = start + pos + 1;
            Some(&buffer[start..start + pos])
        }
        None => {
            *offset = buffer.len();
            Some(&buffer[start..])
        }
    }
}
