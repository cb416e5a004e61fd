use std::str::FromStr;

pub const DEFAULT_SPHERE_SAMPLES: usize = 100_000;
pub const DEFAULT_SPHERE_RADIUS: f64 = 100.0;
pub const DEFAULT_PLANE_SAMPLES: usize = 40_000;
pub const DEFAULT_PLANE_DIAMETER: f64 = 200.0;
pub const MAX_SAMPLES: usize = 50_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct SphereParams {
    pub samples: usize,
    pub radius: f64,
    pub seed: Option<u64>,
    // Legacy row order: the top of the sphere reads the bottom image row.
    pub flip_vertical: bool,
}

impl Default for SphereParams {
    fn default() -> Self {
        SphereParams {
            samples: DEFAULT_SPHERE_SAMPLES,
            radius: DEFAULT_SPHERE_RADIUS,
            seed: None,
            flip_vertical: false,
        }
    }
}

impl SphereParams {
    pub fn from_raw(samples: Option<&str>, radius: Option<&str>) -> Self {
        SphereParams {
            samples: parse_or_default(samples, DEFAULT_SPHERE_SAMPLES, "sample count", |n: &usize| {
                (2..=MAX_SAMPLES).contains(n)
            }),
            radius: parse_or_default(radius, DEFAULT_SPHERE_RADIUS, "radius", |r: &f64| {
                r.is_finite() && *r > 0.0
            }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaneParams {
    pub samples: usize,
    pub diameter: f64,
    pub seed: Option<u64>,
}

impl Default for PlaneParams {
    fn default() -> Self {
        PlaneParams {
            samples: DEFAULT_PLANE_SAMPLES,
            diameter: DEFAULT_PLANE_DIAMETER,
            seed: None,
        }
    }
}

impl PlaneParams {
    pub fn from_raw(samples: Option<&str>, diameter: Option<&str>) -> Self {
        PlaneParams {
            samples: parse_or_default(samples, DEFAULT_PLANE_SAMPLES, "sample count", |n: &usize| {
                (1..=MAX_SAMPLES).contains(n)
            }),
            diameter: parse_or_default(diameter, DEFAULT_PLANE_DIAMETER, "diameter", |d: &f64| {
                d.is_finite() && *d > 0.0
            }),
            ..Default::default()
        }
    }
}

fn parse_or_default<T, F>(raw: Option<&str>, default: T, what: &str, valid: F) -> T
where
    T: FromStr + Copy + std::fmt::Display,
    F: Fn(&T) -> bool,
{
    let raw = match raw.map(str::trim) {
        None | Some("") => return default,
        Some(raw) => raw,
    };
    match raw.parse::<T>() {
        Ok(v) if valid(&v) => v,
        _ => {
            log::warn!("Invalid {} '{}', using default {}", what, raw, default);
            default
        }
    }
}

// Accepts `r,g,b`, `r g b`, `#rrggbb` and `rrggbb`.
pub fn parse_rgb(input: &str) -> Option<[u8; 3]> {
    let input = input.trim();

    let decimal = |parts: Vec<&str>| -> Option<[u8; 3]> {
        if parts.len() != 3 {
            return None;
        }
        let mut out = [0u8; 3];
        for (slot, part) in out.iter_mut().zip(parts) {
            *slot = part.trim().parse::<i64>().ok()?.clamp(0, 255) as u8;
        }
        Some(out)
    };

    if input.contains(',') {
        return decimal(input.split(',').collect());
    }
    if input.contains(char::is_whitespace) {
        return decimal(input.split_whitespace().collect());
    }

    let hex = input.strip_prefix('#').unwrap_or(input);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = SphereParams::default();
        assert_eq!((s.samples, s.radius), (100_000, 100.0));
        let p = PlaneParams::default();
        assert_eq!((p.samples, p.diameter), (40_000, 200.0));
    }

    #[test]
    fn invalid_input_falls_back() {
        let s = SphereParams::from_raw(Some("lots"), Some("-3"));
        assert_eq!(s, SphereParams::default());
        let s = SphereParams::from_raw(Some("1"), Some("inf"));
        assert_eq!(s, SphereParams::default());
        let p = PlaneParams::from_raw(Some(""), None);
        assert_eq!(p, PlaneParams::default());
    }

    #[test]
    fn valid_input_is_kept() {
        let s = SphereParams::from_raw(Some(" 500 "), Some("12.5"));
        assert_eq!((s.samples, s.radius), (500, 12.5));
        let p = PlaneParams::from_raw(Some("9"), Some("2"));
        assert_eq!((p.samples, p.diameter), (9, 2.0));
    }

    #[test]
    fn oversized_sample_count_falls_back() {
        let s = SphereParams::from_raw(Some("4611686018427387904"), None);
        assert_eq!(s.samples, DEFAULT_SPHERE_SAMPLES);
        let p = PlaneParams::from_raw(Some(&(MAX_SAMPLES + 1).to_string()), None);
        assert_eq!(p.samples, DEFAULT_PLANE_SAMPLES);
        let p = PlaneParams::from_raw(Some(&MAX_SAMPLES.to_string()), None);
        assert_eq!(p.samples, MAX_SAMPLES);
    }

    #[test]
    fn rgb_formats() {
        assert_eq!(parse_rgb("255,0,0"), Some([255, 0, 0]));
        assert_eq!(parse_rgb("0, 300, -4"), Some([0, 255, 0]));
        assert_eq!(parse_rgb("10 20 30"), Some([10, 20, 30]));
        assert_eq!(parse_rgb("#00FF7f"), Some([0, 255, 127]));
        assert_eq!(parse_rgb("abcdef"), Some([0xab, 0xcd, 0xef]));
        assert_eq!(parse_rgb("1,2"), None);
        assert_eq!(parse_rgb("#12345"), None);
        assert_eq!(parse_rgb("red"), None);
    }
}
