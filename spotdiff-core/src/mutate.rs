//! Randomized pixel edits that turn an original image into its "modified"
//! counterpart, one [`Difference`] record per edit.
//!
//! Every edit stays fully inside the image: radii are capped to half the
//! shorter side and centres are pulled in so the whole disc or square fits.

use image::{Rgba, RgbaImage};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{LevelError, Result};

/// Smallest width/height accepted for mutation.
pub const MIN_IMAGE_SIDE: u32 = 16;

const SHAPE_RADIUS: (u32, u32) = (8, 20);
const COLOR_RADIUS: (u32, u32) = (25, 50);
const REMOVAL_RADIUS: (u32, u32) = (15, 30);

const WIDE_PLACEMENT: (f64, f64) = (0.1, 0.9);
const NARROW_PLACEMENT: (f64, f64) = (0.2, 0.8);

const SHAPE_ALPHA: u32 = 128;
const SEPIA: Rgba<u8> = Rgba([112, 66, 20, 255]);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceKind {
    AddShape,
    ColorChange,
    Removal,
}

impl DifferenceKind {
    fn details(self) -> &'static str {
        match self {
            DifferenceKind::AddShape => "A small shape was added.",
            DifferenceKind::ColorChange => "The color of an area was changed.",
            DifferenceKind::Removal => "A small detail was removed.",
        }
    }
}

/// One edit as the game frontend sees it: a hit zone of `radius` pixels
/// around `(x, y)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Difference {
    #[serde(rename = "type")]
    pub kind: DifferenceKind,
    pub x: u32,
    pub y: u32,
    pub radius: u32,
    #[serde(default)]
    pub details: String,
}

impl Difference {
    fn new(kind: DifferenceKind, x: u32, y: u32, radius: u32) -> Self {
        Self {
            kind,
            x,
            y,
            radius,
            details: kind.details().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifferenceSettings {
    pub min_differences: usize,
    pub max_differences: usize,
}

impl Default for DifferenceSettings {
    fn default() -> Self {
        Self {
            min_differences: 4,
            max_differences: 7,
        }
    }
}

impl DifferenceSettings {
    /// At least one edit, and a non-empty `min..=max` range.
    pub fn validate(&self) -> Result<()> {
        if self.min_differences == 0 {
            return Err(LevelError::Config(
                "min_differences must be at least 1".to_string(),
            ));
        }
        if self.min_differences > self.max_differences {
            return Err(LevelError::Config(format!(
                "min_differences ({}) is larger than max_differences ({})",
                self.min_differences, self.max_differences
            )));
        }
        Ok(())
    }
}

fn ensure_mutable(image: &RgbaImage) -> Result<()> {
    let (width, height) = image.dimensions();
    if width < MIN_IMAGE_SIDE || height < MIN_IMAGE_SIDE {
        return Err(LevelError::ImageTooSmall { width, height });
    }
    Ok(())
}

fn pick_radius<R: Rng>(rng: &mut R, image: &RgbaImage, range: (u32, u32)) -> u32 {
    let (width, height) = image.dimensions();
    let cap = width.min(height) / 2 - 1;
    rng.gen_range(range.0..=range.1).min(cap)
}

/// Picks a coordinate on an axis of `len` pixels inside the placement band,
/// keeping `[c - radius, c + radius]` on the axis.
fn pick_center<R: Rng>(rng: &mut R, len: u32, radius: u32, band: (f64, f64)) -> u32 {
    let lo = ((len as f64 * band.0) as u32).max(radius);
    let hi = ((len as f64 * band.1) as u32).min(len - 1 - radius);
    if lo > hi {
        return len / 2;
    }
    rng.gen_range(lo..=hi)
}

fn for_each_in_disc(x: u32, y: u32, radius: u32, mut f: impl FnMut(u32, u32)) {
    let r2 = (radius * radius) as i64;
    for py in y - radius..=y + radius {
        for px in x - radius..=x + radius {
            let dx = px as i64 - x as i64;
            let dy = py as i64 - y as i64;
            if dx * dx + dy * dy <= r2 {
                f(px, py);
            }
        }
    }
}

fn blend_over(dst: Rgba<u8>, src: [u8; 3], alpha: u32) -> Rgba<u8> {
    let inv = 255 - alpha;
    let mix = |s: u8, d: u8| ((s as u32 * alpha + d as u32 * inv + 127) / 255) as u8;
    let a = alpha + (dst[3] as u32 * inv + 127) / 255;
    Rgba([
        mix(src[0], dst[0]),
        mix(src[1], dst[1]),
        mix(src[2], dst[2]),
        a.min(255) as u8,
    ])
}

/// Draws a small half-transparent disc of a random colour.
pub fn add_small_shape<R: Rng>(image: &mut RgbaImage, rng: &mut R) -> Result<Difference> {
    ensure_mutable(image)?;
    let (width, height) = image.dimensions();
    let radius = pick_radius(rng, image, SHAPE_RADIUS);
    let x = pick_center(rng, width, radius, WIDE_PLACEMENT);
    let y = pick_center(rng, height, radius, WIDE_PLACEMENT);
    let color: [u8; 3] = [rng.gen(), rng.gen(), rng.gen()];

    for_each_in_disc(x, y, radius, |px, py| {
        let blended = blend_over(*image.get_pixel(px, py), color, SHAPE_ALPHA);
        image.put_pixel(px, py, blended);
    });

    Ok(Difference::new(DifferenceKind::AddShape, x, y, radius))
}

/// Recolours a disc with an opaque sepia tone.
pub fn change_color_area<R: Rng>(
    image: &mut RgbaImage,
    rng: &mut R,
) -> Result<Difference> {
    ensure_mutable(image)?;
    let (width, height) = image.dimensions();
    let radius = pick_radius(rng, image, COLOR_RADIUS);
    let x = pick_center(rng, width, radius, WIDE_PLACEMENT);
    let y = pick_center(rng, height, radius, WIDE_PLACEMENT);

    for_each_in_disc(x, y, radius, |px, py| image.put_pixel(px, py, SEPIA));

    Ok(Difference::new(DifferenceKind::ColorChange, x, y, radius))
}

fn clamp_source(center: u32, offset: i64, radius: u32, len: u32) -> u32 {
    let lo = radius as i64;
    let hi = (len - 1 - radius) as i64;
    (center as i64 + offset).clamp(lo, hi) as u32
}

/// Covers a square around the target with a patch cloned from `3 * radius`
/// away on each axis.
pub fn remove_small_detail<R: Rng>(
    image: &mut RgbaImage,
    rng: &mut R,
) -> Result<Difference> {
    ensure_mutable(image)?;
    let (width, height) = image.dimensions();
    let radius = pick_radius(rng, image, REMOVAL_RADIUS);
    let x = pick_center(rng, width, radius, NARROW_PLACEMENT);
    let y = pick_center(rng, height, radius, NARROW_PLACEMENT);

    let step = 3 * radius as i64;
    let dx = if rng.gen_bool(0.5) { step } else { -step };
    let dy = if rng.gen_bool(0.5) { step } else { -step };
    let source_x = clamp_source(x, dx, radius, width);
    let source_y = clamp_source(y, dy, radius, height);

    let side = 2 * radius;
    let patch =
        image::imageops::crop_imm(&*image, source_x - radius, source_y - radius, side, side)
            .to_image();
    for (px, py, pixel) in patch.enumerate_pixels() {
        image.put_pixel(x - radius + px, y - radius + py, *pixel);
    }

    Ok(Difference::new(DifferenceKind::Removal, x, y, radius))
}

fn apply_kind<R: Rng>(
    kind: DifferenceKind,
    image: &mut RgbaImage,
    rng: &mut R,
) -> Result<Difference> {
    match kind {
        DifferenceKind::AddShape => add_small_shape(image, rng),
        DifferenceKind::ColorChange => change_color_area(image, rng),
        DifferenceKind::Removal => remove_small_detail(image, rng),
    }
}

/// Applies between `min_differences` and `max_differences` random edits.
///
/// Recolouring is conspicuous, so it is only in the pool for about half of
/// the images. Edits may overlap.
pub fn apply_random_differences<R: Rng>(
    image: &mut RgbaImage,
    rng: &mut R,
    settings: &DifferenceSettings,
) -> Result<Vec<Difference>> {
    ensure_mutable(image)?;
    settings.validate()?;

    let count = rng.gen_range(settings.min_differences..=settings.max_differences);

    let mut pool = vec![DifferenceKind::AddShape, DifferenceKind::Removal];
    if rng.gen::<f64>() > 0.5 {
        pool.push(DifferenceKind::ColorChange);
    }

    let mut differences = Vec::with_capacity(count);
    for _ in 0..count {
        let kind = pool[rng.gen_range(0..pool.len())];
        differences.push(apply_kind(kind, image, rng)?);
    }
    Ok(differences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8, 255])
        })
    }

    fn covers(diff: &Difference, px: u32, py: u32) -> bool {
        let dx = px as i64 - diff.x as i64;
        let dy = py as i64 - diff.y as i64;
        let r = diff.radius as i64;
        match diff.kind {
            DifferenceKind::AddShape | DifferenceKind::ColorChange => dx * dx + dy * dy <= r * r,
            DifferenceKind::Removal => (-r..r).contains(&dx) && (-r..r).contains(&dy),
        }
    }

    fn in_bounds(diff: &Difference, width: u32, height: u32) -> bool {
        diff.x >= diff.radius
            && diff.y >= diff.radius
            && diff.x + diff.radius < width
            && diff.y + diff.radius < height
    }

    #[test]
    fn every_changed_pixel_is_inside_a_recorded_difference() {
        for seed in 0..40u64 {
            let original = gradient(240, 180);
            let mut modified = original.clone();
            let mut rng = StdRng::seed_from_u64(seed);
            let diffs =
                apply_random_differences(&mut modified, &mut rng, &DifferenceSettings::default())
                    .unwrap();

            for (px, py, pixel) in modified.enumerate_pixels() {
                if pixel != original.get_pixel(px, py) {
                    assert!(
                        diffs.iter().any(|d| covers(d, px, py)),
                        "seed {seed}: pixel ({px}, {py}) changed outside every difference"
                    );
                }
            }
        }
    }

    #[test]
    fn regions_stay_inside_small_images() {
        for seed in 0..200u64 {
            let mut img = gradient(MIN_IMAGE_SIDE, 40);
            let mut rng = StdRng::seed_from_u64(seed);
            let diffs =
                apply_random_differences(&mut img, &mut rng, &DifferenceSettings::default())
                    .unwrap();
            for d in &diffs {
                assert!(in_bounds(d, MIN_IMAGE_SIDE, 40), "seed {seed}: {d:?}");
            }
        }
    }

    #[test]
    fn same_seed_reproduces_records_and_pixels() {
        let settings = DifferenceSettings::default();
        let mut a = gradient(300, 200);
        let mut b = gradient(300, 200);
        let da = apply_random_differences(&mut a, &mut StdRng::seed_from_u64(99), &settings).unwrap();
        let db = apply_random_differences(&mut b, &mut StdRng::seed_from_u64(99), &settings).unwrap();
        assert_eq!(da, db);
        assert_eq!(a.as_raw(), b.as_raw());

        let mut c = gradient(300, 200);
        let dc = apply_random_differences(&mut c, &mut StdRng::seed_from_u64(100), &settings).unwrap();
        assert_ne!(da, dc);
    }

    #[test]
    fn record_count_follows_settings() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..30 {
            let mut img = gradient(128, 128);
            let diffs =
                apply_random_differences(&mut img, &mut rng, &DifferenceSettings::default())
                    .unwrap();
            assert!((4..=7).contains(&diffs.len()));
        }

        let exact = DifferenceSettings {
            min_differences: 5,
            max_differences: 5,
        };
        let mut img = gradient(128, 128);
        let diffs = apply_random_differences(&mut img, &mut rng, &exact).unwrap();
        assert_eq!(diffs.len(), 5);
    }

    #[test]
    fn color_change_paints_sepia_at_the_center() {
        let mut img = gradient(400, 400);
        let diff = change_color_area(&mut img, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(diff.kind, DifferenceKind::ColorChange);
        assert!((25..=50).contains(&diff.radius));
        assert_eq!(*img.get_pixel(diff.x, diff.y), SEPIA);
        assert!(in_bounds(&diff, 400, 400));
    }

    #[test]
    fn shape_radius_and_placement_match_the_wide_band() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let mut img = gradient(500, 300);
            let diff = add_small_shape(&mut img, &mut rng).unwrap();
            assert!((8..=20).contains(&diff.radius));
            assert!((50..=450).contains(&diff.x));
            assert!((30..=270).contains(&diff.y));
            assert_eq!(diff.details, "A small shape was added.");
        }
    }

    #[test]
    fn removal_stays_in_the_narrow_band() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let mut img = gradient(500, 500);
            let diff = remove_small_detail(&mut img, &mut rng).unwrap();
            assert!((15..=30).contains(&diff.radius));
            assert!((100..=400).contains(&diff.x));
            assert!((100..=400).contains(&diff.y));
        }
    }

    #[test]
    fn settings_need_a_non_empty_range() {
        assert!(DifferenceSettings::default().validate().is_ok());
        for (min, max) in [(0, 3), (6, 5)] {
            let settings = DifferenceSettings {
                min_differences: min,
                max_differences: max,
            };
            assert!(matches!(settings.validate(), Err(LevelError::Config(_))));
            let mut img = gradient(64, 64);
            assert!(apply_random_differences(&mut img, &mut StdRng::seed_from_u64(1), &settings)
                .is_err());
            assert_eq!(img, gradient(64, 64));
        }
    }

    #[test]
    fn rejects_tiny_images() {
        let mut img = gradient(12, 100);
        let err = apply_random_differences(
            &mut img,
            &mut StdRng::seed_from_u64(0),
            &DifferenceSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LevelError::ImageTooSmall { width: 12, height: 100 }));
    }

    #[test]
    fn serializes_with_frontend_field_names() {
        let diff = Difference::new(DifferenceKind::ColorChange, 10, 20, 30);
        let value = serde_json::to_value(&diff).unwrap();
        assert_eq!(value["type"], "color_change");
        assert_eq!(value["x"], 10);
        assert_eq!(value["radius"], 30);
    }
}
