//! Labeled AOI mask rasters.
//!
//! A mask image encodes region membership in its pixel values rather than
//! photographic content: each nonzero value is a region code, zero is
//! background.

use std::collections::{BTreeSet, HashMap, HashSet};

use image::GrayImage;
use log::warn;

/// A named facial region encoded in an AOI mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    RightEye,
    LeftEye,
    Nose,
    Mouth,
}

impl Region {
    /// Classification checks regions in this order; since regions are
    /// disjoint by construction the order only matters on malformed masks,
    /// where it keeps results deterministic.
    pub const ALL: [Region; 4] = [Region::RightEye, Region::LeftEye, Region::Nose, Region::Mouth];

    /// The fixed pixel-value vocabulary used by the mask images.
    pub fn from_code(code: u8) -> Option<Region> {
        match code {
            64 => Some(Region::RightEye),
            128 => Some(Region::LeftEye),
            191 => Some(Region::Nose),
            255 => Some(Region::Mouth),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Region::RightEye => 64,
            Region::LeftEye => 128,
            Region::Nose => 191,
            Region::Mouth => 255,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::RightEye => "rightEye",
            Region::LeftEye => "leftEye",
            Region::Nose => "nose",
            Region::Mouth => "mouth",
        }
    }
}

/// Label attached to a single gaze sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AoiLabel {
    Region(Region),
    /// The sample fell on no labeled region.
    None,
    /// The trial's stimulus has no AOI mask on disk at all.
    Missing,
}

impl AoiLabel {
    /// The value written into the `AOI` table column. `Missing` becomes an
    /// empty field, the TSV equivalent of a null.
    pub fn as_tsv_field(&self) -> &'static str {
        match self {
            AoiLabel::Region(region) => region.as_str(),
            AoiLabel::None => "none",
            AoiLabel::Missing => "",
        }
    }
}

/// One stimulus's AOI regions, ready for membership queries over scaled
/// display coordinates.
#[derive(Debug, Clone)]
pub struct AoiMask {
    scale_factor: f64,
    regions: HashMap<Region, HashSet<(i64, i64)>>,
    unrecognized: Vec<u8>,
}

impl AoiMask {
    /// Build from a single-channel raster.
    ///
    /// Every distinct nonzero pixel value becomes a region via the code
    /// table; values outside the table are reported once each and left out
    /// of the region set. Construction always succeeds, even for an
    /// all-background raster.
    pub fn from_image(image: &GrayImage, scale_factor: f64) -> Self {
        let codes: BTreeSet<u8> = image
            .pixels()
            .map(|p| p[0])
            .filter(|&value| value > 0)
            .collect();

        let mut regions: HashMap<Region, HashSet<(i64, i64)>> = HashMap::new();
        let mut unrecognized = Vec::new();
        for code in codes {
            match Region::from_code(code) {
                Some(region) => {
                    regions.insert(region, HashSet::new());
                }
                None => {
                    warn!("AOI image has value of {code}, not found in region key");
                    unrecognized.push(code);
                }
            }
        }

        // (x, y) is (column, row): the raster is stored row-major
        for (x, y, pixel) in image.enumerate_pixels() {
            if let Some(region) = Region::from_code(pixel[0]) {
                if let Some(coords) = regions.get_mut(&region) {
                    coords.insert((x as i64, y as i64));
                }
            }
        }

        Self {
            scale_factor,
            regions,
            unrecognized,
        }
    }

    /// Which region, if any, does the display-space point (x, y) fall in?
    ///
    /// Coordinates are scaled into mask space and rounded half away from
    /// zero (`f64::round`); membership is exact containment of the rounded
    /// pixel, with no tolerance. Out-of-range points simply match nothing.
    pub fn classify(&self, x: f64, y: f64) -> AoiLabel {
        let scaled_x = (x * self.scale_factor).round() as i64;
        let scaled_y = (y * self.scale_factor).round() as i64;

        for region in Region::ALL {
            if let Some(coords) = self.regions.get(&region) {
                if coords.contains(&(scaled_x, scaled_y)) {
                    return AoiLabel::Region(region);
                }
            }
        }
        AoiLabel::None
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn region_coords(&self, region: Region) -> Option<&HashSet<(i64, i64)>> {
        self.regions.get(&region)
    }

    /// Distinct mask values that matched no known region code, ascending.
    pub fn unrecognized_codes(&self) -> &[u8] {
        &self.unrecognized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster(width: u32, height: u32, pixels: &[(u32, u32, u8)]) -> GrayImage {
        let mut image = GrayImage::new(width, height);
        for &(x, y, value) in pixels {
            image.put_pixel(x, y, image::Luma([value]));
        }
        image
    }

    #[test]
    fn classifies_labeled_and_background_pixels() {
        let image = raster(4, 4, &[(1, 1, 64), (2, 2, 128)]);
        let mask = AoiMask::from_image(&image, 1.0);

        assert_eq!(mask.classify(1.0, 1.0), AoiLabel::Region(Region::RightEye));
        assert_eq!(mask.classify(2.0, 2.0), AoiLabel::Region(Region::LeftEye));
        assert_eq!(mask.classify(0.0, 0.0), AoiLabel::None);
        assert_eq!(mask.classify(3.0, 3.0), AoiLabel::None);
    }

    #[test]
    fn scaling_rounds_half_away_from_zero() {
        let image = raster(8, 8, &[(2, 2, 191), (3, 3, 191)]);
        let mask = AoiMask::from_image(&image, 0.5);

        // (4, 4) scales exactly onto (2, 2)
        assert_eq!(mask.classify(4.0, 4.0), AoiLabel::Region(Region::Nose));
        // (5, 5) scales to (2.5, 2.5); half away from zero pins it to (3, 3)
        assert_eq!(mask.classify(5.0, 5.0), AoiLabel::Region(Region::Nose));
        // (4.8, 4.8) scales to (2.4, 2.4) and rounds down to (2, 2)
        assert_eq!(mask.classify(4.8, 4.8), AoiLabel::Region(Region::Nose));
    }

    #[test]
    fn out_of_range_points_classify_as_none() {
        let image = raster(4, 4, &[(1, 1, 64)]);
        let mask = AoiMask::from_image(&image, 1.0);

        assert_eq!(mask.classify(-50.0, 2.0), AoiLabel::None);
        assert_eq!(mask.classify(2.0, 4000.0), AoiLabel::None);
    }

    #[test]
    fn classify_is_deterministic() {
        let image = raster(6, 6, &[(1, 1, 64), (4, 4, 255)]);
        let mask = AoiMask::from_image(&image, 1.0);

        let first = mask.classify(4.0, 4.0);
        for _ in 0..10 {
            assert_eq!(mask.classify(4.0, 4.0), first);
        }
    }

    #[test]
    fn unrecognized_codes_are_excluded_but_construction_succeeds() {
        let image = raster(4, 4, &[(0, 0, 200), (1, 0, 200), (1, 1, 64)]);
        let mask = AoiMask::from_image(&image, 1.0);

        assert_eq!(mask.region_count(), 1);
        assert_eq!(mask.unrecognized_codes(), &[200]);
        assert_eq!(mask.classify(0.0, 0.0), AoiLabel::None);
        assert_eq!(mask.classify(1.0, 1.0), AoiLabel::Region(Region::RightEye));
    }

    #[test]
    fn empty_raster_builds_empty_mask() {
        let image = raster(4, 4, &[]);
        let mask = AoiMask::from_image(&image, 1.0);

        assert_eq!(mask.region_count(), 0);
        assert_eq!(mask.classify(1.0, 1.0), AoiLabel::None);
    }

    #[test]
    fn region_sets_are_disjoint_and_cover_all_nonzero_pixels() {
        let image = raster(
            5,
            5,
            &[
                (0, 1, Region::RightEye.code()),
                (1, 1, Region::RightEye.code()),
                (3, 1, Region::LeftEye.code()),
                (2, 2, Region::Nose.code()),
                (1, 4, Region::Mouth.code()),
                (2, 4, Region::Mouth.code()),
                (3, 4, Region::Mouth.code()),
            ],
        );
        let mask = AoiMask::from_image(&image, 1.0);

        let mut seen = HashSet::new();
        let mut total = 0;
        for region in Region::ALL {
            let coords = mask.region_coords(region).unwrap();
            total += coords.len();
            for coord in coords {
                assert!(seen.insert(*coord), "{coord:?} appears in two regions");
            }
        }

        let nonzero = image.pixels().filter(|p| p[0] > 0).count();
        assert_eq!(total, nonzero);

        for (x, y, pixel) in image.enumerate_pixels() {
            if pixel[0] > 0 {
                assert!(seen.contains(&(x as i64, y as i64)));
            }
        }
    }
}
