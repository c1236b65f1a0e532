//! Effect Builder
//!
//! Turns raw detector rectangles into validated, styled draw specs.
//! Regions are clamped to the screen and dropped when they come out too
//! small to matter; intensity tiers stack treatments from a flat tint up
//! to an opaque fill with dense pixelation, noise, and a border.

use rand::Rng;

use super::types::{BlurIntensity, BlurStyle, FullScreenSpec, RegionEffect};
use crate::constants;
use crate::logic::classify::Rect;
use crate::logic::decision::{ContentCategory, Severity};

/// Blur fill color (dark neutral).
const BLUR_TINT_ARGB: u32 = 0xFF1C1B1F;

/// Accent for standard full-screen covers.
const COVER_ACCENT_ARGB: u32 = 0xFFF2B8B5;

/// Accent for region-count escalated covers (more severe treatment).
const COVER_ACCENT_SEVERE_ARGB: u32 = 0xFFB3261E;

// ============================================================================
// REGION VALIDATION
// ============================================================================

/// Clamp every region to the screen and drop anything that ends up smaller
/// than the minimum edge. The output is always fully contained in
/// [0, screen_w] x [0, screen_h].
pub fn validate_regions(regions: &[Rect], screen_w: i32, screen_h: i32) -> Vec<Rect> {
    regions
        .iter()
        .map(|r| r.clamped(screen_w, screen_h))
        .filter(|r| r.width() >= constants::MIN_REGION_PX && r.height() >= constants::MIN_REGION_PX)
        .collect()
}

// ============================================================================
// REGION EFFECTS
// ============================================================================

/// Build the per-region draw specs for already-validated regions.
pub fn build_region_effects<R: Rng>(
    regions: &[Rect],
    intensity: BlurIntensity,
    style: BlurStyle,
    rng: &mut R,
) -> Vec<RegionEffect> {
    regions
        .iter()
        .map(|&region| build_one(region, intensity, style, rng))
        .collect()
}

fn build_one<R: Rng>(
    region: Rect,
    intensity: BlurIntensity,
    style: BlurStyle,
    rng: &mut R,
) -> RegionEffect {
    let alpha = match intensity {
        BlurIntensity::Light => 0.45,
        BlurIntensity::Medium => 0.65,
        BlurIntensity::Strong => 0.85,
        BlurIntensity::Maximum => 1.0,
    };

    let pixel_block = match (intensity, style) {
        (BlurIntensity::Light, _) => None,
        (_, BlurStyle::Solid) => None,
        (BlurIntensity::Maximum, _) => Some(8),
        (_, BlurStyle::Pixelate) => Some(16),
        (_, BlurStyle::Noise) => Some(24),
    };

    let noise_dots = if intensity >= BlurIntensity::Strong && style != BlurStyle::Solid {
        let area = (region.width() * region.height()).max(0) as u32;
        let divisor = if intensity == BlurIntensity::Maximum { 150 } else { 300 };
        let count = (area / divisor).min(512);
        (0..count)
            .map(|_| {
                (
                    rng.gen_range(region.left..region.right),
                    rng.gen_range(region.top..region.bottom),
                )
            })
            .collect()
    } else {
        Vec::new()
    };

    RegionEffect {
        region,
        tint_argb: BLUR_TINT_ARGB,
        alpha,
        pixel_block,
        noise_dots,
        border: intensity == BlurIntensity::Maximum,
    }
}

// ============================================================================
// FULL-SCREEN COVER
// ============================================================================

/// Build the full-screen treatment. Region-triggered covers get the denser
/// pattern and the harsher accent.
pub fn build_full_screen(
    category: ContentCategory,
    severity: Severity,
    region_triggered: bool,
    reflection_seconds: u32,
) -> FullScreenSpec {
    let mut density = 0.35 + 0.12 * severity.level() as f32;
    if region_triggered {
        density += 0.2;
    }

    FullScreenSpec {
        category,
        severity,
        region_triggered,
        base_alpha: 0.92,
        line_spacing: if severity.is_high() { 48 } else { 72 },
        pattern_density: density.min(1.0),
        accent_argb: if region_triggered {
            COVER_ACCENT_SEVERE_ARGB
        } else {
            COVER_ACCENT_ARGB
        },
        reflection_seconds,
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const W: i32 = 1080;
    const H: i32 = 1920;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_regions_always_inside_screen() {
        let raw = vec![
            Rect::new(-100, -100, 300, 300),
            Rect::new(900, 1800, 2000, 3000),
            Rect::new(10, 10, 500, 500),
        ];

        for r in validate_regions(&raw, W, H) {
            assert!(r.left >= 0 && r.top >= 0);
            assert!(r.right <= W && r.bottom <= H);
            assert!(!r.is_empty());
        }
    }

    #[test]
    fn test_tiny_regions_are_dropped() {
        let raw = vec![
            Rect::new(0, 0, 19, 100),   // too narrow
            Rect::new(0, 0, 100, 19),   // too short
            Rect::new(0, 0, 20, 20),    // exactly minimum
            Rect::new(-500, 0, -10, 50) // fully off-screen
        ];
        let validated = validate_regions(&raw, W, H);
        assert_eq!(validated, vec![Rect::new(0, 0, 20, 20)]);
    }

    #[test]
    fn test_clamping_can_shrink_below_minimum() {
        // A large region hanging mostly off-screen clamps down to a sliver
        // and must be dropped, not drawn.
        let raw = vec![Rect::new(-990, 0, 10, 500)];
        assert!(validate_regions(&raw, W, H).is_empty());
    }

    #[test]
    fn test_light_tier_is_tint_only() {
        let region = Rect::new(0, 0, 200, 200);
        let effects =
            build_region_effects(&[region], BlurIntensity::Light, BlurStyle::Pixelate, &mut rng());

        assert_eq!(effects.len(), 1);
        assert!(effects[0].pixel_block.is_none());
        assert!(effects[0].noise_dots.is_empty());
        assert!(!effects[0].border);
        assert!(effects[0].alpha < 0.5);
    }

    #[test]
    fn test_tiers_stack_up_to_maximum() {
        let region = Rect::new(0, 0, 200, 200);
        let mut r = rng();

        let medium = build_one(region, BlurIntensity::Medium, BlurStyle::Pixelate, &mut r);
        assert!(medium.pixel_block.is_some());
        assert!(medium.noise_dots.is_empty());

        let strong = build_one(region, BlurIntensity::Strong, BlurStyle::Pixelate, &mut r);
        assert!(!strong.noise_dots.is_empty());
        assert!(!strong.border);

        let maximum = build_one(region, BlurIntensity::Maximum, BlurStyle::Pixelate, &mut r);
        assert_eq!(maximum.alpha, 1.0);
        assert!(maximum.border);
        assert!(maximum.noise_dots.len() > strong.noise_dots.len());
    }

    #[test]
    fn test_noise_dots_stay_inside_region() {
        let region = Rect::new(100, 200, 400, 600);
        let effect = build_one(region, BlurIntensity::Maximum, BlurStyle::Noise, &mut rng());

        for (x, y) in effect.noise_dots {
            assert!(x >= region.left && x < region.right);
            assert!(y >= region.top && y < region.bottom);
        }
    }

    #[test]
    fn test_solid_style_never_pixelates() {
        let region = Rect::new(0, 0, 200, 200);
        let effect = build_one(region, BlurIntensity::Strong, BlurStyle::Solid, &mut rng());
        assert!(effect.pixel_block.is_none());
        assert!(effect.noise_dots.is_empty());
    }

    #[test]
    fn test_region_triggered_cover_is_more_severe() {
        let standard =
            build_full_screen(ContentCategory::Nsfw, Severity::High, false, 5);
        let escalated =
            build_full_screen(ContentCategory::Nsfw, Severity::High, true, 5);

        assert!(escalated.pattern_density > standard.pattern_density);
        assert_ne!(escalated.accent_argb, standard.accent_argb);
    }

    #[test]
    fn test_pattern_density_is_bounded() {
        let spec = build_full_screen(ContentCategory::Mixed, Severity::Critical, true, 5);
        assert!(spec.pattern_density <= 1.0);
    }
}
