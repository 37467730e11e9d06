//! Interpolation.
//!
//! The server sends player positions at a low, irregular rate.
//! The client renders at its own rate and eases every remote entity's drawn
//! position toward the last reported one with exponential smoothing.

use std::time::Duration;

use platformer_shared::config::ClientConfig;

use crate::store::RemoteEntity;

/// Fraction of the remaining error closed per frame at the reference rate.
pub const DEFAULT_BLEND: f32 = 0.1;

/// Moves `entity.current` `blend` of the way to `entity.target`.
///
/// `blend` is clamped to $[0,1]$, so the drawn position never passes the
/// target. A converged entity is left untouched.
pub fn advance(entity: &mut RemoteEntity, blend: f32) {
    if entity.current == entity.target {
        return;
    }
    entity.current = entity.current.lerp(entity.target, blend);
}

/// Rescales a per-frame blend factor defined at `reference_hz` to a frame that
/// actually took `elapsed`, so smoothing speed does not depend on frame rate.
pub fn blend_for_elapsed(blend: f32, elapsed: Duration, reference_hz: u32) -> f32 {
    let blend = blend.clamp(0.0, 1.0);
    let frames = elapsed.as_secs_f32() * reference_hz as f32;
    1.0 - (1.0 - blend).powf(frames)
}

/// Per-frame blend policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpolator {
    pub blend: f32,
    /// `None` keeps the fixed per-frame factor and relies on the frame pacer.
    pub reference_hz: Option<u32>,
}

impl Default for Interpolator {
    fn default() -> Self {
        Self {
            blend: DEFAULT_BLEND,
            reference_hz: None,
        }
    }
}

impl Interpolator {
    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self {
            blend: cfg.interp_blend,
            reference_hz: cfg.interp_reference_hz,
        }
    }

    /// Blend factor to use for a frame of length `elapsed`.
    pub fn factor(&self, elapsed: Duration) -> f32 {
        match self.reference_hz {
            Some(hz) => blend_for_elapsed(self.blend, elapsed, hz),
            None => self.blend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platformer_shared::math::Vec2;

    fn entity(current: Vec2, target: Vec2) -> RemoteEntity {
        RemoteEntity {
            id: "peer".to_string(),
            current,
            target,
            username: None,
            score: None,
        }
    }

    #[test]
    fn error_shrinks_every_frame_without_overshoot() {
        let mut e = entity(Vec2::new(0.0, 0.0), Vec2::new(100.0, -40.0));
        let mut last_err = e.current.distance(e.target);
        for _ in 0..60 {
            advance(&mut e, 0.1);
            let err = e.current.distance(e.target);
            assert!(err < last_err, "error grew: {err} >= {last_err}");
            assert!(e.current.x <= 100.0 && e.current.y >= -40.0);
            last_err = err;
        }
        assert!(last_err < 0.5);
    }

    #[test]
    fn first_step_closes_blend_fraction() {
        let mut e = entity(Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0));
        advance(&mut e, 0.1);
        assert!((e.current.x - 10.0).abs() < 1e-4);
    }

    #[test]
    fn converged_entity_is_untouched() {
        let p = Vec2::new(12.5, 3.0);
        let mut e = entity(p, p);
        for _ in 0..10 {
            advance(&mut e, 0.1);
        }
        assert_eq!(e.current, p);
    }

    #[test]
    fn elapsed_scaling_matches_reference_rate() {
        let at_ref = blend_for_elapsed(0.1, Duration::from_secs_f32(1.0 / 60.0), 60);
        assert!((at_ref - 0.1).abs() < 1e-4);

        // Two reference frames in one step close as much as two separate steps.
        let double = blend_for_elapsed(0.1, Duration::from_secs_f32(2.0 / 60.0), 60);
        assert!((double - 0.19).abs() < 1e-4);

        assert_eq!(blend_for_elapsed(0.1, Duration::ZERO, 60), 0.0);
    }

    #[test]
    fn interpolator_defaults_to_fixed_factor() {
        let interp = Interpolator::default();
        assert_eq!(interp.factor(Duration::from_millis(100)), DEFAULT_BLEND);
    }
}
