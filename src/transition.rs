use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::surface::{MeshKey, MeshPose};

/// Easing for mesh transitions, chosen in the map config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Easing {
    Linear,
    /// Cubic, symmetric.
    #[default]
    EaseInOut,
    /// Cubic, decelerating.
    EaseOut,
}

struct Tween {
    from: MeshPose,
    to: MeshPose,
    start: Instant,
    duration: Duration,
    easing: Easing,
}

impl Tween {
    fn finished(&self, now: Instant) -> bool {
        self.duration.is_zero() || now.duration_since(self.start) >= self.duration
    }
}

/// Time-driven pose interpolation keyed by mesh.
///
/// Tweens run on wall-clock time. Each frame the coordinator samples every
/// key and writes the pose to the displayed surface; sampling only reads
/// tween state, never model totals.
#[derive(Default)]
pub struct PoseAnimator {
    tweens: HashMap<MeshKey, Tween>,
}

impl PoseAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) a tween. Overwrites any tween on the same key.
    pub fn start(
        &mut self,
        key: MeshKey,
        from: MeshPose,
        to: MeshPose,
        duration: Duration,
        easing: Easing,
        now: Instant,
    ) {
        self.tweens.insert(
            key,
            Tween {
                from,
                to,
                start: now,
                duration,
                easing,
            },
        );
    }

    /// Current pose, or the target once complete. None if the key has no tween.
    pub fn get(&self, key: MeshKey, now: Instant) -> Option<MeshPose> {
        let tween = self.tweens.get(&key)?;
        if tween.finished(now) {
            return Some(tween.to);
        }
        let t = now.duration_since(tween.start).as_secs_f64() / tween.duration.as_secs_f64();
        Some(tween.from.lerp(&tween.to, ease(t, tween.easing)))
    }

    /// True while any tween is still running.
    pub fn any_active(&self, now: Instant) -> bool {
        self.tweens.values().any(|t| !t.finished(now))
    }

    /// Current pose of every tween, in no particular order.
    pub fn sample_all(&self, now: Instant) -> Vec<(MeshKey, MeshPose)> {
        self.tweens
            .keys()
            .filter_map(|&k| self.get(k, now).map(|p| (k, p)))
            .collect()
    }

    /// Drop every tween and return their target poses.
    pub fn finish_all(&mut self) -> Vec<(MeshKey, MeshPose)> {
        self.tweens.drain().map(|(k, t)| (k, t.to)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }
}

/// Eased progress for linear progress `t` in [0, 1].
fn ease(t: f64, easing: Easing) -> f64 {
    match easing {
        Easing::Linear => t,
        Easing::EaseInOut if t < 0.5 => 4.0 * t.powi(3),
        Easing::EaseInOut => 1.0 - (2.0 - 2.0 * t).powi(3) / 2.0,
        Easing::EaseOut => 1.0 - (1.0 - t).powi(3),
    }
}
