//! Stick and trigger signal math
//!
//! Every backend reports raw values in its own range. These functions bring
//! them into the 0..=255 pad range, apply thresholds and deadzones, and
//! optionally push round stick gates towards a square.

/// Raw value ranges of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisLimits {
    pub thumb_max: i32,
    pub trigger_min: i32,
    pub trigger_max: i32,
}

impl AxisLimits {
    /// Byte-sized sticks and triggers (DS4, evdev after scaling, keyboard)
    pub const BYTE: Self = Self {
        thumb_max: 255,
        trigger_min: 0,
        trigger_max: 255,
    };

    /// Signed 16-bit sticks, byte triggers (XInput, gilrs)
    pub const WIDE: Self = Self {
        thumb_max: 32767,
        trigger_min: 0,
        trigger_max: 255,
    };
}

impl Default for AxisLimits {
    fn default() -> Self {
        Self::BYTE
    }
}

/// Map `raw` from `[min, max]` to `[0, 255]`
///
/// Out-of-range input is clamped first; an empty range yields 0.
pub fn scale_stick_input(raw: i32, min: i32, max: i32) -> f32 {
    if max <= min {
        return 0.0;
    }
    let clamped = raw.clamp(min, max);
    (clamped - min) as f32 * 255.0 / (max - min) as f32
}

/// Map `raw` from `[min, max]` to `[-255, 255]`
pub fn scale_stick_input2(raw: i32, min: i32, max: i32) -> f32 {
    if max <= min {
        return 0.0;
    }
    let clamped = raw.clamp(min, max);
    let val = (clamped - min) as f32 / (max - min) as f32;
    510.0 * val - 255.0
}

/// Scale a directed (one-sided) value past `threshold` to `[0, 255]`
pub fn normalize_directed_input(raw: i32, threshold: i32, maximum: i32) -> f32 {
    if threshold >= maximum || maximum <= 0 {
        return 0.0;
    }
    let val = raw.clamp(0, maximum) as f32 / maximum as f32;
    if threshold <= 0 {
        return 255.0 * val;
    }
    let thresh = threshold as f32 / maximum as f32;
    (255.0 * ((val - thresh) / (1.0 - thresh)).min(1.0)).max(0.0)
}

/// Apply the trigger threshold and rescale so the remaining travel spans the
/// full range
pub fn normalize_trigger_input(value: u16, threshold: i32, limits: &AxisLimits) -> u16 {
    let value = i32::from(value);
    if value <= threshold || threshold >= limits.trigger_max {
        return 0;
    }
    if threshold <= limits.trigger_min {
        return scale_stick_input(value, limits.trigger_min, limits.trigger_max) as u16;
    }
    let val = (limits.trigger_max as f32 * (value - threshold) as f32
        / (limits.trigger_max - threshold) as f32) as i32;
    scale_stick_input(val, limits.trigger_min, limits.trigger_max) as u16
}

/// Scale one stick half by `multiplier` percent, then either map it straight
/// to `[0, 255]` or apply the deadzone
pub fn normalize_stick_input(
    raw: u16,
    threshold: i32,
    multiplier: i32,
    ignore_threshold: bool,
    limits: &AxisLimits,
) -> u16 {
    let scaled = (multiplier as f32 * f32::from(raw) / 100.0) as i32;
    if ignore_threshold {
        scale_stick_input(scaled, 0, limits.thumb_max) as u16
    } else {
        normalize_directed_input(scaled, threshold, limits.thumb_max) as u16
    }
}

/// Map `[-1, 1]` to `[0, 255]`
pub fn convert_axis(value: f32) -> u16 {
    clamp_0_to_255((value + 1.0) * 127.5)
}

/// Radial deadzone on a signed stick pair (`x`, `y` in `[-255, 255]`)
///
/// Inside the deadzone the magnitude ramps from 0 to 13%, outside it ramps
/// from 13% to full, so small motions past the deadzone still register.
pub fn normalize_stick_deadzone(x: i32, y: i32, deadzone: u32, limits: &AxisLimits) -> (u16, u16) {
    let dz_range = if limits.thumb_max == 0 {
        0.0
    } else {
        deadzone as f32 / limits.thumb_max.unsigned_abs() as f32
    };

    let mut fx = x as f32 / 255.0;
    let mut fy = y as f32 / 255.0;

    if dz_range > 0.0 {
        let mag = (fx * fx + fy * fy).sqrt().min(1.0);
        if mag <= 0.0 {
            return (convert_axis(fx), convert_axis(fy));
        }
        let pos = if mag > dz_range {
            lerp(0.13, 1.0, (mag - dz_range) / (1.0 - dz_range))
        } else {
            lerp(0.0, 0.13, mag / dz_range)
        };
        let scale = pos / mag;
        fx *= scale;
        fy *= scale;
    }

    (convert_axis(fx), convert_axis(fy))
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

/// Stretch a point of a round stick gate towards a squircle
///
/// `factor` is the squircle exponent times 1000; 0 leaves the point as is.
pub fn convert_to_squircle_point(x: u16, y: u16, factor: i32) -> (u16, u16) {
    if factor == 0 {
        return (x.min(255), y.min(255));
    }
    let fx = (f32::from(x) - 127.5) / 127.5;
    let fy = (f32::from(y) - 127.5) / 127.5;

    let angle = fy.atan2(fx);
    let r = (fx * fx + fy * fy).sqrt();

    let new_len = (1.0 + (2.0 * angle).sin().powi(2) / (factor as f32 / 1000.0)) * r;

    let new_x = clamp_0_to_255((new_len * angle.cos() + 1.0) * 127.5);
    let new_y = clamp_0_to_255((new_len * angle.sin() + 1.0) * 127.5);
    (new_x, new_y)
}

/// Clamp to `[0, 255]`, NaN becomes 0
pub fn clamp_0_to_255(value: f32) -> u16 {
    value.clamp(0.0, 255.0) as u16
}

/// Clamp to `[0, 1023]`, NaN becomes 0
pub fn clamp_0_to_1023(value: f32) -> u16 {
    value.clamp(0.0, 1023.0) as u16
}
