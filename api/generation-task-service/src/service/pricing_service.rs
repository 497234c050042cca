use crate::module::generation_task::schema::ImageQuality;

/// Flat cost of one image generation call, independent of `num_images`.
pub const IMAGE_CALL_CREDITS: i64 = 4;
pub const PRO_QUALITY_MULTIPLIER: i64 = 2;

pub const VIDEO_SHORT_CREDITS: i64 = 55;
pub const VIDEO_LONG_CREDITS: i64 = 110;
pub const VIDEO_SOUND_MULTIPLIER: i64 = 2;

pub fn image_credits(quality: ImageQuality) -> i64 {
    match quality {
        ImageQuality::Standard => IMAGE_CALL_CREDITS,
        ImageQuality::Pro => IMAGE_CALL_CREDITS * PRO_QUALITY_MULTIPLIER,
    }
}

pub fn video_credits(duration_seconds: u32, sound: bool) -> i64 {
    let base = if duration_seconds == 10 {
        VIDEO_LONG_CREDITS
    } else {
        VIDEO_SHORT_CREDITS
    };
    if sound {
        base * VIDEO_SOUND_MULTIPLIER
    } else {
        base
    }
}
