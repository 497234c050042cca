use crate::module::generation_task::error::AppError;
use crate::module::generation_task::schema::{GenerateImageRequest, GenerateVideoRequest};

pub const MAX_VIDEO_PROMPT_CHARS: usize = 2500;
pub const MAX_IMAGES_PER_CALL: u32 = 4;
pub const IMAGE_ASPECT_RATIOS: [&str; 3] = ["1:1", "3:2", "2:3"];
pub const VIDEO_ASPECT_RATIOS: [&str; 3] = ["16:9", "9:16", "1:1"];
pub const VIDEO_DURATIONS: [u32; 2] = [5, 10];

const SANITIZED_PROVIDER_MESSAGE: &str =
    "the provider rejected the request format; please adjust the prompt and try again";
const GENERIC_PROVIDER_MESSAGE: &str = "generation failed";
const MAX_PROVIDER_MESSAGE_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidImageRequest {
    pub prompt: String,
    pub num_images: u32,
    pub aspect_ratio: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidVideoRequest {
    pub prompt: String,
    pub duration_seconds: u32,
    pub aspect_ratio: String,
}

pub fn validate_image_request(req: &GenerateImageRequest) -> Result<ValidImageRequest, AppError> {
    let prompt = required_prompt(&req.prompt)?;
    let num_images = req.num_images.unwrap_or(1);
    if !(1..=MAX_IMAGES_PER_CALL).contains(&num_images) {
        return Err(AppError::invalid_request(format!(
            "numImages must be between 1 and {MAX_IMAGES_PER_CALL}"
        )));
    }
    let aspect_ratio = aspect_ratio(req.aspect_ratio.as_deref(), &IMAGE_ASPECT_RATIOS)?;
    Ok(ValidImageRequest {
        prompt,
        num_images,
        aspect_ratio,
    })
}

pub fn validate_video_request(req: &GenerateVideoRequest) -> Result<ValidVideoRequest, AppError> {
    let prompt = required_prompt(&req.prompt)?;
    if prompt.chars().count() > MAX_VIDEO_PROMPT_CHARS {
        return Err(AppError::invalid_request(format!(
            "prompt must be at most {MAX_VIDEO_PROMPT_CHARS} characters"
        )));
    }
    let duration_seconds = req
        .duration
        .seconds()
        .filter(|d| VIDEO_DURATIONS.contains(d))
        .ok_or_else(|| AppError::invalid_request("duration must be 5 or 10 seconds"))?;
    let aspect_ratio = aspect_ratio(req.aspect_ratio.as_deref(), &VIDEO_ASPECT_RATIOS)?;
    Ok(ValidVideoRequest {
        prompt,
        duration_seconds,
        aspect_ratio,
    })
}

fn required_prompt(prompt: &str) -> Result<String, AppError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::invalid_request("prompt is required"));
    }
    Ok(prompt.to_string())
}

/// First entry of `allowed` is the default.
fn aspect_ratio(raw: Option<&str>, allowed: &[&str]) -> Result<String, AppError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(allowed[0].to_string()),
        Some(v) if allowed.contains(&v) => Ok(v.to_string()),
        Some(_) => Err(AppError::invalid_request(format!(
            "aspectRatio must be one of {}",
            allowed.join(", ")
        ))),
    }
}

/// Provider text is shown to end users, so regex validation leaks such as
/// "string did not match the expected pattern" are replaced wholesale.
pub fn sanitize_provider_message(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return GENERIC_PROVIDER_MESSAGE.to_string();
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.contains("pattern") && lower.contains("match") {
        return SANITIZED_PROVIDER_MESSAGE.to_string();
    }
    match trimmed.char_indices().nth(MAX_PROVIDER_MESSAGE_CHARS) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::generation_task::schema::{ImageQuality, VideoDuration};

    fn image_req(prompt: &str, num_images: Option<u32>, ratio: Option<&str>) -> GenerateImageRequest {
        GenerateImageRequest {
            prompt: prompt.to_string(),
            num_images,
            aspect_ratio: ratio.map(ToOwned::to_owned),
            quality: ImageQuality::Standard,
        }
    }

    fn video_req(prompt: &str, duration: VideoDuration) -> GenerateVideoRequest {
        GenerateVideoRequest {
            prompt: prompt.to_string(),
            duration,
            sound: false,
            aspect_ratio: None,
        }
    }

    #[test]
    fn image_defaults_apply() {
        let valid = validate_image_request(&image_req("  a red fox  ", None, None)).expect("valid");
        assert_eq!(valid.prompt, "a red fox");
        assert_eq!(valid.num_images, 1);
        assert_eq!(valid.aspect_ratio, "1:1");
    }

    #[test]
    fn image_count_and_ratio_are_bounded() {
        assert!(validate_image_request(&image_req("fox", Some(0), None)).is_err());
        assert!(validate_image_request(&image_req("fox", Some(5), None)).is_err());
        assert!(validate_image_request(&image_req("fox", Some(4), Some("2:3"))).is_ok());
        let err = validate_image_request(&image_req("fox", Some(1), Some("21:9"))).expect_err("ratio");
        assert_eq!(err.code, "INVALID_REQUEST");
    }

    #[test]
    fn blank_prompt_is_rejected() {
        let err = validate_image_request(&image_req("   ", None, None)).expect_err("blank");
        assert_eq!(err.message, "prompt is required");
    }

    #[test]
    fn video_duration_accepts_string_or_number() {
        let valid = validate_video_request(&video_req("waves", VideoDuration::Text("10".to_string())))
            .expect("valid");
        assert_eq!(valid.duration_seconds, 10);
        assert_eq!(valid.aspect_ratio, "16:9");
        assert!(validate_video_request(&video_req("waves", VideoDuration::Seconds(5))).is_ok());
        assert!(validate_video_request(&video_req("waves", VideoDuration::Seconds(7))).is_err());
        assert!(validate_video_request(&video_req("waves", VideoDuration::Text("ten".to_string()))).is_err());
    }

    #[test]
    fn long_video_prompt_is_rejected() {
        let prompt = "a".repeat(MAX_VIDEO_PROMPT_CHARS + 1);
        assert!(validate_video_request(&video_req(&prompt, VideoDuration::Seconds(5))).is_err());
    }

    #[test]
    fn pattern_leaks_are_replaced() {
        assert_eq!(
            sanitize_provider_message("The string did not MATCH the expected Pattern."),
            SANITIZED_PROVIDER_MESSAGE
        );
        assert_eq!(sanitize_provider_message(""), GENERIC_PROVIDER_MESSAGE);
        assert_eq!(sanitize_provider_message(" content policy "), "content policy");
    }
}
