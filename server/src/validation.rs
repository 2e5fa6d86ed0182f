use crate::error::ApiError;

/// Maximum text length for speech requests
pub const MAX_TEXT_LENGTH: usize = 5000;

/// Validate the text of a speech request.
///
/// The synthesis service would reject blank input itself, but only after a
/// billed round trip, so it is refused here with a 400.
pub fn validate_speech_text(text: Option<&str>) -> Result<&str, ApiError> {
    let text = text.ok_or_else(|| ApiError::InvalidInput("Missing `text` field".to_string()))?;

    if text.trim().is_empty() {
        return Err(ApiError::InvalidInput("Text cannot be empty".to_string()));
    }
    if text.chars().count() > MAX_TEXT_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Text too long (max {} characters)",
            MAX_TEXT_LENGTH
        )));
    }

    Ok(text)
}
