use serde::{Serialize, Deserialize};
use serde_with::skip_serializing_none;
use chrono::{DateTime, Utc};
use std::{fmt, str::FromStr};
use uuid::Uuid;

pub const MAX_PROMPT_CHARS: usize = 500;
pub const MAX_PARAMETER: u8 = 100;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Editorial,
    Streetwear,
    Vintage,
    Minimalist,
    Cyberpunk,
    Watercolor,
}

impl Style {
    pub const ALL: [Style; 6] = [
        Style::Editorial,
        Style::Streetwear,
        Style::Vintage,
        Style::Minimalist,
        Style::Cyberpunk,
        Style::Watercolor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Style::Editorial => "editorial",
            Style::Streetwear => "streetwear",
            Style::Vintage => "vintage",
            Style::Minimalist => "minimalist",
            Style::Cyberpunk => "cyberpunk",
            Style::Watercolor => "watercolor",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Style::Editorial => "Editorial",
            Style::Streetwear => "Streetwear",
            Style::Vintage => "Vintage",
            Style::Minimalist => "Minimalist",
            Style::Cyberpunk => "Cyberpunk",
            Style::Watercolor => "Watercolor",
        }
    }

    /// Stock image the mock backend hands back for this style.
    pub fn placeholder_url(self) -> &'static str {
        match self {
            Style::Editorial => "https://images.unsplash.com/photo-1558618666-fcd25c85cd64?ixlib=rb-4.0.3&auto=format&fit=crop&w=800&h=600",
            Style::Streetwear => "https://images.unsplash.com/photo-1506905925346-21bda4d32df4?ixlib=rb-4.0.3&auto=format&fit=crop&w=800&h=600",
            Style::Vintage => "https://images.unsplash.com/photo-1541961017774-22349e4a1262?ixlib=rb-4.0.3&auto=format&fit=crop&w=800&h=600",
            Style::Minimalist => "https://images.unsplash.com/photo-1513475382585-d06e58bcb0e0?ixlib=rb-4.0.3&auto=format&fit=crop&w=800&h=600",
            Style::Cyberpunk => "https://images.unsplash.com/photo-1518709268805-4e9042af2176?ixlib=rb-4.0.3&auto=format&fit=crop&w=800&h=600",
            Style::Watercolor => "https://images.unsplash.com/photo-1460661419201-fd4cecdf8a8b?ixlib=rb-4.0.3&auto=format&fit=crop&w=800&h=600",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Style::ALL
            .into_iter()
            .find(|style| style.as_str() == wanted)
            .ok_or_else(|| format!("Unknown style '{}'", s))
    }
}

fn default_creativity() -> u8 { 75 }
fn default_strength() -> u8 { 60 }

/// Input to one logical generation. Reused verbatim across retries.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub image_data_url: String,
    pub prompt: String,
    pub style: Style,
    #[serde(default = "default_creativity")]
    pub creativity: u8,
    #[serde(default = "default_strength")]
    pub strength: u8,
}

impl GenerationRequest {
    pub fn new(image_data_url: impl Into<String>, prompt: impl Into<String>, style: Style) -> Self {
        Self {
            image_data_url: image_data_url.into(),
            prompt: prompt.into(),
            style,
            creativity: default_creativity(),
            strength: default_strength(),
        }
    }

    /// Every constraint violation, in field order. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.image_data_url.trim().is_empty() {
            errors.push("Image is required".to_string());
        }
        if self.prompt.trim().is_empty() {
            errors.push("Prompt is required".to_string());
        }
        if self.prompt.chars().count() > MAX_PROMPT_CHARS {
            errors.push(format!("Prompt must be {} characters or less", MAX_PROMPT_CHARS));
        }
        if self.creativity > MAX_PARAMETER {
            errors.push(format!("Creativity must be between 0 and {}", MAX_PARAMETER));
        }
        if self.strength > MAX_PARAMETER {
            errors.push(format!("Strength must be between 0 and {}", MAX_PARAMETER));
        }
        errors
    }

    pub fn summary(&self) -> String {
        let prompt: String = self.prompt.chars().take(60).collect();
        let ellipsis = if self.prompt.chars().count() > 60 { "…" } else { "" };
        format!(
            "{} style, creativity {}%, strength {}%: \"{}{}\"",
            self.style.label(), self.creativity, self.strength, prompt, ellipsis
        )
    }
}

/// A successful generation. Also the unit stored in history.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub id: Uuid,
    pub image_url: String,
    pub original_image_url: String,
    pub prompt: String,
    pub style: Style,
    pub created_at: DateTime<Utc>,
}

impl Generation {
    pub fn from_request(request: &GenerationRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            image_url: request.style.placeholder_url().to_string(),
            original_image_url: request.image_data_url.clone(),
            prompt: request.prompt.clone(),
            style: request.style,
            created_at: Utc::now(),
        }
    }
}

/// Success body as some backends wrap it: `{ success, data, error }`.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Generation>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiEnvelope {
    Wrapped(Envelope),
    Bare(Generation),
}

impl ApiEnvelope {
    pub fn into_result(self) -> Result<Generation, String> {
        match self {
            ApiEnvelope::Bare(generation) => Ok(generation),
            ApiEnvelope::Wrapped(Envelope { success: true, data: Some(generation), .. }) => Ok(generation),
            ApiEnvelope::Wrapped(Envelope { error, .. }) => {
                Err(error.unwrap_or_else(|| "Generation failed".to_string()))
            }
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default)]
    pub errors: Option<Vec<String>>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), errors: None }
    }
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub data_url: String,
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn style_parses_case_insensitively() {
        assert_eq!("Cyberpunk".parse::<Style>(), Ok(Style::Cyberpunk));
        assert!("photorealistic".parse::<Style>().is_err());
    }

    #[test]
    fn request_uses_camel_case_and_defaults() {
        let req: GenerationRequest = serde_json::from_str(
            r#"{"imageDataUrl":"data:image/png;base64,AAAA","prompt":"a coat","style":"vintage"}"#,
        ).unwrap();
        assert_eq!(req.creativity, 75);
        assert_eq!(req.strength, 60);
        assert_eq!(req.style, Style::Vintage);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["imageDataUrl"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn validate_reports_all_violations() {
        let mut req = GenerationRequest::new("", "x".repeat(501), Style::Editorial);
        req.strength = 101;
        assert_eq!(
            req.validate(),
            vec![
                "Image is required".to_string(),
                "Prompt must be 500 characters or less".to_string(),
                "Strength must be between 0 and 100".to_string(),
            ]
        );
        let ok = GenerationRequest::new("data:x", "é".repeat(500), Style::Editorial);
        assert!(ok.validate().is_empty());
    }

    #[test]
    fn envelope_accepts_wrapped_and_bare_bodies() {
        let generation = Generation::from_request(&GenerationRequest::new("data:x", "p", Style::Watercolor));
        let bare = serde_json::to_string(&generation).unwrap();
        let parsed: ApiEnvelope = serde_json::from_str(&bare).unwrap();
        assert_eq!(parsed.into_result(), Ok(generation.clone()));

        let wrapped = serde_json::json!({ "success": true, "data": generation }).to_string();
        let parsed: ApiEnvelope = serde_json::from_str(&wrapped).unwrap();
        assert_eq!(parsed.into_result().unwrap().id, generation.id);

        let failed: ApiEnvelope = serde_json::from_str(r#"{"success":false,"error":"busy"}"#).unwrap();
        assert_eq!(failed.into_result(), Err("busy".to_string()));
    }

    #[test]
    fn error_body_omits_missing_errors() {
        let json = serde_json::to_string(&ErrorBody::new("Model overloaded")).unwrap();
        assert_eq!(json, r#"{"message":"Model overloaded"}"#);
    }
}
