use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::{Path, PathBuf};

use crate::prompts::{MediaKind, strip_data_url_prefix};

pub const PNG_MIME: &str = "image/png";
pub const JPEG_MIME: &str = "image/jpeg";
pub const WEBP_MIME: &str = "image/webp";
pub const GIF_MIME: &str = "image/gif";
pub const MP3_MIME: &str = "audio/mpeg";
pub const WAV_MIME: &str = "audio/wav";
pub const M4A_MIME: &str = "audio/mp4";
pub const FLAC_MIME: &str = "audio/flac";
pub const OGG_MIME: &str = "audio/ogg";
pub const WEBM_AUDIO_MIME: &str = "audio/webm";

/// An image or audio payload headed for a multimodal prompt.
#[derive(Debug, Clone)]
pub struct MediaAttachment {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub name: Option<String>,
}

impl MediaAttachment {
    pub fn kind(&self) -> MediaKind {
        if self.mime.starts_with("audio/") {
            MediaKind::Audio
        } else {
            MediaKind::Image
        }
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

pub fn load_attachment(path: &Path, mime_hint: Option<&str>) -> Result<MediaAttachment> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read media file: {}", path.display()))?;
    let mime = resolve_mime(mime_hint.unwrap_or("auto"), &bytes, Some(path))?;
    let name = path
        .file_name()
        .and_then(|value| value.to_str())
        .map(|value| value.to_string());
    Ok(MediaAttachment { bytes, mime, name })
}

pub fn load_attachment_from_bytes(
    bytes: Vec<u8>,
    mime_hint: Option<&str>,
    name: Option<&str>,
) -> Result<MediaAttachment> {
    if bytes.is_empty() {
        return Err(anyhow!("media payload is empty"));
    }
    let path = name.map(PathBuf::from);
    let mime = resolve_mime(mime_hint.unwrap_or("auto"), &bytes, path.as_deref())?;
    Ok(MediaAttachment {
        bytes,
        mime,
        name: name.map(|value| value.to_string()),
    })
}

/// Accepts raw base64 or a `data:<mime>;base64,` URL. The URL's mime is used
/// when no explicit hint is given.
pub fn load_attachment_from_base64(data: &str, mime_hint: Option<&str>) -> Result<MediaAttachment> {
    let trimmed = data.trim();
    let embedded_mime = trimmed
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(mime, _)| mime.to_string());
    let payload = strip_data_url_prefix(trimmed);
    let bytes = STANDARD
        .decode(payload.as_bytes())
        .with_context(|| "media payload is not valid base64")?;
    let hint = mime_hint.or(embedded_mime.as_deref());
    load_attachment_from_bytes(bytes, hint, None)
}

fn resolve_mime(input: &str, bytes: &[u8], path: Option<&Path>) -> Result<String> {
    let raw = input.trim();
    if raw.is_empty() {
        return Err(anyhow!("media mime is empty"));
    }
    let lower = raw.to_lowercase();

    match lower.as_str() {
        "auto" => return detect_mime(bytes, path, None),
        "image" | "image/*" => return detect_mime(bytes, path, Some(MediaKind::Image)),
        "audio" | "audio/*" => return detect_mime(bytes, path, Some(MediaKind::Audio)),
        _ => {}
    }
    if let Some(mime) = mime_from_extension(&lower) {
        return Ok(mime.to_string());
    }
    if lower.starts_with("image/") || lower.starts_with("audio/") {
        return Ok(normalize_mime(&lower));
    }

    Err(anyhow!(
        "unsupported media mime '{}' (expected auto, image/*, audio/*, png, jpg, webp, gif, mp3, wav, m4a, flac, ogg, webm)",
        raw
    ))
}

fn normalize_mime(mime: &str) -> String {
    match mime {
        "image/jpg" => JPEG_MIME.to_string(),
        "audio/x-wav" | "audio/wave" => WAV_MIME.to_string(),
        "audio/mp3" => MP3_MIME.to_string(),
        "audio/x-m4a" | "audio/m4a" => M4A_MIME.to_string(),
        "audio/x-flac" => FLAC_MIME.to_string(),
        other => other.to_string(),
    }
}

fn detect_mime(bytes: &[u8], path: Option<&Path>, required: Option<MediaKind>) -> Result<String> {
    let detected = sniff_mime_bytes(bytes).or_else(|| {
        extension_lower(path)
            .and_then(|ext| mime_from_extension(&ext))
            .map(|value| value.to_string())
    });

    let Some(mime) = detected else {
        return Err(anyhow!(
            "unable to detect image or audio data in '{}'",
            path.map(|value| value.display().to_string())
                .unwrap_or_else(|| "upload".to_string())
        ));
    };

    if let Some(kind) = required {
        let prefix = format!("{}/", kind.as_str());
        if !mime.starts_with(&prefix) {
            return Err(anyhow!(
                "expected {} data (detected '{}')",
                kind.as_str(),
                mime
            ));
        }
    }
    Ok(mime)
}

fn sniff_mime_bytes(bytes: &[u8]) -> Option<String> {
    let kind = infer::get(bytes)?;
    let detected = kind.mime_type();
    if detected.starts_with("image/") || detected.starts_with("audio/") {
        return Some(normalize_mime(detected));
    }
    match detected {
        "video/webm" => Some(WEBM_AUDIO_MIME.to_string()),
        "video/mp4" => Some(M4A_MIME.to_string()),
        _ => None,
    }
}

fn extension_lower(path: Option<&Path>) -> Option<String> {
    path.and_then(|path| path.extension())
        .and_then(|value| value.to_str())
        .map(|value| value.to_lowercase())
}

fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some(PNG_MIME),
        "jpg" | "jpeg" => Some(JPEG_MIME),
        "webp" => Some(WEBP_MIME),
        "gif" => Some(GIF_MIME),
        "bmp" => Some("image/bmp"),
        "heic" => Some("image/heic"),
        "mp3" => Some(MP3_MIME),
        "wav" => Some(WAV_MIME),
        "m4a" => Some(M4A_MIME),
        "flac" => Some(FLAC_MIME),
        "ogg" => Some(OGG_MIME),
        "webm" => Some(WEBM_AUDIO_MIME),
        _ => None,
    }
}
