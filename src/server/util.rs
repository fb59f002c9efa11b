use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;

use crate::data::{self, MediaAttachment};
use crate::error::{ServiceError, ServiceResult};
use crate::prompts::MediaKind;
use crate::translator::{InputType, TranslationRequest};

use super::translate::ensure_supported_image;

/// Fields of a `multipart/form-data` upload.
#[derive(Debug, Default)]
pub(crate) struct UploadForm {
    pub(crate) file: Option<MediaAttachment>,
    pub(crate) mode: Option<String>,
    pub(crate) direction: Option<String>,
}

fn multipart_error(err: MultipartError) -> ServiceError {
    ServiceError::invalid(format!("Invalid upload: {}", err.body_text()))
}

pub(crate) async fn read_upload(mut multipart: Multipart) -> ServiceResult<UploadForm> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().map(|value| value.to_string());
                let bytes = field.bytes().await.map_err(multipart_error)?;
                let attachment =
                    data::load_attachment_from_bytes(bytes.to_vec(), None, file_name.as_deref())
                        .map_err(|err| {
                            ServiceError::invalid(format!("Unsupported file type: {}", err))
                        })?;
                form.file = Some(attachment);
            }
            "mode" => form.mode = Some(field.text().await.map_err(multipart_error)?),
            "direction" => form.direction = Some(field.text().await.map_err(multipart_error)?),
            _ => {}
        }
    }
    Ok(form)
}

impl UploadForm {
    /// The input type follows the sniffed MIME of the uploaded file.
    pub(crate) fn into_request(self) -> ServiceResult<TranslationRequest> {
        let file = self
            .file
            .ok_or_else(|| ServiceError::invalid("No file provided"))?;
        let mut request = TranslationRequest {
            mode: self.mode.filter(|value| !value.trim().is_empty()),
            direction: self.direction.filter(|value| !value.trim().is_empty()),
            ..TranslationRequest::default()
        };
        match file.kind() {
            MediaKind::Image => {
                ensure_supported_image(&file.mime)?;
                request.input_type = InputType::Image;
                request.image = Some(file);
            }
            MediaKind::Audio => {
                request.input_type = InputType::Audio;
                request.audio = Some(file);
            }
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{GIF_MIME, WAV_MIME};

    fn attachment(mime: &str) -> MediaAttachment {
        MediaAttachment {
            bytes: vec![1, 2, 3],
            mime: mime.to_string(),
            name: None,
        }
    }

    #[test]
    fn infers_input_type_from_mime() {
        let form = UploadForm {
            file: Some(attachment(WAV_MIME)),
            mode: Some("formal".to_string()),
            direction: Some(" ".to_string()),
        };
        let request = form.into_request().unwrap();
        assert_eq!(request.input_type, InputType::Audio);
        assert_eq!(request.mode.as_deref(), Some("formal"));
        assert_eq!(request.direction, None);

        let form = UploadForm {
            file: Some(attachment(GIF_MIME)),
            ..UploadForm::default()
        };
        assert_eq!(form.into_request().unwrap().input_type, InputType::Image);
    }

    #[test]
    fn rejects_missing_or_unsupported_files() {
        let err = UploadForm::default().into_request().unwrap_err();
        assert_eq!(err.to_string(), "No file provided");

        let form = UploadForm {
            file: Some(attachment("image/heic")),
            ..UploadForm::default()
        };
        assert!(form.into_request().is_err());
    }
}
