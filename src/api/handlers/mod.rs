mod admin;
mod comments;
mod media;
mod posts;
mod profiles;

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::api::response::ApiError;
use crate::social::Upload;

pub use admin::{admin_purge, cluster_status, health, reconcile_media};
pub use comments::{create_comment, delete_comment};
pub use media::serve_media;
pub use posts::{
    create_post, delete_post, edit_post, get_post, list_likers, list_posts, publish_draft,
    stage_draft, toggle_like,
};
pub use profiles::{edit_bio, register_user, replace_photo, toggle_follow, view_profile};

/// A multipart body split into its file field and text fields.
struct MultipartForm {
    upload: Option<Upload>,
    fields: HashMap<String, String>,
}

/// Read a multipart body, taking `file_field` as the upload and every other
/// field as text.
async fn read_multipart(
    mut multipart: Multipart,
    file_field: &str,
    max_upload_size: u64,
) -> Result<MultipartForm, ApiError> {
    let mut form = MultipartForm {
        upload: None,
        fields: HashMap::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        if field_name == file_field {
            let file_name = field.file_name().map(|s| s.to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read {file_field}: {e}")))?;

            if data.len() as u64 > max_upload_size {
                return Err(ApiError::payload_too_large(format!(
                    "File exceeds maximum upload size of {max_upload_size} bytes"
                )));
            }
            form.upload = Some(Upload { data, file_name });
        } else if !field_name.is_empty() {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("Invalid {field_name}: {e}")))?;
            form.fields.insert(field_name, text);
        }
    }

    Ok(form)
}

impl MultipartForm {
    fn require_upload(&mut self, file_field: &'static str) -> Result<Upload, ApiError> {
        self.upload
            .take()
            .ok_or_else(|| ApiError::invalid(file_field, "is required"))
    }
}
