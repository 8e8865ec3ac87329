//! Buffered multipart form reading

use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::services::gallery::UploadedFile;

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body is too large".into())
    } else {
        AppError::InvalidRequest(format!("Failed to read multipart form: {}", err.body_text()))
    }
}

/// Text fields and files of a multipart request, keyed by field name
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: Vec<(String, UploadedFile)>,
}

impl FormData {
    /// Reads every field; file inputs submitted without a file are skipped
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await.map_err(multipart_error)?;
                    if file_name.is_empty() && data.is_empty() {
                        continue;
                    }
                    debug!(field = %name, file = %file_name, size = data.len(), "Received file");
                    form.files.push((
                        name,
                        UploadedFile {
                            file_name,
                            content_type,
                            data: data.to_vec(),
                        },
                    ));
                }
                None => {
                    let value = field.text().await.map_err(multipart_error)?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Blank values count as absent
    pub fn optional(&self, name: &str) -> Option<String> {
        self.text(name)
            .filter(|value| !value.trim().is_empty())
            .map(str::to_string)
    }

    pub fn required(&self, name: &str) -> Result<String> {
        self.text(name)
            .map(str::to_string)
            .ok_or_else(|| AppError::InvalidRequest(format!("Missing form field '{}'", name)))
    }

    pub fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>> {
        match self.optional(name) {
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
                AppError::InvalidRequest(format!("Invalid value for '{}': {}", name, raw))
            }),
            None => Ok(None),
        }
    }

    pub fn parse_required<T: FromStr>(&self, name: &str) -> Result<T> {
        self.parse(name)?
            .ok_or_else(|| AppError::InvalidRequest(format!("Missing form field '{}'", name)))
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        let index = self.files.iter().position(|(field, _)| field == name)?;
        Some(self.files.remove(index).1)
    }

    /// Files whose field name starts with `prefix`, in submission order
    pub fn take_files_with_prefix(&mut self, prefix: &str) -> Vec<UploadedFile> {
        let (matching, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(field, _)| field.starts_with(prefix));
        self.files = rest;
        matching.into_iter().map(|(_, file)| file).collect()
    }
}
