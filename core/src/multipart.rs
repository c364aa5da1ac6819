//! `multipart/form-data` encoding for asset and book uploads.
//!
//! The encoder owns the boundary, so it is also the only place that may set
//! the request's content type for a form body.

use uuid::Uuid;

/// A single form field, either plain text or a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// An ordered multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<FormPart>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::with_boundary(format!("----admin-form-{}", Uuid::new_v4().simple()))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            filename: None,
            content_type: None,
            data: value.into().into_bytes(),
        });
        self
    }

    /// Appends a text field only when `value` is present.
    pub fn text_opt(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.text(name, v),
            None => self,
        }
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            filename: Some(filename.into()),
            content_type: Some(content_type.into()),
            data,
        });
        self
    }

    /// Value for the `content-type` header, including the boundary.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for part in &self.parts {
            out.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            let mut disposition = format!(
                "Content-Disposition: form-data; name=\"{}\"",
                escape_quoted(&part.name)
            );
            if let Some(filename) = &part.filename {
                disposition.push_str(&format!("; filename=\"{}\"", escape_quoted(filename)));
            }
            out.extend_from_slice(disposition.as_bytes());
            out.extend_from_slice(b"\r\n");
            if let Some(ct) = &part.content_type {
                out.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
            }
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&part.data);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        out
    }
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_text_and_file_parts() {
        let form = MultipartForm::with_boundary("XYZ")
            .text("title", "Gita")
            .file("file", "gita.pdf", "application/pdf", b"%PDF".to_vec());
        let body = String::from_utf8(form.encode()).unwrap();
        assert_eq!(
            body,
            "--XYZ\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nGita\r\n\
             --XYZ\r\nContent-Disposition: form-data; name=\"file\"; filename=\"gita.pdf\"\r\n\
             Content-Type: application/pdf\r\n\r\n%PDF\r\n--XYZ--\r\n"
        );
        assert_eq!(form.content_type(), "multipart/form-data; boundary=XYZ");
    }

    #[test]
    fn generated_boundaries_differ() {
        assert_ne!(MultipartForm::new().boundary(), MultipartForm::new().boundary());
    }

    #[test]
    fn optional_text_fields_are_skipped_when_absent() {
        let form = MultipartForm::with_boundary("b")
            .text_opt("title", Some("x"))
            .text_opt("tags", None);
        assert_eq!(form.parts().len(), 1);
    }

    #[test]
    fn quotes_in_field_names_are_escaped() {
        let form = MultipartForm::with_boundary("b").text("a\"b", "v");
        let body = String::from_utf8(form.encode()).unwrap();
        assert!(body.contains("name=\"a\\\"b\""));
    }
}
