//! Themes, books and message templates.

use admin_core::{
    ApiError, HttpMethod, MultipartForm, Page, PageRequest, PageSpec, Payload, QueryParams,
    RequestBody, ResponseKind,
};
use serde_json::{Map, Value};

use super::assets::Upload;
use super::{unwrap_key, AdminApi, SearchQuery};
use crate::transport::HttpTransport;

const THEMES: PageSpec = PageSpec::keyed("themes", 20);
const BOOKS: PageSpec = PageSpec::keyed("books", 20);

impl<T: HttpTransport> AdminApi<T> {
    pub fn list_themes(&self) -> Result<Page<Value>, ApiError> {
        self.fetch_page("/themes", QueryParams::new(), &THEMES, &PageRequest::default())
    }

    pub fn create_theme(&self, theme: &Value) -> Result<Value, ApiError> {
        self.send_json(HttpMethod::Post, "/themes", theme)
    }

    pub fn update_theme(&self, id: i64, theme: &Value) -> Result<Value, ApiError> {
        self.send_json(HttpMethod::Patch, &format!("/themes/{id}"), theme)
    }

    pub fn delete_theme(&self, id: i64) -> Result<Value, ApiError> {
        self.call(HttpMethod::Delete, &format!("/themes/{id}"), RequestBody::Empty)
    }

    /// Rendered CSS of a theme. The backend answers either with raw
    /// `text/css` or with `{ preview: { css } }` / `{ css }`.
    pub fn preview_theme(&self, id: i64) -> Result<String, ApiError> {
        let path = format!("/themes/{id}/preview");
        match self.request(HttpMethod::Get, &path, RequestBody::Empty, ResponseKind::Auto)? {
            Payload::Text(css) => Ok(css),
            Payload::Json(value) => Ok(theme_css(&value).unwrap_or_default().to_string()),
        }
    }

    pub fn list_books(&self, query: &SearchQuery) -> Result<Page<Value>, ApiError> {
        self.fetch_page("/books", query.to_query(), &BOOKS, &query.page_request())
    }

    /// Create a book from metadata `fields` plus optional book and cover
    /// files. Object and array fields are sent as JSON text, nulls are skipped.
    pub fn create_book(
        &self,
        fields: &Map<String, Value>,
        book: Option<&Upload>,
        cover: Option<&Upload>,
    ) -> Result<Value, ApiError> {
        let mut form = MultipartForm::new();
        for (name, value) in fields {
            let text = match value {
                Value::Null => continue,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            form = form.text(name.as_str(), text);
        }
        for (name, upload) in [("book", book), ("cover", cover)] {
            if let Some(file) = upload {
                form = form.file(name, &file.filename, &file.content_type, file.data.clone());
            }
        }
        let created = self.call(HttpMethod::Post, "/books", RequestBody::Form(form))?;
        Ok(unwrap_key(created, "book"))
    }

    pub fn list_templates(&self) -> Result<Value, ApiError> {
        self.get("/templates")
    }

    pub fn template(&self, id: i64) -> Result<Value, ApiError> {
        self.get(&format!("/templates/{id}"))
    }

    pub fn create_template(&self, template: &Value) -> Result<Value, ApiError> {
        self.send_json(HttpMethod::Post, "/templates", template)
    }

    pub fn update_template(&self, id: i64, template: &Value) -> Result<Value, ApiError> {
        self.send_json(HttpMethod::Patch, &format!("/templates/{id}"), template)
    }

    pub fn delete_template(&self, id: i64) -> Result<Value, ApiError> {
        self.call(HttpMethod::Delete, &format!("/templates/{id}"), RequestBody::Empty)
    }
}

fn theme_css(value: &Value) -> Option<&str> {
    value
        .pointer("/preview/css")
        .and_then(Value::as_str)
        .or_else(|| value.get("css").and_then(Value::as_str))
}
