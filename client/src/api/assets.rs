//! Media assets and UI elements.

use admin_core::{ApiError, HttpMethod, MultipartForm, Page, PageRequest, PageSpec, QueryParams, RequestBody};
use serde_json::Value;

use super::{unwrap_key, AdminApi, SearchQuery};
use crate::transport::HttpTransport;

const ASSETS: PageSpec = PageSpec::keyed("assets", 20);
const UI_ELEMENTS: PageSpec = PageSpec::keyed("ui_elements", 20);

/// A file to send as one part of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }
}

/// Optional text fields sent alongside an asset upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetMeta {
    pub title: Option<String>,
    pub kind: Option<String>,
    pub description: Option<String>,
    pub tags: Option<String>,
}

impl<T: HttpTransport> AdminApi<T> {
    /// The backend returns every asset at once; the page covers them all.
    pub fn list_assets(&self) -> Result<Page<Value>, ApiError> {
        self.fetch_page("/assets", QueryParams::new(), &ASSETS, &PageRequest::default())
    }

    pub fn asset(&self, id: i64) -> Result<Value, ApiError> {
        Ok(unwrap_key(self.get(&format!("/assets/{id}"))?, "asset"))
    }

    pub fn upload_asset(&self, file: &Upload, meta: &AssetMeta) -> Result<Value, ApiError> {
        let form = MultipartForm::new()
            .file("file", &file.filename, &file.content_type, file.data.clone())
            .text_opt("title", meta.title.as_deref())
            .text_opt("type", meta.kind.as_deref())
            .text_opt("description", meta.description.as_deref())
            .text_opt("tags", meta.tags.as_deref());
        let created = self.call(HttpMethod::Post, "/assets", RequestBody::Form(form))?;
        Ok(unwrap_key(created, "asset"))
    }

    pub fn update_asset(&self, id: i64, changes: &Value) -> Result<Value, ApiError> {
        self.send_json(HttpMethod::Patch, &format!("/assets/{id}"), changes)
    }

    pub fn delete_asset(&self, id: i64) -> Result<Value, ApiError> {
        self.call(HttpMethod::Delete, &format!("/assets/{id}"), RequestBody::Empty)
    }

    pub fn asset_stats(&self) -> Result<Value, ApiError> {
        self.get("/assets/stats")
    }

    pub fn list_ui_elements(&self, query: &SearchQuery) -> Result<Page<Value>, ApiError> {
        self.fetch_page("/ui-elements", query.to_query(), &UI_ELEMENTS, &query.page_request())
    }

    pub fn ui_locations(&self) -> Result<Value, ApiError> {
        Ok(unwrap_key(self.get("/ui-elements/locations")?, "locations"))
    }

    pub fn preview_ui_element(&self, id: i64) -> Result<Value, ApiError> {
        Ok(unwrap_key(self.get(&format!("/ui-elements/{id}/preview"))?, "preview"))
    }
}
