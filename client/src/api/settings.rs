//! Application settings and their managed collections.

use admin_core::{ApiError, HttpMethod, Page, PageSpec, RequestBody};
use serde::Serialize;
use serde_json::Value;

use super::{AdminApi, SearchQuery};
use crate::transport::HttpTransport;

/// Settings sub-resources that share the same list/create/update/delete shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsCollection {
    FeatureFlags,
    Experiments,
    NotificationChannels,
    Integrations,
}

impl SettingsCollection {
    pub fn path(&self) -> &'static str {
        match self {
            SettingsCollection::FeatureFlags => "/settings/feature-flags",
            SettingsCollection::Experiments => "/settings/experiments",
            SettingsCollection::NotificationChannels => "/settings/notification-channels",
            SettingsCollection::Integrations => "/settings/integrations",
        }
    }
}

/// Body of a Google Sheets books export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetsExport {
    pub integration_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spreadsheet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_new: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl<T: HttpTransport> AdminApi<T> {
    pub fn settings(&self) -> Result<Value, ApiError> {
        self.get("/settings")
    }

    pub fn save_settings(&self, settings: &Value) -> Result<Value, ApiError> {
        self.send_json(HttpMethod::Put, "/settings", settings)
    }

    pub fn list_settings_items(
        &self,
        collection: SettingsCollection,
        query: &SearchQuery,
    ) -> Result<Page<Value>, ApiError> {
        self.fetch_page(
            collection.path(),
            query.to_query(),
            &PageSpec::new(20),
            &query.page_request(),
        )
    }

    pub fn create_settings_item(
        &self,
        collection: SettingsCollection,
        item: &Value,
    ) -> Result<Value, ApiError> {
        self.send_json(HttpMethod::Post, collection.path(), item)
    }

    pub fn update_settings_item(
        &self,
        collection: SettingsCollection,
        id: i64,
        changes: &Value,
    ) -> Result<Value, ApiError> {
        let path = format!("{}/{id}", collection.path());
        self.send_json(HttpMethod::Patch, &path, changes)
    }

    pub fn delete_settings_item(&self, collection: SettingsCollection, id: i64) -> Result<Value, ApiError> {
        let path = format!("{}/{id}", collection.path());
        self.call(HttpMethod::Delete, &path, RequestBody::Empty)
    }

    pub fn export_books_to_sheets(&self, export: &SheetsExport) -> Result<Value, ApiError> {
        self.send_json(HttpMethod::Post, "/google-sheets/export-books", export)
    }
}
