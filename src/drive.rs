use async_trait::async_trait;
use axum::http::HeaderValue;
use reqwest::{header, Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::Endpoints;
use crate::error::{AppError, Result};
use crate::pagination::PageSource;
use crate::token::TokenProvider;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
pub const PAGE_SIZE: u32 = 50;
/// Files above this size are streamed from the authenticated media endpoint.
pub const LARGE_FILE_THRESHOLD: u64 = 100 * 1024 * 1024;

const LIST_FIELDS: &str = "files(id,name,mimeType,size,modifiedTime),nextPageToken";
const FIND_FIELDS: &str = "files(id,name,mimeType)";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    /// Decimal byte count; absent for folders and native documents.
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
}

impl FileEntry {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_deref().and_then(|s| s.parse().ok())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub files: Vec<FileEntry>,
    pub next_cursor: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<FileEntry>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileMetadata {
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub url: String,
    /// Set when the url requires `Authorization: Bearer`.
    pub bearer: Option<String>,
}

/// Drive v3 client scoped to one request.
#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    endpoints: Endpoints,
    tokens: TokenProvider,
}

impl DriveClient {
    pub fn new(http: Client, endpoints: Endpoints, tokens: TokenProvider) -> Self {
        Self {
            http,
            endpoints,
            tokens,
        }
    }

    /// First non-trashed child of `folder_id` named exactly `name`.
    pub async fn find_file(&self, name: &str, folder_id: &str) -> Result<Option<FileEntry>> {
        tracing::debug!(name, folder_id, "finding file");
        let query = format!(
            "'{}' in parents and name = '{}' and trashed = false",
            escape_query(folder_id),
            escape_query(name)
        );
        let list: FileList = self
            .get_json(
                "find file",
                &format!("{}/files", self.endpoints.drive_api),
                &[("q", query.as_str()), ("fields", FIND_FIELDS)],
            )
            .await?;
        Ok(list.files.into_iter().next())
    }

    /// One page of non-trashed children ordered by name.
    pub async fn list_children(&self, folder_id: &str, cursor: Option<&str>) -> Result<ListPage> {
        tracing::debug!(folder_id, has_cursor = cursor.is_some(), "listing folder");
        let query = format!("'{}' in parents and trashed = false", escape_query(folder_id));
        let page_size = PAGE_SIZE.to_string();
        let mut params = vec![
            ("q", query.as_str()),
            ("fields", LIST_FIELDS),
            ("pageSize", page_size.as_str()),
            ("orderBy", "name"),
        ];
        if let Some(cursor) = cursor {
            params.push(("pageToken", cursor));
        }

        let list: FileList = self
            .get_json("list children", &format!("{}/files", self.endpoints.drive_api), &params)
            .await?;
        Ok(ListPage {
            files: list.files,
            next_cursor: list.next_page_token.filter(|c| !c.is_empty()),
        })
    }

    /// Picks the authenticated media url for large files and the public
    /// export url for everything else.
    pub async fn resolve_download_target(&self, file_id: &str) -> Result<DownloadTarget> {
        let meta: FileMetadata = self
            .get_json(
                "file metadata",
                &format!("{}/files/{}", self.endpoints.drive_api, file_id),
                &[("fields", "size,mimeType")],
            )
            .await?;
        let size = meta.size.as_deref().and_then(|s| s.parse::<u64>().ok());
        tracing::debug!(file_id, ?size, mime_type = ?meta.mime_type, "resolved file metadata");

        if size.is_some_and(|size| size > LARGE_FILE_THRESHOLD) {
            let bearer = self.tokens.get_access_token().await?;
            return Ok(DownloadTarget {
                url: format!("{}/files/{}?alt=media", self.endpoints.drive_api, file_id),
                bearer: Some(bearer),
            });
        }
        Ok(DownloadTarget {
            url: format!("{}?export=download&id={}", self.endpoints.download, file_id),
            bearer: None,
        })
    }

    /// Fetches the download target; the upstream response is returned as-is
    /// so the caller can stream it through.
    pub async fn download(&self, target: &DownloadTarget, range: Option<&HeaderValue>) -> Result<Response> {
        tracing::info!(url = %target.url, authenticated = target.bearer.is_some(), "proxying download");
        let mut req = self.http.get(&target.url);
        if let Some(bearer) = &target.bearer {
            req = req.bearer_auth(bearer);
        }
        if let Some(range) = range {
            req = req.header(header::RANGE, range.clone());
        }
        req.send().await.map_err(AppError::transport("download"))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let token = self.tokens.get_access_token().await?;
        let res = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(params)
            .send()
            .await
            .map_err(AppError::transport(operation))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::Query {
                operation,
                status,
                body,
            });
        }
        res.json().await.map_err(AppError::decode(operation))
    }
}

#[async_trait]
impl PageSource for DriveClient {
    async fn list_page(&self, folder_id: &str, cursor: Option<&str>) -> Result<ListPage> {
        self.list_children(folder_id, cursor).await
    }
}

fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
