// Object-storage client: container check, object PUT/GET(list)/DELETE
// against `{endpoint}/{account}/{container}[/{object}]`. Every call carries
// the token in `X-Auth-Token`. Like the identity client, failures are
// logged here and collapse to `false`/`None` for the caller.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::fmt;
use url::Url;

use crate::auth::AuthToken;
use crate::error::{Result, TransferError};

pub const TRACING_TARGET: &str = "tcstore_cli::storage";

/// Header carrying the token on every storage request.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Remote namespace: `{account}/{container}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContainerRef {
    pub account: String,
    pub container: String,
}

impl ContainerRef {
    pub fn new(account: impl Into<String>, container: impl Into<String>) -> Self {
        ContainerRef {
            account: account.into(),
            container: container.into(),
        }
    }

    pub fn object(&self, name: impl Into<String>) -> ObjectRef {
        ObjectRef {
            container: self.clone(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.container)
    }
}

/// An object inside a container. `name` may contain `/` to express a
/// directory hierarchy; each piece becomes its own URL path segment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub container: ContainerRef,
    pub name: String,
}

/// Storage operations the orchestrator depends on.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// True iff the container answers 200.
    async fn container_exists(&self, token: &AuthToken, container: &ContainerRef) -> bool;

    /// True iff the PUT answers 201 Created. Existing objects are overwritten.
    async fn upload_object(&self, token: &AuthToken, object: &ObjectRef, body: Vec<u8>) -> bool;

    /// All object names in the container, across every listing page.
    /// `None` when any page fails.
    async fn list_objects(&self, token: &AuthToken, container: &ContainerRef)
        -> Option<Vec<String>>;

    /// True iff the DELETE answers with any 2xx.
    async fn delete_object(&self, token: &AuthToken, object: &ObjectRef) -> bool;
}

#[derive(Clone, Debug)]
pub struct StorageClient {
    http: Client,
    endpoint: Url,
    page_size: usize,
}

impl StorageClient {
    pub fn new(http: Client, endpoint: &str, page_size: usize) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| TransferError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(TransferError::InvalidEndpoint(endpoint.to_string()));
        }
        Ok(StorageClient {
            http,
            endpoint,
            page_size: page_size.max(1),
        })
    }

    pub fn container_url(&self, container: &ContainerRef) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| TransferError::InvalidEndpoint(self.endpoint.to_string()))?
            .pop_if_empty()
            .push(&container.account)
            .push(&container.container);
        Ok(url)
    }

    pub fn object_url(&self, object: &ObjectRef) -> Result<Url> {
        let mut url = self.container_url(&object.container)?;
        url.path_segments_mut()
            .map_err(|_| TransferError::InvalidEndpoint(self.endpoint.to_string()))?
            .extend(object.name.split('/'));
        Ok(url)
    }

    async fn try_container_exists(&self, token: &AuthToken, container: &ContainerRef) -> Result<bool> {
        let url = self.container_url(container)?;
        let res = self
            .http
            .get(url)
            .header(AUTH_TOKEN_HEADER, token.as_str())
            .send()
            .await?;
        Ok(res.status() == StatusCode::OK)
    }

    async fn try_upload_object(&self, token: &AuthToken, object: &ObjectRef, body: Vec<u8>) -> Result<()> {
        let url = self.object_url(object)?;
        let res = self
            .http
            .put(url.clone())
            .header(AUTH_TOKEN_HEADER, token.as_str())
            .body(body)
            .send()
            .await?;
        expect_status(res.status(), &url, |s| s == StatusCode::CREATED)
    }

    async fn try_delete_object(&self, token: &AuthToken, object: &ObjectRef) -> Result<()> {
        let url = self.object_url(object)?;
        let res = self
            .http
            .delete(url.clone())
            .header(AUTH_TOKEN_HEADER, token.as_str())
            .send()
            .await?;
        expect_status(res.status(), &url, |s| s.is_success())
    }

    /// Walks the listing with `limit`/`marker` until the server returns an
    /// empty page. Servers may cap pages below `limit`, so a short page is
    /// not treated as the end. A marker that fails to advance is an error.
    async fn try_list_objects(&self, token: &AuthToken, container: &ContainerRef) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let mut url = self.container_url(container)?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("limit", &self.page_size.to_string());
                if let Some(marker) = &marker {
                    query.append_pair("marker", marker);
                }
            }
            let res = self
                .http
                .get(url.clone())
                .header(AUTH_TOKEN_HEADER, token.as_str())
                .send()
                .await?;
            let page = match res.status() {
                StatusCode::OK => parse_listing(&res.text().await?),
                StatusCode::NO_CONTENT => Vec::new(),
                status => {
                    return Err(TransferError::UnexpectedStatus {
                        status,
                        url: url.to_string(),
                    })
                }
            };

            let Some(last) = page.last().cloned() else {
                break;
            };
            if marker.as_deref().is_some_and(|m| last.as_str() <= m) {
                tracing::warn!(
                    target: TRACING_TARGET,
                    container = %container,
                    marker = ?marker,
                    "Listing marker did not advance"
                );
                return Err(TransferError::Listing {
                    container: container.container.clone(),
                });
            }
            names.extend(page);
            marker = Some(last);
        }
        Ok(names)
    }
}

fn expect_status(status: StatusCode, url: &Url, ok: impl Fn(StatusCode) -> bool) -> Result<()> {
    if ok(status) {
        Ok(())
    } else {
        Err(TransferError::UnexpectedStatus {
            status,
            url: url.to_string(),
        })
    }
}

/// Plain-text listing: one object name per line.
pub fn parse_listing(body: &str) -> Vec<String> {
    body.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

#[async_trait]
impl ObjectStore for StorageClient {
    async fn container_exists(&self, token: &AuthToken, container: &ContainerRef) -> bool {
        match self.try_container_exists(token, container).await {
            Ok(exists) => {
                tracing::debug!(target: TRACING_TARGET, container = %container, exists, "Container check");
                exists
            }
            Err(e) => {
                tracing::warn!(target: TRACING_TARGET, container = %container, error = %e, "Container check failed");
                false
            }
        }
    }

    async fn upload_object(&self, token: &AuthToken, object: &ObjectRef, body: Vec<u8>) -> bool {
        let size = body.len();
        match self.try_upload_object(token, object, body).await {
            Ok(()) => {
                tracing::debug!(target: TRACING_TARGET, object = %object.name, size, "Uploaded");
                true
            }
            Err(e) => {
                tracing::warn!(target: TRACING_TARGET, object = %object.name, error = %e, "Upload failed");
                false
            }
        }
    }

    async fn list_objects(
        &self,
        token: &AuthToken,
        container: &ContainerRef,
    ) -> Option<Vec<String>> {
        match self.try_list_objects(token, container).await {
            Ok(names) => {
                tracing::debug!(target: TRACING_TARGET, container = %container, count = names.len(), "Listed");
                Some(names)
            }
            Err(e) => {
                tracing::warn!(target: TRACING_TARGET, container = %container, error = %e, "Listing failed");
                None
            }
        }
    }

    async fn delete_object(&self, token: &AuthToken, object: &ObjectRef) -> bool {
        match self.try_delete_object(token, object).await {
            Ok(()) => {
                tracing::debug!(target: TRACING_TARGET, object = %object.name, "Deleted");
                true
            }
            Err(e) => {
                tracing::warn!(target: TRACING_TARGET, object = %object.name, error = %e, "Delete failed");
                false
            }
        }
    }
}
