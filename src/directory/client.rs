// directory/client.rs — reqwest client for the directory CRUD wrapper.
//
// Thin typed wrapper: every call fetches a bearer token from the shared
// TokenSource, hits one endpoint, and maps non-2xx responses to
// DirectoryError::Status (404 → NotFound for the lookups).

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use super::{Department, DirGroup, DirUser, DirectoryApi, DirectoryError};
use crate::auth::TokenSource;
use async_trait::async_trait;

pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenSource>,
}

impl DirectoryClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, tokens: Arc<TokenSource>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http,
            base_url,
            tokens,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        not_found: Option<(&'static str, &str)>,
    ) -> Result<T, DirectoryError> {
        let token = self.tokens.bearer().await?;
        let resp = self
            .http
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await?;
        let status = resp.status();
        if status.as_u16() == 404 {
            if let Some((kind, name)) = not_found {
                return Err(DirectoryError::NotFound {
                    kind,
                    name: name.to_string(),
                });
            }
        }
        if !status.is_success() {
            return Err(DirectoryError::Status {
                status: status.as_u16(),
                path: path.to_string(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(resp.json().await?)
    }

    async fn send_json<B: Serialize>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), DirectoryError> {
        let token = self.tokens.bearer().await?;
        let mut req = self
            .http
            .request(method, self.url(path))
            .bearer_auth(token);
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DirectoryError::Status {
                status: status.as_u16(),
                path: path.to_string(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryApi for DirectoryClient {
    async fn get_user(&self, uid: &str) -> Result<DirUser, DirectoryError> {
        self.get_json(&format!("/users/{uid}"), Some(("user", uid)))
            .await
    }

    async fn get_group(&self, name: &str) -> Result<DirGroup, DirectoryError> {
        self.get_json(&format!("/groups/{name}"), Some(("group", name)))
            .await
    }

    async fn get_department(&self, name: &str) -> Result<Department, DirectoryError> {
        self.get_json(&format!("/departments/{name}"), Some(("department", name)))
            .await
    }

    async fn list_users(&self) -> Result<Vec<DirUser>, DirectoryError> {
        self.get_json("/users", None).await
    }

    async fn list_groups(&self) -> Result<Vec<DirGroup>, DirectoryError> {
        self.get_json("/groups", None).await
    }

    async fn list_departments(&self) -> Result<Vec<Department>, DirectoryError> {
        self.get_json("/departments", None).await
    }

    async fn create_group(&self, name: &str, description: &str) -> Result<(), DirectoryError> {
        self.send_json(
            reqwest::Method::POST,
            "/groups",
            Some(&json!({ "name": name, "description": description })),
        )
        .await
    }

    async fn delete_group(&self, name: &str) -> Result<(), DirectoryError> {
        self.send_json::<()>(reqwest::Method::DELETE, &format!("/groups/{name}"), None)
            .await
    }

    async fn add_user_to_group(&self, group: &str, uid: &str) -> Result<(), DirectoryError> {
        self.send_json::<()>(
            reqwest::Method::PUT,
            &format!("/groups/{group}/members/{uid}"),
            None,
        )
        .await
    }

    async fn remove_user_from_group(&self, group: &str, uid: &str) -> Result<(), DirectoryError> {
        self.send_json::<()>(
            reqwest::Method::DELETE,
            &format!("/groups/{group}/members/{uid}"),
            None,
        )
        .await
    }

    async fn assign_repos_to_user(
        &self,
        uid: &str,
        repos: &[String],
    ) -> Result<(), DirectoryError> {
        self.send_json(
            reqwest::Method::PUT,
            &format!("/users/{uid}/repositories"),
            Some(&json!({ "repositories": repos })),
        )
        .await
    }

    async fn assign_repos_to_group(
        &self,
        group: &str,
        repos: &[String],
    ) -> Result<(), DirectoryError> {
        self.send_json(
            reqwest::Method::PUT,
            &format!("/groups/{group}/repositories"),
            Some(&json!({ "repositories": repos })),
        )
        .await
    }

    async fn assign_repos_to_department(
        &self,
        department: &str,
        repos: &[String],
    ) -> Result<(), DirectoryError> {
        self.send_json(
            reqwest::Method::PUT,
            &format!("/departments/{department}/repositories"),
            Some(&json!({ "repositories": repos })),
        )
        .await
    }

    async fn health_check(&self) -> Result<(), DirectoryError> {
        self.get_json::<serde_json::Value>("/health", None)
            .await
            .map(|_| ())
    }
}
