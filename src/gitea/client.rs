// gitea/client.rs — reqwest client for the Gitea REST API (/api/v1).
//
// Authenticated with an admin access token ("Authorization: token ...").
// User creation goes through the admin endpoint so principals can be
// materialized without an interactive signup.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{GiteaApi, GiteaError, GiteaUser, Hook, Repository, Team};

pub struct GiteaClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl GiteaClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http,
            base_url,
            token: token.into(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}/api/v1{path}", self.base_url))
            .header("Authorization", format!("token {}", self.token))
    }

    async fn expect_success(
        resp: reqwest::Response,
        path: &str,
    ) -> Result<reqwest::Response, GiteaError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(GiteaError::Status {
                status: status.as_u16(),
                path: path.to_string(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(resp)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, GiteaError> {
        let resp = self.request(reqwest::Method::GET, path).send().await?;
        let resp = Self::expect_success(resp, path).await?;
        Ok(resp.json().await?)
    }

    async fn put_empty(&self, path: &str) -> Result<(), GiteaError> {
        let resp = self.request(reqwest::Method::PUT, path).send().await?;
        Self::expect_success(resp, path).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TeamSearchPage {
    data: Vec<Team>,
}

#[async_trait]
impl GiteaApi for GiteaClient {
    async fn get_user(&self, login: &str) -> Result<Option<GiteaUser>, GiteaError> {
        let path = format!("/users/{login}");
        let resp = self.request(reqwest::Method::GET, &path).send().await?;
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        let resp = Self::expect_success(resp, &path).await?;
        Ok(Some(resp.json().await?))
    }

    async fn create_user(
        &self,
        login: &str,
        email: &str,
        password: &str,
    ) -> Result<GiteaUser, GiteaError> {
        let path = "/admin/users";
        let resp = self
            .request(reqwest::Method::POST, path)
            .json(&json!({
                "username": login,
                "email": email,
                "password": password,
                "must_change_password": true,
            }))
            .send()
            .await?;
        let resp = Self::expect_success(resp, path).await?;
        Ok(resp.json().await?)
    }

    async fn list_user_repos(&self, login: &str) -> Result<Vec<Repository>, GiteaError> {
        self.get_json(&format!("/users/{login}/repos")).await
    }

    async fn find_team(&self, org: &str, name: &str) -> Result<Option<Team>, GiteaError> {
        let page: TeamSearchPage = self
            .get_json(&format!("/orgs/{org}/teams/search?q={name}"))
            .await?;
        Ok(page
            .data
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name)))
    }

    async fn create_team(
        &self,
        org: &str,
        name: &str,
        permission: &str,
    ) -> Result<Team, GiteaError> {
        let path = format!("/orgs/{org}/teams");
        let resp = self
            .request(reqwest::Method::POST, &path)
            .json(&json!({
                "name": name,
                "permission": permission,
                "units": ["repo.code", "repo.issues", "repo.pulls", "repo.releases"],
            }))
            .send()
            .await?;
        let resp = Self::expect_success(resp, &path).await?;
        Ok(resp.json().await?)
    }

    async fn list_team_members(&self, team_id: i64) -> Result<Vec<String>, GiteaError> {
        let members: Vec<GiteaUser> = self.get_json(&format!("/teams/{team_id}/members")).await?;
        Ok(members.into_iter().map(|m| m.login).collect())
    }

    async fn add_team_member(&self, team_id: i64, login: &str) -> Result<(), GiteaError> {
        self.put_empty(&format!("/teams/{team_id}/members/{login}"))
            .await
    }

    async fn remove_team_member(&self, team_id: i64, login: &str) -> Result<(), GiteaError> {
        let path = format!("/teams/{team_id}/members/{login}");
        let resp = self.request(reqwest::Method::DELETE, &path).send().await?;
        Self::expect_success(resp, &path).await?;
        Ok(())
    }

    async fn list_team_repos(&self, team_id: i64) -> Result<Vec<Repository>, GiteaError> {
        self.get_json(&format!("/teams/{team_id}/repos")).await
    }

    async fn add_team_repo(
        &self,
        team_id: i64,
        owner: &str,
        repo: &str,
    ) -> Result<(), GiteaError> {
        self.put_empty(&format!("/teams/{team_id}/repos/{owner}/{repo}"))
            .await
    }

    async fn add_collaborator(
        &self,
        owner: &str,
        repo: &str,
        login: &str,
        permission: &str,
    ) -> Result<(), GiteaError> {
        let path = format!("/repos/{owner}/{repo}/collaborators/{login}");
        let resp = self
            .request(reqwest::Method::PUT, &path)
            .json(&json!({ "permission": permission }))
            .send()
            .await?;
        Self::expect_success(resp, &path).await?;
        Ok(())
    }

    async fn list_org_hooks(&self, org: &str) -> Result<Vec<Hook>, GiteaError> {
        self.get_json(&format!("/orgs/{org}/hooks")).await
    }

    async fn create_org_hook(
        &self,
        org: &str,
        url: &str,
        secret: &str,
    ) -> Result<Hook, GiteaError> {
        let path = format!("/orgs/{org}/hooks");
        let resp = self
            .request(reqwest::Method::POST, &path)
            .json(&json!({
                "type": "gitea",
                "active": true,
                "events": ["repository"],
                "config": {
                    "url": url,
                    "content_type": "json",
                    "secret": secret,
                },
            }))
            .send()
            .await?;
        let resp = Self::expect_success(resp, &path).await?;
        Ok(resp.json().await?)
    }
}
