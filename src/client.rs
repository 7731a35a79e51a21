use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{
    AuthTokens, CheckResponse, Credentials, Department, GroupsResponse, Mark, ScheduleDay,
    ScheduleResponse, UserInfo,
};

pub struct ApiClient {
    http: Client,
    oauth_url: String,
    api_url: String,
    client_id: String,
    scope: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent(concat!("student-id/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::Client)?;

        Ok(Self {
            http,
            oauth_url: config.oauth_url.clone(),
            api_url: config.api_url.clone(),
            client_id: config.client_id.clone(),
            scope: config.scope.clone(),
        })
    }

    /// The signed-in user, or `None` when the server reports the token as
    /// not authenticated.
    pub async fn check(&self, access_token: &str) -> Result<Option<UserInfo>, ApiError> {
        let url = parse_url(&format!("{}/check", self.oauth_url))?;
        let response = self
            .http
            .get(url.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|source| transport(&url, source))?;
        let check: CheckResponse = decode(&url, response).await?;

        Ok(check
            .auth_info
            .filter(|info| info.auth == 1)
            .and_then(|info| info.user))
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<AuthTokens, ApiError> {
        let url = token_url(
            &self.oauth_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("grant_type", "password"),
                ("scope", self.scope.as_str()),
            ],
        )?;
        let response = self
            .http
            .post(url.clone())
            .json(credentials)
            .send()
            .await
            .map_err(|source| transport(&url, source))?;

        decode(&url, response).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, ApiError> {
        let url = token_url(
            &self.oauth_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
        )?;
        let response = self
            .http
            .post(url.clone())
            .send()
            .await
            .map_err(|source| transport(&url, source))?;

        decode(&url, response).await
    }

    /// All days of the group's schedule, flattened across weeks.
    pub async fn schedule(&self, group_name: &str) -> Result<Vec<ScheduleDay>, ApiError> {
        let url = schedule_url(&self.api_url, group_name)?;
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|source| transport(&url, source))?;
        let schedule: ScheduleResponse = decode(&url, response).await?;

        Ok(schedule.into_days())
    }

    pub async fn marks(&self, access_token: &str) -> Result<Vec<Mark>, ApiError> {
        let url = parse_url(&format!("{}/s/general/v1/mark/my", self.api_url))?;
        let response = self
            .http
            .get(url.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|source| transport(&url, source))?;

        decode(&url, response).await
    }

    pub async fn groups(&self) -> Result<Vec<Department>, ApiError> {
        let url = parse_url(&format!(
            "{}/s/schedule/v1/schedule/actual_groups",
            self.api_url
        ))?;
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|source| transport(&url, source))?;
        let groups: GroupsResponse = decode(&url, response).await?;

        Ok(groups.items)
    }
}

fn parse_url(raw: &str) -> Result<Url, ApiError> {
    Url::parse(raw).map_err(|e| ApiError::Url {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

fn transport(url: &Url, source: reqwest::Error) -> ApiError {
    ApiError::Transport {
        url: url.to_string(),
        source,
    }
}

pub fn token_url(oauth_url: &str, params: &[(&str, &str)]) -> Result<Url, ApiError> {
    let mut url = parse_url(&format!("{oauth_url}/access_token"))?;
    url.query_pairs_mut().extend_pairs(params);
    Ok(url)
}

pub fn schedule_url(api_url: &str, group_name: &str) -> Result<Url, ApiError> {
    let mut url = parse_url(&format!("{api_url}/s/schedule/v1/schedule/group"))?;
    url.path_segments_mut()
        .map_err(|()| ApiError::Url {
            url: api_url.to_string(),
            reason: "cannot be a base url".to_string(),
        })?
        .push(group_name);
    Ok(url)
}

async fn decode<T: DeserializeOwned>(url: &Url, response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| transport(url, source))?;

    if !status.is_success() {
        return Err(ApiError::Status {
            url: url.to_string(),
            status,
            body: body.trim().to_string(),
        });
    }

    serde_json::from_str(&body).map_err(|source| ApiError::Decode {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_url_encodes_group_name() {
        let url = schedule_url("https://api.example.ru", "ЦИС-26 (б)").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.ru/s/schedule/v1/schedule/group/%D0%A6%D0%98%D0%A1-26%20(%D0%B1)"
        );
    }

    #[test]
    fn slash_in_group_name_stays_one_segment() {
        let url = schedule_url("https://api.example.ru", "A/B").unwrap();
        assert!(url.as_str().ends_with("/group/A%2FB"));
    }

    #[test]
    fn token_url_carries_grant_parameters() {
        let url = token_url(
            "https://oauth.example.ru",
            &[("client_id", "app"), ("grant_type", "password"), ("scope", "general")],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://oauth.example.ru/access_token?client_id=app&grant_type=password&scope=general"
        );
    }

    #[test]
    fn relative_base_is_rejected() {
        assert!(matches!(
            schedule_url("", "group"),
            Err(ApiError::Url { .. })
        ));
    }
}
