use super::GitHubClient;
use crate::api::Team;
use crate::error::Result;
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

const PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct Member {
    #[serde(default)]
    login: Option<String>,
    /// Enterprise memberships may wrap the account.
    #[serde(default)]
    user: Option<Box<Member>>
}

impl Member {
    fn into_login(self) -> Option<String> {
        match (self.login, self.user) {
            (Some(login), _) if !login.is_empty() => Some(login),
            (_, Some(user)) => user.into_login(),
            _ => None
        }
    }
}

impl GitHubClient {
    /// Follows `page` numbers until a page comes back shorter than `per_page`.
    async fn fetch_all_pages<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let url = self.url(&format!("{}?per_page={}&page={}", path, PER_PAGE, page));
            let batch: Vec<T> = self.request_json(Method::GET, &url, None).await?;
            let count = batch.len();
            items.extend(batch);

            debug!(path = %path, page, count, "Fetched page");
            if count < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    pub(crate) async fn fetch_org_teams(&self, org: &str) -> Result<Vec<Team>> {
        self.fetch_all_pages(&format!("/orgs/{}/teams", urlencoding::encode(org)))
            .await
    }

    pub(crate) async fn fetch_enterprise_teams(&self) -> Result<Vec<Team>> {
        self.fetch_all_pages(&format!(
            "/enterprises/{}/teams",
            urlencoding::encode(&self.enterprise)
        ))
        .await
    }

    pub(crate) async fn fetch_org_team_members(
        &self,
        org: &str,
        team_slug: &str
    ) -> Result<Vec<String>> {
        let members: Vec<Member> = self
            .fetch_all_pages(&format!(
                "/orgs/{}/teams/{}/members",
                urlencoding::encode(org),
                urlencoding::encode(team_slug)
            ))
            .await?;
        Ok(members.into_iter().filter_map(Member::into_login).collect())
    }

    pub(crate) async fn fetch_enterprise_team_members(&self, team_slug: &str) -> Result<Vec<String>> {
        let members: Vec<Member> = self
            .fetch_all_pages(&format!(
                "/enterprises/{}/teams/{}/memberships",
                urlencoding::encode(&self.enterprise),
                urlencoding::encode(team_slug)
            ))
            .await?;
        Ok(members.into_iter().filter_map(Member::into_login).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_login_shapes() {
        let direct: Member = serde_json::from_str(r#"{"login": "alice", "id": 1}"#).unwrap();
        assert_eq!(direct.into_login().as_deref(), Some("alice"));

        let wrapped: Member =
            serde_json::from_str(r#"{"user": {"login": "bob"}, "role": "member"}"#).unwrap();
        assert_eq!(wrapped.into_login().as_deref(), Some("bob"));

        let empty: Member = serde_json::from_str(r#"{"id": 3}"#).unwrap();
        assert!(empty.into_login().is_none());
    }
}
