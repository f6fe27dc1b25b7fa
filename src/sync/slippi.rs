//! Slippi ranked-profile client.
//!
//! Looks up one connect code through the Slippi GraphQL gateway. The wire
//! types mirror the gateway's response; [`super::convert`] turns them into a
//! [`RankedProfile`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use super::convert::to_ranked_profile;
use crate::fetch::{FetchError, Fetcher};
use crate::models::{is_valid_connect_code, RankedProfile};

pub const DEFAULT_ENDPOINT: &str = "https://gql-gateway-dot-slippi.uc.r.appspot.com/graphql";

const OPERATION_NAME: &str = "AccountManagementPageQuery";

const PROFILE_QUERY: &str = r#"
fragment userProfilePage on User {
  displayName
  connectCode { code }
  rankedNetplayProfile {
    id
    ratingOrdinal
    ratingUpdateCount
    wins
    losses
    dailyGlobalPlacement
    dailyRegionalPlacement
    continent
    characters { id character gameCount }
  }
}
query AccountManagementPageQuery($cc: String!) {
  getConnectCode(code: $cc) {
    user { ...userProfilePage }
  }
}
"#;

/// Outcome of one profile lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileLookup {
    Found(RankedProfile),

    /// No account uses this connect code
    NotFound,

    /// The code failed the format check; nothing was sent upstream
    InvalidCode(String),
}

/// Source of ranked profiles, keyed by connect code.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch the current profile for `code`.
    async fn fetch_profile(&self, code: &str) -> Result<ProfileLookup, FetchError>;

    /// Whether any account uses `code`.
    async fn does_exist(&self, code: &str) -> Result<bool, FetchError> {
        Ok(matches!(
            self.fetch_profile(code).await?,
            ProfileLookup::Found(_)
        ))
    }
}

/// GraphQL response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlResponse {
    pub data: Option<ResponseData>,

    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlError {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
    pub get_connect_code: Option<ConnectCodeLookup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectCodeLookup {
    pub user: Option<SlippiUser>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlippiUser {
    pub display_name: Option<String>,
    pub connect_code: Option<CodeField>,
    pub ranked_netplay_profile: Option<NetplayProfile>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CodeField {
    pub code: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetplayProfile {
    pub id: Option<WireId>,
    pub rating_ordinal: Option<f64>,
    pub rating_update_count: Option<u32>,
    pub wins: Option<u32>,
    pub losses: Option<u32>,
    pub daily_global_placement: Option<u32>,
    pub daily_regional_placement: Option<u32>,
    pub continent: Option<String>,

    #[serde(default)]
    pub characters: Vec<WireCharacter>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCharacter {
    pub id: Option<WireId>,
    pub character: String,
    pub game_count: u32,
}

/// GraphQL `ID`, which the gateway sends as either a string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum WireId {
    Text(String),
    Number(u64),
}

impl std::fmt::Display for WireId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireId::Text(s) => write!(f, "{}", s),
            WireId::Number(n) => write!(f, "{}", n),
        }
    }
}

impl GraphqlResponse {
    /// The user behind the looked-up code, if any.
    pub fn into_user(self) -> Option<SlippiUser> {
        for error in &self.errors {
            warn!("GraphQL error: {}", error.message);
        }
        self.data?.get_connect_code?.user
    }
}

/// [`ProfileSource`] backed by the Slippi GraphQL gateway.
pub struct SlippiClient {
    fetcher: Arc<Fetcher>,
    endpoint: Url,
}

impl SlippiClient {
    pub fn new(fetcher: Arc<Fetcher>, endpoint: &str) -> Result<Self, FetchError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", endpoint, e)))?;
        Ok(Self { fetcher, endpoint })
    }

    /// Request body for one connect code.
    fn request_body(code: &str) -> serde_json::Value {
        json!({
            "operationName": OPERATION_NAME,
            "query": PROFILE_QUERY,
            "variables": { "cc": code.to_uppercase() },
        })
    }
}

#[async_trait]
impl ProfileSource for SlippiClient {
    fn name(&self) -> &'static str {
        "slippi"
    }

    async fn fetch_profile(&self, code: &str) -> Result<ProfileLookup, FetchError> {
        if !is_valid_connect_code(code) {
            warn!("Invalid connect code: {}", code);
            return Ok(ProfileLookup::InvalidCode(code.to_string()));
        }

        info!("Fetching ranked profile for {}", code);
        let response: GraphqlResponse = self
            .fetcher
            .post_json(&self.endpoint, &Self::request_body(code))
            .await?;

        match response.into_user() {
            Some(user) => Ok(ProfileLookup::Found(to_ranked_profile(&user))),
            None => {
                debug!("No account for {}", code);
                Ok(ProfileLookup::NotFound)
            }
        }
    }
}
