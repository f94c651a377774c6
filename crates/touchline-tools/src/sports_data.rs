use std::time::Duration;

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use touchline_core::config::SportsDataConfig;
use touchline_core::error::{Result, TouchlineError};
use touchline_core::traits::DomainDataProvider;
use touchline_core::types::TeamRecord;

/// TheSportsDB v1 JSON API client. Only soccer teams are returned.
pub struct SportsDbClient {
    base_url: String,
    api_key: String,
    timeout_secs: u64,
    http: reqwest::Client,
}

/// Envelope returned by `searchteams.php` and `lookupteam.php`.
/// `teams` is `null` when nothing matched.
#[derive(Debug, Deserialize)]
struct TeamsEnvelope {
    #[serde(default)]
    teams: Option<Vec<serde_json::Value>>,
}

impl SportsDbClient {
    pub fn new(config: &SportsDataConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| TouchlineError::Config(format!("sports data client: {e}")))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout_secs,
            http,
        })
    }

    fn url(&self, endpoint: &str, param: &str, value: &str) -> String {
        format!(
            "{}/{}/{}?{}={}",
            self.base_url,
            self.api_key,
            endpoint,
            param,
            urlencoding::encode(value)
        )
    }

    async fn fetch(&self, url: &str) -> Result<Vec<serde_json::Value>> {
        debug!(url, "Querying TheSportsDB");
        let resp = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                TouchlineError::ProviderTimeout {
                    provider: self.name().to_string(),
                    timeout_secs: self.timeout_secs,
                }
            } else {
                self.fault(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(self.fault(format!("HTTP {status}")));
        }

        let envelope: TeamsEnvelope = resp.json().await.map_err(|e| self.fault(e.to_string()))?;
        Ok(envelope.teams.unwrap_or_default())
    }

    fn fault(&self, message: String) -> TouchlineError {
        TouchlineError::Provider {
            provider: self.name().to_string(),
            message,
        }
    }
}

fn text_field(raw: &serde_json::Value, key: &str) -> Option<String> {
    match raw.get(key)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Map one raw team object onto a [`TeamRecord`]; `None` for non-soccer teams.
pub fn team_from_api(raw: &serde_json::Value) -> Option<TeamRecord> {
    let sport = text_field(raw, "strSport")?;
    if sport != "Soccer" {
        return None;
    }
    Some(TeamRecord {
        team_id: text_field(raw, "idTeam").unwrap_or_default(),
        team_name: text_field(raw, "strTeam").unwrap_or_default(),
        alternate_name: text_field(raw, "strAlternate"),
        formation_year: text_field(raw, "intFormedYear"),
        sport_type: sport,
        league_name: text_field(raw, "strLeague"),
        stadium_name: text_field(raw, "strStadium"),
        stadium_location: text_field(raw, "strStadiumLocation"),
        team_description: text_field(raw, "strDescriptionEN"),
        badge_image_url: text_field(raw, "strTeamBadge").or_else(|| text_field(raw, "strBadge")),
        jersey_image_url: text_field(raw, "strTeamJersey").or_else(|| text_field(raw, "strEquipment")),
        official_website: text_field(raw, "strWebsite"),
        facebook_url: text_field(raw, "strFacebook"),
        twitter_url: text_field(raw, "strTwitter"),
        youtube_url: text_field(raw, "strYoutube"),
    })
}

impl DomainDataProvider for SportsDbClient {
    fn name(&self) -> &str {
        "thesportsdb"
    }

    fn find_by_name<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Vec<TeamRecord>>> {
        Box::pin(async move {
            let raw = self.fetch(&self.url("searchteams.php", "t", name)).await?;
            Ok(raw.iter().filter_map(team_from_api).collect())
        })
    }

    fn get_by_id<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<TeamRecord>>> {
        Box::pin(async move {
            let raw = self.fetch(&self.url("lookupteam.php", "id", id)).await?;
            Ok(raw.first().and_then(team_from_api))
        })
    }
}
