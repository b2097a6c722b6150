use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::collab::{MatchupDesigns, MatchupSnapshot, VoteSource};
use crate::foundation::error::{BrawlError, BrawlResult};
use crate::pixel::design::{CharacterDesign, ValidDesign};

#[derive(Debug, Default, serde::Deserialize)]
struct WireCount {
    #[serde(default)]
    votes: u64,
}

#[derive(Debug, serde::Deserialize)]
struct WireOption {
    name: String,
    #[serde(rename = "_count", default)]
    count: WireCount,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePoll {
    id: String,
    option_a: WireOption,
    option_b: WireOption,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, serde::Deserialize)]
struct PollEnvelope {
    current: Option<WirePoll>,
}

#[derive(Debug, serde::Deserialize)]
struct RotateEnvelope {
    #[serde(default)]
    success: bool,
    poll: Option<WirePoll>,
    error: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDesigns {
    option_a: Option<serde_json::Value>,
    option_b: Option<serde_json::Value>,
}

fn normalize(poll: WirePoll) -> BrawlResult<MatchupSnapshot> {
    let id = poll.id.trim();
    if id.is_empty() {
        return Err(BrawlError::collaborator("poll has an empty id"));
    }
    let expires_at = u64::try_from(poll.expires_at.timestamp_millis())
        .map_err(|_| BrawlError::collaborator("poll expiry predates the epoch"))?;
    Ok(MatchupSnapshot {
        matchup_id: id.to_string(),
        option_a_name: poll.option_a.name,
        option_b_name: poll.option_b.name,
        option_a_votes: poll.option_a.count.votes,
        option_b_votes: poll.option_b.count.votes,
        expires_at,
    })
}

/// Parse the `GET /api/poll` body.
pub fn parse_poll(body: &str) -> BrawlResult<MatchupSnapshot> {
    let envelope: PollEnvelope = serde_json::from_str(body)
        .map_err(|e| BrawlError::collaborator(format!("malformed poll payload: {e}")))?;
    let current = envelope
        .current
        .ok_or_else(|| BrawlError::collaborator("poll service has no current poll"))?;
    normalize(current)
}

/// Parse the `POST /api/poll/rotate` body.
pub fn parse_rotate(body: &str) -> BrawlResult<MatchupSnapshot> {
    let envelope: RotateEnvelope = serde_json::from_str(body)
        .map_err(|e| BrawlError::collaborator(format!("malformed rotate payload: {e}")))?;
    match envelope {
        RotateEnvelope {
            success: true,
            poll: Some(poll),
            ..
        } => normalize(poll),
        RotateEnvelope { error, .. } => Err(BrawlError::collaborator(format!(
            "rotation rejected: {}",
            error.as_deref().unwrap_or("no poll returned")
        ))),
    }
}

fn validate_side(
    matchup_id: &str,
    side: &str,
    raw: Option<serde_json::Value>,
) -> Option<Arc<ValidDesign>> {
    let raw = raw.filter(|v| !v.is_null())?;
    let parsed = serde_json::from_value::<CharacterDesign>(raw)
        .map_err(|e| BrawlError::validation(e.to_string()))
        .and_then(|d| d.validate());
    match parsed {
        Ok(d) => Some(Arc::new(d)),
        Err(e) => {
            tracing::warn!(matchup_id, side, error = %e, "discarding invalid character design");
            None
        }
    }
}

/// Parse the `GET /api/poll/designs/{id}` body. A `null` body means no designs yet.
///
/// Invalid designs are dropped per side so the renderer falls back to the built-in rigs.
pub fn parse_designs(matchup_id: &str, body: &str) -> BrawlResult<MatchupDesigns> {
    let wire: Option<WireDesigns> = serde_json::from_str(body)
        .map_err(|e| BrawlError::collaborator(format!("malformed designs payload: {e}")))?;
    let Some(wire) = wire else {
        return Ok(MatchupDesigns::default());
    };
    Ok(MatchupDesigns {
        option_a: validate_side(matchup_id, "A", wire.option_a),
        option_b: validate_side(matchup_id, "B", wire.option_b),
    })
}

/// Poll service over HTTP.
#[derive(Clone, Debug)]
pub struct HttpPollApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPollApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> BrawlResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BrawlError::collaborator(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn body(&self, req: reqwest::RequestBuilder) -> BrawlResult<String> {
        let resp = req
            .send()
            .await
            .map_err(|e| BrawlError::collaborator(format!("request failed: {e}")))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| BrawlError::collaborator(format!("reading response: {e}")))?;
        if !status.is_success() {
            return Err(BrawlError::collaborator(format!("HTTP {status}: {text}")));
        }
        Ok(text)
    }
}

#[async_trait]
impl VoteSource for HttpPollApi {
    async fn current_matchup(&self) -> BrawlResult<MatchupSnapshot> {
        let body = self.body(self.client.get(self.url("/api/poll"))).await?;
        parse_poll(&body)
    }

    async fn advance_matchup(&self) -> BrawlResult<MatchupSnapshot> {
        let body = self
            .body(self.client.post(self.url("/api/poll/rotate")))
            .await?;
        parse_rotate(&body)
    }

    async fn designs(&self, matchup_id: &str) -> BrawlResult<MatchupDesigns> {
        let body = self
            .body(
                self.client
                    .get(self.url(&format!("/api/poll/designs/{matchup_id}"))),
            )
            .await?;
        parse_designs(matchup_id, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLL: &str = r#"{
        "current": {
            "id": "p42",
            "optionA": {"name": "Cats", "_count": {"votes": 12}},
            "optionB": {"name": "Dogs", "_count": {"votes": 3}},
            "expiresAt": "2026-01-01T00:00:00.000Z"
        },
        "previous": null,
        "combatState": null
    }"#;

    #[test]
    fn poll_payload_normalizes() {
        let snap = parse_poll(POLL).unwrap();
        assert_eq!(snap.matchup_id, "p42");
        assert_eq!(snap.option_a_name, "Cats");
        assert_eq!(snap.option_a_votes, 12);
        assert_eq!(snap.option_b_votes, 3);
        assert_eq!(snap.expires_at, 1_767_225_600_000);
    }

    #[test]
    fn missing_count_reads_as_zero() {
        let body = r#"{"current":{"id":"x","optionA":{"name":"a"},"optionB":{"name":"b","_count":{}},
            "expiresAt":"2026-01-01T00:00:00Z"}}"#;
        let snap = parse_poll(body).unwrap();
        assert_eq!(snap.votes().a, 0);
        assert_eq!(snap.votes().b, 0);
    }

    #[test]
    fn malformed_poll_payloads_are_collaborator_errors() {
        for body in [
            "{}",
            r#"{"current":null}"#,
            r#"{"current":{"id":"  ","optionA":{"name":"a"},"optionB":{"name":"b"},"expiresAt":"2026-01-01T00:00:00Z"}}"#,
            r#"{"current":{"id":"x","optionA":{"name":"a"},"optionB":{"name":"b"},"expiresAt":"tomorrow"}}"#,
            "<html>",
        ] {
            let err = parse_poll(body).unwrap_err();
            assert!(matches!(err, BrawlError::Collaborator(_)), "{body}");
        }
    }

    #[test]
    fn rotate_requires_success_and_poll() {
        let ok = r#"{"success":true,"poll":{"id":"n","optionA":{"name":"a"},"optionB":{"name":"b"},
            "expiresAt":"2026-01-01T00:00:00Z"}}"#;
        assert_eq!(parse_rotate(ok).unwrap().matchup_id, "n");
        let err = parse_rotate(r#"{"success":false,"error":"db down"}"#).unwrap_err();
        assert!(err.to_string().contains("db down"));
    }

    #[test]
    fn null_designs_mean_none() {
        let d = parse_designs("x", "null").unwrap();
        assert!(d.option_a.is_none() && d.option_b.is_none());
    }

    #[test]
    fn invalid_design_side_is_dropped() {
        let body = r##"{
            "optionA": {"size":{"width":4,"height":4},"parts":[{"name":"head","shapes":[
                {"type":"rect","x":0,"y":0,"w":2,"h":2,"color":"#ff0000"}]}]},
            "optionB": {"size":{"width":0,"height":4},"parts":[]}
        }"##;
        let d = parse_designs("x", body).unwrap();
        assert!(d.option_a.is_some());
        assert!(d.option_b.is_none());
    }
}
