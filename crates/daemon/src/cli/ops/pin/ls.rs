use clap::Args;

use common::pins::PinResults;
use common::prelude::PinListQuery;
use pinsvc_daemon::http_server::api::client::ApiError;
use pinsvc_daemon::http_server::api::v0::agents::pins::ListAgentPinsRequest;

use super::add::parse_meta;
use super::format::pin_line;

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// List the pins of this agent instead of your own
    #[arg(long)]
    pub agent: Option<String>,

    /// Only these CIDs (comma separated)
    #[arg(long)]
    pub cid: Option<String>,

    #[arg(long)]
    pub name: Option<String>,

    /// exact, iexact, partial or ipartial
    #[arg(long = "match")]
    pub name_match: Option<String>,

    /// Only these statuses (comma separated)
    #[arg(long)]
    pub status: Option<String>,

    /// RFC 3339 timestamp
    #[arg(long)]
    pub before: Option<String>,

    /// RFC 3339 timestamp
    #[arg(long)]
    pub after: Option<String>,

    /// Metadata entry as key=value (repeatable)
    #[arg(long = "meta", value_parser = parse_meta)]
    pub meta: Vec<(String, String)>,

    #[arg(long)]
    pub limit: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum PinLsError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("invalid metadata filter: {0}")]
    Meta(#[from] serde_json::Error),
}

impl Ls {
    fn query(&self) -> Result<PinListQuery, serde_json::Error> {
        let meta = if self.meta.is_empty() {
            None
        } else {
            let map: serde_json::Map<String, serde_json::Value> = self
                .meta
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            Some(serde_json::to_string(&map)?)
        };

        Ok(PinListQuery {
            cid: self.cid.clone(),
            name: self.name.clone(),
            name_match: self.name_match.clone(),
            status: self.status.clone(),
            before: self.before.clone(),
            after: self.after.clone(),
            meta,
            limit: self.limit.map(|l| l.to_string()),
        })
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Ls {
    type Error = PinLsError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let query = self.query()?;
        let response: PinResults = match &self.agent {
            Some(agent_id) => {
                ctx.client
                    .call(ListAgentPinsRequest {
                        agent_id: agent_id.clone(),
                        query,
                    })
                    .await?
            }
            None => ctx.client.call(query).await?,
        };

        if response.results.is_empty() {
            return Ok("No pins found".to_string());
        }

        let mut lines: Vec<String> = response.results.iter().map(pin_line).collect();
        if response.count > response.results.len() as u64 {
            lines.push(format!(
                "({} of {} shown)",
                response.results.len(),
                response.count
            ));
        }
        Ok(lines.join("\n"))
    }
}
