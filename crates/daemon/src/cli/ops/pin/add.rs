use std::collections::BTreeMap;

use clap::Args;

use common::prelude::CreatePin;
use pinsvc_daemon::http_server::api::client::ApiError;

use super::format::pin_details;

#[derive(Args, Debug, Clone)]
pub struct Add {
    /// CID to pin
    pub cid: String,

    /// Human readable name
    #[arg(long)]
    pub name: Option<String>,

    /// Multiaddr of a peer known to hold the content (repeatable)
    #[arg(long = "origin")]
    pub origins: Vec<String>,

    /// Metadata entry as key=value (repeatable)
    #[arg(long = "meta", value_parser = parse_meta)]
    pub meta: Vec<(String, String)>,
}

pub(crate) fn parse_meta(entry: &str) -> Result<(String, String), String> {
    match entry.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", entry)),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PinAddError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Add {
    type Error = PinAddError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let request = CreatePin {
            cid: self.cid.clone(),
            name: self.name.clone(),
            origins: self.origins.clone(),
            meta: self.meta.iter().cloned().collect::<BTreeMap<_, _>>(),
        };

        let response = ctx.client.call(request).await?;
        Ok(pin_details(&response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meta() {
        assert_eq!(
            parse_meta("app=demo").unwrap(),
            ("app".to_string(), "demo".to_string())
        );
        assert_eq!(
            parse_meta("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_meta("novalue").is_err());
        assert!(parse_meta("=x").is_err());
    }
}
