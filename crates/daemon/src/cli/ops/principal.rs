use clap::{Args, Subcommand, ValueEnum};

use common::prelude::Principal as Caller;
use pinsvc_daemon::state::{AppState, StateError};
use pinsvc_daemon::{Database, DatabaseSetupError};

/// Manage the principals allowed to call the API
#[derive(Args, Debug, Clone)]
pub struct Principal {
    #[command(subcommand)]
    pub command: PrincipalCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum PrincipalCommand {
    /// Register a principal and print its new API key
    Add(Add),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Human,
    Agent,
}

#[derive(Args, Debug, Clone)]
pub struct Add {
    /// Principal id
    pub id: String,

    #[arg(long, value_enum, default_value = "agent")]
    pub kind: Kind,

    /// Id of the human who claimed this agent
    #[arg(long)]
    pub claimed_by: Option<String>,

    /// Storage quota in bytes (default from config)
    #[arg(long)]
    pub quota_bytes: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum PrincipalError {
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("database error: {0}")]
    DatabaseSetup(#[from] DatabaseSetupError),
    #[error("failed to register principal: {0}")]
    Database(#[from] sqlx::Error),
    #[error("only agents can be claimed")]
    ClaimedHuman,
    #[error("principal id must not be empty")]
    EmptyId,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Principal {
    type Error = PrincipalError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        match &self.command {
            PrincipalCommand::Add(add) => add.run(ctx).await,
        }
    }
}

impl Add {
    fn principal(&self) -> Result<Caller, PrincipalError> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(PrincipalError::EmptyId);
        }
        match self.kind {
            Kind::Human if self.claimed_by.is_some() => Err(PrincipalError::ClaimedHuman),
            Kind::Human => Ok(Caller::human(id)),
            Kind::Agent => Ok(Caller::agent(id, self.claimed_by.clone())),
        }
    }

    async fn run(&self, ctx: &crate::cli::op::OpContext) -> Result<String, PrincipalError> {
        let principal = self.principal()?;
        let state = AppState::load(ctx.config_path.clone())?;
        let quota_bytes = self
            .quota_bytes
            .unwrap_or(state.config.default_quota_bytes);

        let database = Database::connect_path(&state.db_path).await?;
        let api_key = database.create_principal(&principal, quota_bytes).await?;

        Ok(format!(
            "registered {} {} with a quota of {} bytes\napi key: {}\n\
             the key is shown only once; store it now",
            principal.kind, principal.id, quota_bytes, api_key
        ))
    }
}
