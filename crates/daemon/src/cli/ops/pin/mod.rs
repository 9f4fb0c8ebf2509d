use clap::{Args, Subcommand};

pub mod add;
mod format;
pub mod ls;
pub mod rm;
pub mod status;
pub mod usage;

use crate::cli::op::Op;

crate::command_enum! {
    (Add, add::Add),
    (Ls, ls::Ls),
    (Status, status::Status),
    (Rm, rm::Rm),
    (Usage, usage::Usage),
}

pub type PinCommand = Command;

/// Create, inspect and remove pins on a running daemon
#[derive(Args, Debug, Clone)]
pub struct Pin {
    #[command(subcommand)]
    pub command: PinCommand,
}

#[async_trait::async_trait]
impl Op for Pin {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
