use {
    anyhow::Result,
    camper_oauth::{Credential, CredentialOrigin, PersistOutcome, format_expiry},
    chrono::{DateTime, Utc},
    clap::Subcommand,
};

use crate::context::Context;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Show where credentials come from and whether the token is still valid.
    Status,
    /// Refresh the access token now, regardless of expiry.
    Refresh,
}

pub async fn handle_auth(action: AuthAction) -> Result<()> {
    let ctx = Context::load()?;
    match action {
        AuthAction::Status => status(&ctx).await,
        AuthAction::Refresh => refresh(&ctx).await,
    }
}

async fn status(ctx: &Context) -> Result<()> {
    let credential = ctx.auth.store().current().await;
    println!("source:   {}", describe_origin(&ctx.origin));
    println!("account:  {}", credential.account_id);
    println!("token:    {}", describe_expiry(&credential, Utc::now()));
    if let Some(expires_at) = &credential.expires_at {
        println!("expires:  {}", format_expiry(expires_at));
    }
    println!(
        "refresh:  {}",
        if credential.can_refresh() {
            "available"
        } else {
            "no refresh token"
        }
    );
    Ok(())
}

async fn refresh(ctx: &Context) -> Result<()> {
    println!("Refreshing access token...");
    let outcome = ctx.auth.force_refresh().await?;
    let credential = ctx.auth.store().current().await;
    println!("Refreshed: {}", describe_expiry(&credential, Utc::now()));
    println!("{}", describe_outcome(&outcome));
    Ok(())
}

fn describe_origin(origin: &CredentialOrigin) -> String {
    match origin {
        CredentialOrigin::TokenFile(path) => format!("token file {}", path.display()),
        CredentialOrigin::Environment => "environment".to_string(),
    }
}

fn describe_expiry(credential: &Credential, now: DateTime<Utc>) -> String {
    let Some(expires_at) = credential.expires_at else {
        return "no expiry".to_string();
    };
    if expires_at <= now {
        return "expired".to_string();
    }
    let remaining = expires_at - now;
    let hours = remaining.num_hours();
    let mins = remaining.num_minutes() % 60;
    format!("valid ({hours}h {mins}m remaining)")
}

fn describe_outcome(outcome: &PersistOutcome) -> String {
    match outcome {
        PersistOutcome::Written(path) => format!("Saved to {}", path.display()),
        PersistOutcome::MemoryOnly => {
            "Not saved: credentials come from the environment".to_string()
        },
        PersistOutcome::Failed(reason) => format!("Not saved: {reason}"),
    }
}
