//! Account and token lifecycle commands.

use anyhow::Result;
use chrono::DateTime;
use clap::Args;
use colored::Colorize;
use serde::{Deserialize, Serialize};

use super::{HumanReadable, format_timestamp, make_empty_request, make_request, output, truncate};

/// Username and password.
#[derive(Args)]
pub struct CredentialsArgs {
    pub username: String,

    /// Password (prefer the NOTES_PASSWORD variable over the command line)
    #[arg(long, env = "NOTES_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args)]
pub struct RefreshArgs {
    /// Refresh token to rotate
    #[arg(env = "NOTES_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: String,
}

#[derive(Args)]
pub struct LogoutArgs {
    /// Refresh token to revoke
    #[arg(env = "NOTES_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: String,
}

#[derive(Args)]
pub struct MeArgs {}

#[derive(Serialize)]
struct CredentialsRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl HumanReadable for OkResponse {
    fn print_human(&self) {
        println!("{}", "Account created.".green().bold());
    }
}

/// Token pair from login or refresh. `roles` is only sent by login.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub token_type: String,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

impl HumanReadable for TokenResponse {
    fn print_human(&self) {
        println!("{}", "Tokens issued".green().bold());
        println!();
        println!("  {} {}", "Type:".cyan(), self.token_type);
        println!("  {} {}", "Access:".cyan(), truncate(&self.access_token, 40));
        println!("  {} {}", "Refresh:".cyan(), truncate(&self.refresh_token, 40));
        if let Some(roles) = &self.roles {
            println!("  {} {}", "Roles:".cyan(), roles.join(", "));
        }
        println!();
        println!("  {}", "Run without --human to print the full tokens.".dimmed());
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MeResponse {
    pub sub: i64,
    pub roles: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

impl HumanReadable for MeResponse {
    fn print_human(&self) {
        let stamp = |secs: i64| {
            DateTime::from_timestamp(secs, 0)
                .map(|ts| format_timestamp(&ts))
                .unwrap_or_else(|| secs.to_string())
        };
        println!("{}", "Current identity".green().bold());
        println!();
        println!("  {} {}", "User ID:".cyan(), self.sub);
        println!("  {} {}", "Roles:".cyan(), self.roles.join(", "));
        println!("  {} {}", "Issued:".cyan(), stamp(self.iat));
        println!("  {} {}", "Expires:".cyan(), stamp(self.exp));
    }
}

/// POST /auth/register
pub async fn register(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: CredentialsArgs,
) -> Result<()> {
    let url = format!("{}/auth/register", base_url);
    let body = CredentialsRequest {
        username: &args.username,
        password: &args.password,
    };

    let response: OkResponse = make_request(client.post(&url).json(&body)).await?;
    output(&response, human)
}

/// POST /auth/login
pub async fn login(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: CredentialsArgs,
) -> Result<()> {
    let url = format!("{}/auth/login", base_url);
    let body = CredentialsRequest {
        username: &args.username,
        password: &args.password,
    };

    let response: TokenResponse = make_request(client.post(&url).json(&body)).await?;
    output(&response, human)
}

/// POST /auth/refresh
pub async fn refresh(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: RefreshArgs,
) -> Result<()> {
    let url = format!("{}/auth/refresh", base_url);
    let body = RefreshRequest {
        refresh_token: &args.refresh_token,
    };

    let response: TokenResponse = make_request(client.post(&url).json(&body)).await?;
    output(&response, human)
}

/// POST /auth/logout
pub async fn logout(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: LogoutArgs,
) -> Result<()> {
    let url = format!("{}/auth/logout", base_url);
    let body = RefreshRequest {
        refresh_token: &args.refresh_token,
    };

    make_empty_request(client.post(&url).json(&body)).await?;
    if human {
        println!("{}", "Logged out.".green().bold());
    } else {
        println!("{}", serde_json::json!({ "ok": true }));
    }
    Ok(())
}

/// GET /auth/me
pub async fn me(client: &reqwest::Client, base_url: &str, human: bool, _args: MeArgs) -> Result<()> {
    let url = format!("{}/auth/me", base_url);
    let response: MeResponse = make_request(client.get(&url)).await?;
    output(&response, human)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_accepts_refresh_shape() {
        let json = r#"{"token_type":"Bearer","access_token":"a","refresh_token":"r"}"#;
        let parsed: TokenResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.roles.is_none());

        let rendered = serde_json::to_value(&parsed).unwrap();
        assert!(rendered.get("roles").is_none());
    }

    #[test]
    fn test_token_response_keeps_login_roles() {
        let json = r#"{"token_type":"Bearer","access_token":"a","refresh_token":"r","roles":["admin"]}"#;
        let parsed: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.roles, Some(vec!["admin".to_string()]));
    }
}
