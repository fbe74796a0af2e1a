//! `POST /auth` suite

use futures::future::BoxFuture;
use serde_json::{json, Value};

use bookcheck_api::booking::BAD_CREDENTIALS;
use bookcheck_api::ApiClient;
use bookcheck_common::{ApiConfig, Credentials};

use crate::ensure;
use crate::error::E2eResult;
use crate::expect::{expect_eq, expect_status};
use crate::suites::{Case, Suite};

pub struct AuthContext {
    pub client: ApiClient,
    pub admin: Credentials,
}

pub fn suite() -> Suite<AuthContext> {
    Suite {
        name: "Auth API - /auth",
        before_all: setup,
        before_each: None,
        after_each: None,
        cases: vec![
            Case::new("authenticates with valid credentials", valid_credentials),
            Case::new("rejects invalid credentials", invalid_credentials),
            Case::new("rejects empty credentials", empty_credentials),
        ],
    }
}

fn setup(config: &ApiConfig) -> BoxFuture<'_, E2eResult<AuthContext>> {
    Box::pin(async move {
        Ok(AuthContext {
            client: ApiClient::new(config)?,
            admin: config.admin.clone(),
        })
    })
}

fn valid_credentials(ctx: &mut AuthContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let response = ctx.client.authenticate(&ctx.admin).await?;
        expect_status(&response, 200)?;

        let body = response.json_value()?;
        ensure!(
            body.get("token").map_or(false, Value::is_string),
            "expected a string token, got {}",
            body
        );
        Ok(())
    })
}

fn invalid_credentials(ctx: &mut AuthContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let credentials = Credentials::new(ctx.admin.username.clone(), "wrongpassword");
        expect_rejected(&ctx.client, &credentials).await
    })
}

fn empty_credentials(ctx: &mut AuthContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move { expect_rejected(&ctx.client, &Credentials::new("", "")).await })
}

async fn expect_rejected(client: &ApiClient, credentials: &Credentials) -> E2eResult<()> {
    let response = client.authenticate(credentials).await?;
    expect_status(&response, 200)?;

    let body = response.json_value()?;
    ensure!(body.get("token").is_none(), "rejected login returned a token");
    expect_eq("auth body", body, json!({ "reason": BAD_CREDENTIALS }))
}
