//! operation command - POST to the sibling service

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::operation::OperationClient;

/// POST to `path`, with `data` parsed as the JSON body when given.
pub fn operation(_ctx: &Context, path: &str, data: Option<&str>, scheme: &str) -> Result<()> {
    let body: Option<serde_json::Value> = data
        .map(serde_json::from_str)
        .transpose()
        .context("--data is not valid JSON")?;

    let client = OperationClient::from_process_env().with_scheme(scheme);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let response = match &body {
            Some(body) => client.post_json(path, body).await?,
            None => client.post(path).await?,
        };
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        println!("{}", status);
        if !text.is_empty() {
            println!("{}", text);
        }
        Ok::<_, anyhow::Error>(())
    })
}
