//! DNS lookup tool
//!
//! Shells out to `dig <query> <type> +short` and returns its trimmed output.

use crate::tools::{AiTool, ToolParameter, arg_as_text};
use anyhow::{Error, anyhow};
use async_trait::async_trait;
use serde_json::{Map, Value};
use smith_common::timeouts::DEFAULT_TOOL_TIMEOUT;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const RECORD_TYPES: &[&str] = &[
    "A", "AAAA", "ANY", "CAA", "CNAME", "DNSKEY", "DS", "MX", "NS", "PTR", "SOA", "SRV", "TXT",
];

/// Resolve DNS records with `dig`
pub struct QueryDnsTool {
    program: String,
    timeout: Duration,
}

impl QueryDnsTool {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl Default for QueryDnsTool {
    fn default() -> Self {
        Self::new("dig", Duration::from_secs(DEFAULT_TOOL_TIMEOUT))
    }
}

#[async_trait]
impl AiTool for QueryDnsTool {
    fn name(&self) -> &str {
        "query_dns"
    }

    fn description(&self) -> &str {
        "Query a DNS server for a specific record type"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::new("query", "Domain name or address to resolve"),
            ToolParameter::new("query_type", "DNS record type, e.g. A, MX or TXT"),
        ]
    }

    async fn execute(&self, params: &Map<String, Value>) -> Result<String, Error> {
        self.validate_params(params)?;

        let query = arg_as_text(params, "query").unwrap_or_default();
        let query_type = arg_as_text(params, "query_type")
            .unwrap_or_default()
            .to_ascii_uppercase();

        // Anything starting with '-' would be read by dig as an option
        if query.is_empty() || query.starts_with('-') || query.chars().any(char::is_whitespace)
        {
            return Err(anyhow!("Invalid query: {:?}", query));
        }
        if !RECORD_TYPES.contains(&query_type.as_str()) {
            return Err(anyhow!("Unsupported record type: {}", query_type));
        }

        debug!("Running {} {} {} +short", self.program, query, query_type);
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.program)
                .arg(&query)
                .arg(&query_type)
                .arg("+short")
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| anyhow!("{} timed out after {:?}", self.program, self.timeout))?
        .map_err(|e| anyhow!("failed to run {}: {}", self.program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
