//! `check_vendor_reputation` tool over `vyapaar_reputation::UrlThreatChecker`.

use serde::{Deserialize, Serialize};

use crate::context::ServerContext;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct ReputationRequest
{
  pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ReputationResponse
{
  pub safe: bool,
  pub threats: Vec<String>,
  pub match_count: usize,
}

const ERROR_THREAT_TYPES: [&str; 3] = ["TIMEOUT", "API_ERROR", "INTERNAL_ERROR"];

pub async fn handle(ctx: &ServerContext, req: ReputationRequest) -> ApiResult<ReputationResponse>
{
  if req.url.trim().is_empty()
  {
    return Err(ApiError::BadRequest("url must not be empty".to_string()));
  }

  let check = ctx.url_threat.check(&req.url).await;
  let had_error = check.threat_types.iter().any(|t| ERROR_THREAT_TYPES.contains(&t.as_str()));
  ctx.metrics.record_reputation_check(check.is_safe, had_error);

  Ok(ReputationResponse { match_count: check.threat_types.len(), safe: check.is_safe, threats: check.threat_types })
}
