//! `verify_vendor_entity` tool over `vyapaar_reputation::LegalEntityVerifier`.
//! Fail-open: even a lookup error returns a normal (`verified: false`)
//! response rather than an `ApiError` — the caller must not mistake an
//! entity-registry outage for a rejection.

use serde::{Deserialize, Serialize};
use vyapaar_reputation::LegalEntity;

use crate::context::ServerContext;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize, Default)]
pub struct EntityRequest
{
  pub vendor_name: Option<String>,
  pub lei: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EntityResponse
{
  pub verified: bool,
  pub best_match: Option<LegalEntity>,
  pub entities: Vec<LegalEntity>,
  pub error: Option<String>,
}

pub async fn handle(ctx: &ServerContext, req: EntityRequest) -> ApiResult<EntityResponse>
{
  let lookup = match (req.lei.filter(|s| !s.trim().is_empty()), req.vendor_name.filter(|s| !s.trim().is_empty()))
  {
    (Some(lei), _) => ctx.legal_entity.lookup_lei(&lei).await,
    (None, Some(name)) => ctx.legal_entity.search_by_name(&name).await,
    (None, None) => return Err(ApiError::BadRequest("one of vendor_name or lei must be provided".to_string())),
  };

  ctx.metrics.record_gleif_check(lookup.verified, lookup.error.is_some());

  Ok(EntityResponse { verified: lookup.verified, best_match: lookup.best_match, entities: lookup.entities, error: lookup.error })
}
