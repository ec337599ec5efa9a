use shared::{
    domain::{CollectionName, OrderedSnapshot},
    error::{ApiError, ErrorCode},
    protocol::{ConflictDetails, ReorderRequest, ReorderResponse},
};
use storage::{ReassignError, Storage};
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn health(ctx: &ApiContext) -> Result<(), ApiError> {
    ctx.storage.health_check().await.map_err(internal)
}

pub async fn list_ordered(
    ctx: &ApiContext,
    collection: &str,
) -> Result<OrderedSnapshot, ApiError> {
    let collection = parse_collection(collection)?;
    ctx.storage
        .list_ordered(&collection)
        .await
        .map_err(internal)
}

pub async fn reorder(
    ctx: &ApiContext,
    collection: &str,
    request: ReorderRequest,
) -> Result<ReorderResponse, ApiError> {
    let collection = parse_collection(collection)?;
    let count = request.ordered_ids.len();

    match ctx
        .storage
        .reassign_ranks(&collection, &request.ordered_ids, request.expected_version)
        .await
    {
        Ok(version) => {
            info!(%collection, count, version, "collection reordered");
            Ok(ReorderResponse {
                success: true,
                version,
                message: format!("Successfully updated order for {count} items"),
            })
        }
        Err(ReassignError::InvalidPermutation(mismatch)) => {
            warn!(%collection, %mismatch, "rejected reorder: invalid permutation");
            Err(ApiError::new(ErrorCode::Validation, "invalid permutation").with_details(mismatch))
        }
        Err(ReassignError::VersionConflict { expected, current }) => {
            warn!(%collection, expected, current, "rejected reorder: stale version");
            Err(ApiError::new(
                ErrorCode::Conflict,
                "collection changed since it was read",
            )
            .with_details(ConflictDetails {
                expected_version: expected,
                current_version: current,
            }))
        }
        Err(ReassignError::Backend(err)) => {
            error!(%collection, %err, "reorder failed in storage");
            Err(ApiError::new(ErrorCode::Internal, "failed to persist order")
                .with_details(err.to_string()))
        }
    }
}

fn parse_collection(raw: &str) -> Result<CollectionName, ApiError> {
    CollectionName::parse(raw).map_err(|err| ApiError::new(ErrorCode::Validation, err.to_string()))
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, "storage unavailable").with_details(format!("{err:#}"))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
