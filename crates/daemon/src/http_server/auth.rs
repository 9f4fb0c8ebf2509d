use axum::extract::FromRequestParts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use http::request::Parts;

use common::prelude::{PinServiceError, Principal};

use super::error::ServiceError;
use crate::ServiceState;

/// The authenticated principal behind a request, resolved from
///  `Authorization: Bearer <api key>`
#[derive(Debug, Clone)]
pub struct Caller(pub Principal);

#[axum::async_trait]
impl FromRequestParts<ServiceState> for Caller {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServiceState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ServiceError(PinServiceError::Unauthorized))?;

        match state.database().find_by_api_key(bearer.token()).await {
            Ok(Some(principal)) => Ok(Caller(principal)),
            Ok(None) => Err(ServiceError(PinServiceError::Unauthorized)),
            Err(e) => {
                tracing::error!(error = %e, "failed to look up api key");
                Err(ServiceError(PinServiceError::Internal(
                    "authenticate".to_string(),
                )))
            }
        }
    }
}
