//! Address resource handlers
//!
//! Every handler runs behind `auth_middleware` and scopes all work to the
//! authenticated account.
//!
//! Author: hephaex@gmail.com

use crate::auth::AuthenticatedAccount;
use crate::error::AppError;
use crate::state::AppState;
use address_core::{Address, AddressBookError, AddressId, AddressInput, Page, PageRequest};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        OriginalUri, Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Address as returned to clients; the owner is never exposed
#[derive(Debug, Serialize, Deserialize)]
pub struct AddressResponse {
    pub id: AddressId,
    pub country: String,
    pub address_line_one: String,
    pub address_line_two: Option<String>,
    pub city: String,
    pub zip_code: String,
}

impl From<Address> for AddressResponse {
    fn from(address: Address) -> Self {
        Self {
            id: address.id,
            country: address.fields.country,
            address_line_one: address.fields.address_line_one,
            address_line_two: address.fields.address_line_two,
            city: address.fields.city,
            zip_code: address.fields.zip_code,
        }
    }
}

/// Paginated address listing
#[derive(Debug, Serialize, Deserialize)]
pub struct AddressListResponse {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<AddressResponse>,
}

/// Query parameters for address listing
///
/// Kept as strings: a malformed `page` is an invalid page (404) and a
/// malformed `page_size` falls back to the default.
#[derive(Debug, Default, Deserialize)]
pub struct ListAddressesQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// Bulk delete request
#[derive(Debug, Deserialize)]
pub struct DeleteAddressesRequest {
    pub address_ids: Vec<String>,
}

/// Create an address
///
/// # Responses
///
/// * `200 OK` - Address created, body is the new address with its id
/// * `400 Bad Request` - Validation failure or duplicate line one / zip code
pub async fn create_address(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedAccount>,
    payload: Result<Json<AddressInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload?;
    let address = state.addresses.create(auth.id(), &input).await?;

    Ok(Json(AddressResponse::from(address)))
}

/// List the caller's addresses
///
/// # Responses
///
/// * `200 OK` - `{count, next, previous, results}`
/// * `400 Bad Request` - Query string cannot be decoded
/// * `404 Not Found` - Page out of range
pub async fn list_addresses(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedAccount>,
    OriginalUri(uri): OriginalUri,
    query: Result<Query<ListAddressesQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let page = match query.page.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<u64>()
                .map_err(|_| AppError::from(AddressBookError::InvalidPage))?,
        ),
    };
    let page_size = query
        .page_size
        .as_deref()
        .and_then(|raw| raw.trim().parse::<u64>().ok());

    let window = state
        .addresses
        .list(auth.id(), PageRequest { page, page_size })
        .await?;

    let links = PageLinks {
        path: uri.path(),
        page_size,
    };
    Ok(Json(AddressListResponse {
        count: window.count,
        next: window.next_page().map(|p| links.link(p)),
        previous: window.previous_page().map(|p| links.link(p)),
        results: into_responses(window),
    }))
}

fn into_responses(window: Page<Address>) -> Vec<AddressResponse> {
    window.results.into_iter().map(AddressResponse::from).collect()
}

/// Builds relative page links for the listing
struct PageLinks<'a> {
    path: &'a str,
    /// Echoed back only when the client asked for it
    page_size: Option<u64>,
}

impl PageLinks<'_> {
    /// Link to `page`; the link to the first page carries no `page` parameter
    fn link(&self, page: u64) -> String {
        let mut params = Vec::new();
        if page > 1 {
            params.push(format!("page={page}"));
        }
        if let Some(size) = self.page_size {
            params.push(format!("page_size={size}"));
        }

        if params.is_empty() {
            self.path.to_string()
        } else {
            format!("{}?{}", self.path, params.join("&"))
        }
    }
}

/// Get one of the caller's addresses
///
/// # Responses
///
/// * `200 OK` - Address body
/// * `404 Not Found` - `{"message": "Address not found"}`
pub async fn get_address(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    // A malformed id cannot name an address
    let id: AddressId = id
        .parse()
        .map_err(|_| AppError::from(AddressBookError::NotFound))?;
    let address = state.addresses.get(auth.id(), id).await?;

    Ok(Json(AddressResponse::from(address)))
}

/// Replace every field of one of the caller's addresses
///
/// # Responses
///
/// * `200 OK` - Updated address body
/// * `400 Bad Request` - Validation failure or duplicate line one / zip code
/// * `404 Not Found` - `{"message": "address not found"}`
pub async fn update_address(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Path(id): Path<String>,
    payload: Result<Json<AddressInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let update_not_found = || AppError::NotFound("address not found".to_string());

    let id: AddressId = id.parse().map_err(|_| update_not_found())?;
    let Json(input) = payload?;

    let address = state
        .addresses
        .update(auth.id(), id, &input)
        .await
        .map_err(|e| match e {
            AddressBookError::NotFound => update_not_found(),
            other => AppError::from(other),
        })?;

    Ok(Json(AddressResponse::from(address)))
}

/// Delete a set of the caller's addresses
///
/// Ids that are unknown or belong to someone else are ignored.
///
/// # Responses
///
/// * `204 No Content` - Done, whether or not anything matched
/// * `400 Bad Request` - Missing `address_ids` or a malformed id
pub async fn delete_addresses(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedAccount>,
    payload: Result<Json<DeleteAddressesRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;

    let ids = request
        .address_ids
        .iter()
        .map(|raw| {
            raw.trim()
                .parse::<AddressId>()
                .map_err(|_| AppError::BadRequest(format!("Invalid address id: {raw}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    state.addresses.delete(auth.id(), &ids).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_links() {
        let links = PageLinks {
            path: "/addresses/",
            page_size: None,
        };
        assert_eq!(links.link(1), "/addresses/");
        assert_eq!(links.link(2), "/addresses/?page=2");

        let sized = PageLinks {
            path: "/addresses/",
            page_size: Some(5),
        };
        assert_eq!(sized.link(1), "/addresses/?page_size=5");
        assert_eq!(sized.link(3), "/addresses/?page=3&page_size=5");
    }

    #[test]
    fn test_response_omits_owner() {
        let validated = address_core::validate(&AddressInput::new(
            "US",
            "1 Testerson Street",
            "Bean City",
            "TE1 1ST",
        ))
        .unwrap();
        let address = Address::new(address_core::AccountId::new(), validated);
        let id = address.id;

        let body = serde_json::to_value(AddressResponse::from(address)).unwrap();
        assert_eq!(body["id"], id.to_string());
        assert_eq!(body["country"], "US");
        assert!(body["address_line_two"].is_null());
        assert!(body.get("owner").is_none());
    }
}
