use reqwest::Response;
use serde::de::DeserializeOwned;
use shared::protocol::ErrorBody;
use tracing::debug;
use url::Url;

use crate::error::ClientError;

pub const CAMPUS_LIST: &str = "/campusList";
pub const PROGRAM_LIST: &str = "/programList";
pub const COHORT_LIST: &str = "/cohortList";
pub const STUDENT_LIST: &str = "/studentList";
pub const UPDATE_STUDENT: &str = "/updateStudent";
pub const CREATE_STUDENT: &str = "/createStudent";
pub const IMAGE_UPLOAD: &str = "/imageUpload";
pub const BULK_STUDENTS_UPLOAD: &str = "/bulkStudentsUpload";

/// Parses a base URL so that endpoint paths join below it, keeping any path
/// prefix (`http://host/admin` and `http://host/admin/` behave the same).
pub fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let mut url = Url::parse(raw.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

pub fn endpoint_url(base: &Url, endpoint: &str) -> Result<Url, ClientError> {
    Ok(base.join(endpoint.trim_start_matches('/'))?)
}

/// Passes 2xx responses through. Anything else becomes
/// [`ClientError::Status`] carrying the body's `message`, or the status
/// reason when there is none.
pub async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    let message = serde_json::from_slice::<ErrorBody>(&body)
        .ok()
        .and_then(|body| body.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    Err(ClientError::Status { status, message })
}

pub async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
}

/// For endpoints whose payload the client does not depend on: an empty or
/// non-JSON body is accepted as `None`.
pub async fn decode_lenient<T: DeserializeOwned>(
    response: Response,
) -> Result<Option<T>, ClientError> {
    let body = response.bytes().await?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    match serde_json::from_slice(&body) {
        Ok(value) => Ok(Some(value)),
        Err(error) => {
            debug!(%error, "ignoring undecodable response body");
            Ok(None)
        }
    }
}
