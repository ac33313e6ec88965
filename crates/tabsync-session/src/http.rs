//! HTTPS profile endpoint fetcher.

use reqwest::{Client, StatusCode, Url};
use tabsync_protocol::{Credential, Profile};

use crate::{FetchError, ProfileFetcher};

/// Fetches the profile with `GET <endpoint>` and `Authorization: Bearer`.
///
/// Status mapping:
/// - 2xx → the JSON body is parsed as a [`Profile`]
/// - 401 / 403 → [`FetchError::InvalidCredential`]
/// - anything else → [`FetchError::Failed`] (retried by the coordinator)
#[derive(Debug, Clone)]
pub struct HttpProfileFetcher {
    client: Client,
    endpoint: Url,
}

impl HttpProfileFetcher {
    pub fn new(endpoint: Url) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    /// Uses a preconfigured client (proxies, TLS roots, default headers).
    pub fn with_client(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl ProfileFetcher for HttpProfileFetcher {
    async fn fetch_profile(&self, credential: &Credential) -> Result<Profile, FetchError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .bearer_auth(credential.as_str())
            .send()
            .await
            .map_err(|e| FetchError::Failed(e.without_url().to_string()))?;

        classify_status(response.status())?;

        response
            .json::<Profile>()
            .await
            .map_err(|e| FetchError::Failed(format!("unreadable profile body: {e}")))
    }
}

/// Maps a response status to the fetch outcome it implies.
pub(crate) fn classify_status(status: StatusCode) -> Result<(), FetchError> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(FetchError::InvalidCredential)
    } else {
        Err(FetchError::Failed(format!("profile endpoint returned {status}")))
    }
}
