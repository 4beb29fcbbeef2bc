//! OAuth flow and setup-form entries for Deezer.

use reqwest::{Client, StatusCode};
use tracing::{debug, info};
use url::Url;

use crate::error::{ProviderError, Result};
use crate::provider::config::log_level_entry;
use crate::provider::{ConfigEntry, ConfigEntryType, ConfigValue, ConfigValues, Host};

pub const CONF_ACCESS_TOKEN: &str = "access_token";
pub const CONF_ACTION_AUTH: &str = "auth";
const CONF_SESSION_ID: &str = "session_id";

const DEEZER_AUTH_URL: &str = "https://connect.deezer.com/oauth/auth.php";
const DEEZER_TOKEN_URL: &str = "https://connect.deezer.com/oauth/access_token.php";
const RELAY_URL: &str = "https://deezer.oauth.jonathanbangert.com/";
const DEEZER_PERMS: &str = "basic_access,email,offline_access,manage_library,manage_community,delete_library,listening_history";

pub const ENV_APP_ID: &str = "DEEZER_APP_ID";
pub const ENV_APP_SECRET: &str = "DEEZER_APP_SECRET";

/// Deezer OAuth application credentials.
#[derive(Debug, Clone)]
pub struct DeezerOAuth {
    pub app_id: String,
    pub app_secret: String,
    token_url: String,
}

impl DeezerOAuth {
    pub fn new<S1: Into<String>, S2: Into<String>>(app_id: S1, app_secret: S2) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            token_url: DEEZER_TOKEN_URL.to_string(),
        }
    }

    /// Read the app credentials from `DEEZER_APP_ID` / `DEEZER_APP_SECRET`.
    pub fn from_env() -> Result<Self> {
        let read = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ProviderError::LoginFailed(format!("{} is not set", key)))
        };
        Ok(Self::new(read(ENV_APP_ID)?, read(ENV_APP_SECRET)?))
    }

    /// Point the token exchange at another host (used by tests).
    pub fn with_token_url<S: Into<String>>(mut self, token_url: S) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// Authorization page the user is sent to.
    pub fn authorize_url(&self, callback_url: &str) -> Result<String> {
        let url = Url::parse_with_params(
            DEEZER_AUTH_URL,
            &[
                ("app_id", self.app_id.as_str()),
                ("redirect_uri", RELAY_URL),
                ("perms", DEEZER_PERMS),
                ("state", callback_url),
            ],
        )
        .map_err(|e| ProviderError::InvalidData(format!("invalid authorization url: {}", e)))?;
        Ok(url.into())
    }

    /// Exchange an authorization code for an access token.
    pub async fn exchange_code(&self, client: &Client, code: &str) -> Result<String> {
        let response = client
            .post(&self.token_url)
            .query(&[
                ("code", code),
                ("app_id", self.app_id.as_str()),
                ("secret", self.app_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ProviderError::LoginFailed(format!("HTTP Error {}", status)));
        }
        parse_access_token(&response.text().await?)
    }
}

/// Extract the token from an `access_token=XYZ&expires=0` body.
pub fn parse_access_token(body: &str) -> Result<String> {
    body.split('=')
        .nth(1)
        .and_then(|rest| rest.split('&').next())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .ok_or_else(|| ProviderError::LoginFailed("Invalid auth code".to_string()))
}

/// Setup-form entries of the Deezer provider.
///
/// With `action == "auth"` this runs the OAuth flow through the host's
/// authentication session and stores the new token in `values`.
pub async fn get_config_entries(
    host: &dyn Host,
    oauth: &DeezerOAuth,
    instance_id: Option<&str>,
    action: Option<&str>,
    values: &mut ConfigValues,
) -> Result<Vec<ConfigEntry>> {
    debug!("Config entries requested for {:?}", instance_id);

    if action == Some(CONF_ACTION_AUTH) {
        let session_id = values
            .get(CONF_SESSION_ID)
            .and_then(ConfigValue::as_str)
            .ok_or_else(|| ProviderError::InvalidData("missing session_id".to_string()))?
            .to_string();

        let helper = host.auth_session(&session_id).await?;
        let auth_url = oauth.authorize_url(helper.callback_url())?;
        let callback = helper.authenticate(&auth_url).await?;
        let code = callback
            .get("code")
            .ok_or_else(|| ProviderError::LoginFailed("authorization returned no code".into()))?;

        let token = oauth.exchange_code(host.http_client(), code).await?;
        info!("Obtained a new Deezer access token");
        values.insert(CONF_ACCESS_TOKEN.to_string(), ConfigValue::String(token));
    }

    let access_token = ConfigEntry::new(
        CONF_ACCESS_TOKEN,
        ConfigEntryType::SecureString,
        "Access token",
    )
    .required()
    .with_description("You need to authenticate on Deezer.")
    .with_action(CONF_ACTION_AUTH, "Authenticate with Deezer")
    .with_value(values.get(CONF_ACCESS_TOKEN).cloned());

    Ok(vec![access_token, log_level_entry()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{AuthenticationHelper, StandaloneHost};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FakeBrowser {
        seen_url: Mutex<Option<String>>,
    }

    #[async_trait]
    impl AuthenticationHelper for FakeBrowser {
        fn callback_url(&self) -> &str {
            "http://host/callback/abc"
        }

        async fn authenticate(&self, auth_url: &str) -> Result<HashMap<String, String>> {
            *self.seen_url.lock().unwrap() = Some(auth_url.to_string());
            Ok(HashMap::from([("code".to_string(), "the-code".to_string())]))
        }
    }

    #[test]
    fn test_parse_access_token() {
        assert_eq!(parse_access_token("access_token=XYZ&expires=0").unwrap(), "XYZ");
        assert_eq!(parse_access_token("access_token=XYZ").unwrap(), "XYZ");
        assert!(matches!(
            parse_access_token("wrong code"),
            Err(ProviderError::LoginFailed(_))
        ));
    }

    #[test]
    fn test_authorize_url() {
        let url = DeezerOAuth::new("123", "secret")
            .authorize_url("http://host/callback/abc")
            .unwrap();
        let parsed = Url::parse(&url).unwrap();
        let query: HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(query["app_id"], "123");
        assert_eq!(query["redirect_uri"], RELAY_URL);
        assert_eq!(query["state"], "http://host/callback/abc");
        assert!(query["perms"].contains("manage_library"));
    }

    #[tokio::test]
    async fn test_entries_without_action() {
        let host = StandaloneHost::with_client(Client::new());
        let mut values = ConfigValues::new();
        values.insert(CONF_ACCESS_TOKEN.into(), ConfigValue::from("existing"));

        let entries = get_config_entries(
            &host,
            &DeezerOAuth::new("1", "s"),
            None,
            None,
            &mut values,
        )
        .await
        .unwrap();

        assert_eq!(entries[0].key, CONF_ACCESS_TOKEN);
        assert_eq!(entries[0].type_, ConfigEntryType::SecureString);
        assert_eq!(entries[0].action.as_deref(), Some(CONF_ACTION_AUTH));
        assert_eq!(entries[0].value, Some(ConfigValue::from("existing")));
    }

    #[tokio::test]
    async fn test_auth_action_requires_session_id() {
        let host = StandaloneHost::with_client(Client::new());
        let mut values = ConfigValues::new();
        let result = get_config_entries(
            &host,
            &DeezerOAuth::new("1", "s"),
            None,
            Some(CONF_ACTION_AUTH),
            &mut values,
        )
        .await;
        assert!(matches!(result, Err(ProviderError::InvalidData(_))));
    }

    #[tokio::test]
    async fn test_auth_action_exchanges_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/access_token.php"))
            .and(query_param("code", "the-code"))
            .and(query_param("app_id", "1"))
            .and(query_param("secret", "s"))
            .respond_with(ResponseTemplate::new(200).set_body_string("access_token=NEW&expires=0"))
            .expect(1)
            .mount(&server)
            .await;

        let browser = Arc::new(FakeBrowser {
            seen_url: Mutex::new(None),
        });
        let host = StandaloneHost::with_client(Client::new()).with_auth_helper(browser.clone());
        let oauth = DeezerOAuth::new("1", "s")
            .with_token_url(format!("{}/oauth/access_token.php", server.uri()));
        let mut values = ConfigValues::new();
        values.insert(CONF_SESSION_ID.into(), ConfigValue::from("session-1"));

        let entries = get_config_entries(&host, &oauth, None, Some(CONF_ACTION_AUTH), &mut values)
            .await
            .unwrap();

        assert_eq!(values[CONF_ACCESS_TOKEN], ConfigValue::from("NEW"));
        assert_eq!(entries[0].value, Some(ConfigValue::from("NEW")));
        let seen = browser.seen_url.lock().unwrap().clone().unwrap();
        assert!(seen.starts_with(DEEZER_AUTH_URL));
    }

    #[tokio::test]
    async fn test_exchange_rejects_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let oauth = DeezerOAuth::new("1", "s").with_token_url(server.uri());
        let result = oauth.exchange_code(&Client::new(), "code").await;
        assert!(matches!(result, Err(ProviderError::LoginFailed(_))));
    }
}
