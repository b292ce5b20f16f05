//! PostgREST implementation of the clinotes remote store trait.
//!
//! Talks to a hosted Postgres exposed under `<url>/rest/v1/<table>`, the way
//! hosted backends such as Supabase publish it. Rows come back as JSON arrays;
//! writes ask for the stored row with `Prefer: return=representation`.

use std::time::Duration;

use clinotes_core::{
    ClientId, ClientRecord, Error, NewClient, NewNote, Note, NoteId, NoteUpdate, RemoteStore,
};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for a PostgREST endpoint.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Project URL, e.g. `https://abc.supabase.co`.
    pub url: String,
    /// API key sent as both `apikey` and bearer token.
    pub api_key: String,
    pub timeout: Duration,
}

impl RestConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// HTTP-backed remote store.
pub struct RestRemote {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// Error body PostgREST returns on failure.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    details: Option<String>,
}

impl RestRemote {
    pub fn new(config: RestConfig) -> Result<Self, Error> {
        if config.url.trim().is_empty() || config.api_key.trim().is_empty() {
            return Err(Error::Remote("remote url and api key are required".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Remote(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: config.url,
            api_key: config.api_key,
        })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.http
            .request(method, table_url(&self.base_url, table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Send a request and decode the returned rows.
    async fn rows<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Vec<T>, Error> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Remote(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Remote(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Remote(error_message(status.as_u16(), &body)));
        }
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&body)
            .map_err(|e| Error::Remote(format!("Unexpected response from remote: {}", e)))
    }

    /// Send a write and return the single stored row.
    async fn write_one<T, B>(&self, request: RequestBuilder, body: &B, what: &str) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = request
            .header("Prefer", "return=representation")
            .json(body);
        self.rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Remote(format!("remote returned no row for {}", what)))
    }
}

fn table_url(base_url: &str, table: &str) -> String {
    format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table)
}

/// `select=*&order=created_at.desc`, plus an optional equality filter.
fn list_query(filter: Option<(&str, i64)>) -> Vec<(String, String)> {
    let mut query = vec![
        ("select".to_string(), "*".to_string()),
        ("order".to_string(), "created_at.desc,id.desc".to_string()),
    ];
    if let Some((column, value)) = filter {
        query.push((column.to_string(), format!("eq.{}", value)));
    }
    query
}

fn id_filter(id: i64) -> [(&'static str, String); 1] {
    [("id", format!("eq.{}", id))]
}

/// Human-readable message for a failed response.
fn error_message(status: u16, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        match (parsed.message, parsed.details) {
            (Some(message), Some(details)) if !details.is_empty() => {
                return format!("{} ({})", message, details)
            }
            (Some(message), _) => return message,
            _ => {}
        }
    }
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, body)
    }
}

#[async_trait::async_trait(?Send)]
impl RemoteStore for RestRemote {
    async fn list_clients(&self) -> Result<Vec<ClientRecord>, Error> {
        let request = self.request(Method::GET, "clients").query(&list_query(None));
        self.rows(request).await
    }

    async fn list_notes(&self, client_id: ClientId) -> Result<Vec<Note>, Error> {
        let request = self
            .request(Method::GET, "notes")
            .query(&list_query(Some(("client_id", client_id))));
        self.rows(request).await
    }

    async fn insert_client(&self, client: NewClient) -> Result<ClientRecord, Error> {
        let request = self.request(Method::POST, "clients");
        self.write_one(request, &[client], "inserted client").await
    }

    async fn insert_note(&self, note: NewNote) -> Result<Note, Error> {
        let request = self.request(Method::POST, "notes");
        self.write_one(request, &[note], "inserted note").await
    }

    async fn update_note(&self, id: NoteId, update: NoteUpdate) -> Result<Note, Error> {
        let request = self.request(Method::PATCH, "notes").query(&id_filter(id));
        self.write_one(request, &update, &format!("note {}", id)).await
    }

    async fn delete_note(&self, id: NoteId) -> Result<(), Error> {
        let request = self.request(Method::DELETE, "notes").query(&id_filter(id));
        self.rows::<serde_json::Value>(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url() {
        assert_eq!(
            table_url("https://abc.supabase.co/", "notes"),
            "https://abc.supabase.co/rest/v1/notes"
        );
        assert_eq!(
            table_url("http://localhost:54321", "clients"),
            "http://localhost:54321/rest/v1/clients"
        );
    }

    #[test]
    fn test_list_query() {
        let query = list_query(Some(("client_id", 7)));
        assert_eq!(
            query,
            vec![
                ("select".to_string(), "*".to_string()),
                ("order".to_string(), "created_at.desc,id.desc".to_string()),
                ("client_id".to_string(), "eq.7".to_string()),
            ]
        );
        assert_eq!(list_query(None).len(), 2);
        assert_eq!(id_filter(3), [("id", "eq.3".to_string())]);
    }

    #[test]
    fn test_error_message_from_body() {
        let body = r#"{"code":"23503","message":"insert or update on table \"notes\" violates foreign key constraint","details":"Key (client_id)=(9) is not present.","hint":null}"#;
        assert_eq!(
            error_message(409, body),
            "insert or update on table \"notes\" violates foreign key constraint (Key (client_id)=(9) is not present.)"
        );
        assert_eq!(
            error_message(401, r#"{"message":"Invalid API key"}"#),
            "Invalid API key"
        );
        assert_eq!(error_message(502, "Bad Gateway"), "HTTP 502: Bad Gateway");
        assert_eq!(error_message(503, "  "), "HTTP 503");
    }

    #[test]
    fn test_requires_credentials() {
        assert!(matches!(
            RestRemote::new(RestConfig::new("", "key")),
            Err(Error::Remote(_))
        ));
        assert!(matches!(
            RestRemote::new(RestConfig::new("https://abc.supabase.co", " ")),
            Err(Error::Remote(_))
        ));
        assert!(RestRemote::new(RestConfig::new("https://abc.supabase.co", "key")).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_remote_error() {
        let mut config = RestConfig::new("http://127.0.0.1:9", "key");
        config.timeout = Duration::from_secs(2);
        let remote = RestRemote::new(config).unwrap();
        assert!(matches!(remote.list_clients().await, Err(Error::Remote(_))));
    }

    #[test]
    fn test_rows_decode_nullable_last_modified() {
        let body = r#"[{"id":4,"client_id":1,"content":"hi","created_at":"2024-05-01T10:00:00.123456+00:00","last_modified":null}]"#;
        let notes: Vec<Note> = serde_json::from_str(body).unwrap();
        assert_eq!(notes[0].last_modified, None);
        assert_eq!(notes[0].id, 4);
    }
}
