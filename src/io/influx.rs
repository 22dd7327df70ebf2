//! InfluxDB 1.x HTTP client
//!
//! Points are sent as line protocol with second precision:
//! ```text
//! measurement,tag1=val1,tag2=val2 value=10.5 1619827200
//! ```
//!
//! See: <https://docs.influxdata.com/influxdb/v1/write_protocols/line_protocol_reference/>

use crate::domain::point::TimeSeriesPoint;
use crate::infra::config::InfluxConfig;
use crate::io::store::{PointStore, StoreError};
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

/// Backslash-escape `special`, plus backslashes themselves. Line breaks become
/// escaped spaces since a line cannot carry them.
fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' | '\r' => out.push_str("\\ "),
            c if special.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Escape measurement name. Spaces and commas must be escaped with backslash.
fn escape_measurement(s: &str) -> String {
    escape(s, &[',', ' '])
}

/// Escape tag key or value. Commas, equals signs, and spaces must be escaped.
fn escape_tag(s: &str) -> String {
    escape(s, &[',', '=', ' '])
}

/// Render one point as a line protocol line
///
/// Tags come out sorted by key. Tags with an empty value are omitted since the
/// protocol cannot express them.
pub fn to_line_protocol(point: &TimeSeriesPoint) -> String {
    let mut line = escape_measurement(&point.measurement);

    for (key, value) in &point.tags {
        if value.is_empty() {
            continue;
        }
        line.push(',');
        line.push_str(&escape_tag(key));
        line.push('=');
        line.push_str(&escape_tag(value));
    }

    line.push_str(" value=");
    line.push_str(&point.fields.value.to_string());
    line.push(' ');
    line.push_str(&point.time.to_string());
    line
}

/// Line protocol body for a batch, one line per point
pub fn batch_body(points: &[TimeSeriesPoint]) -> String {
    points.iter().map(to_line_protocol).collect::<Vec<_>>().join("\n")
}

fn request_error(e: reqwest::Error) -> StoreError {
    if e.is_connect() || e.is_timeout() {
        StoreError::Connection(e.to_string())
    } else {
        StoreError::Request(e.to_string())
    }
}

/// Long-lived client for one InfluxDB database
pub struct InfluxStore {
    client: reqwest::Client,
    write_url: Url,
    ping_url: Url,
    username: Option<String>,
    password: Option<String>,
}

impl InfluxStore {
    pub fn new(config: &InfluxConfig) -> Result<Self, StoreError> {
        Self::with_base_url(
            &config.base_url(),
            &config.database,
            config.user.clone(),
            config.password.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn with_base_url(
        base_url: &str,
        database: &str,
        username: Option<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let base = base_url.trim_end_matches('/');
        let write_url = Url::parse_with_params(
            &format!("{}/write", base),
            &[("db", database), ("precision", "s")],
        )
        .map_err(|e| StoreError::Connection(format!("invalid store URL '{}': {}", base, e)))?;
        let ping_url = Url::parse(&format!("{}/ping", base))
            .map_err(|e| StoreError::Connection(format!("invalid store URL '{}': {}", base, e)))?;

        // Create HTTP client once for reuse (connection pooling)
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            write_url,
            ping_url,
            username: username.filter(|u| !u.is_empty()),
            password,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_deref()),
            None => request,
        }
    }

    /// Check the store is reachable
    pub async fn ping(&self) -> Result<(), StoreError> {
        let response = self
            .authorize(self.client.get(self.ping_url.clone()))
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Connection(format!("ping returned HTTP {}", status.as_u16())));
        }
        debug!(url = %self.ping_url, "influx_ping_ok");
        Ok(())
    }
}

#[async_trait]
impl PointStore for InfluxStore {
    async fn write_points(&self, points: &[TimeSeriesPoint]) -> Result<(), StoreError> {
        if points.is_empty() {
            return Ok(());
        }

        let body = batch_body(points);
        let bytes = body.len();
        let response = self
            .authorize(self.client.post(self.write_url.clone()))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Http { status: status.as_u16(), body });
        }

        debug!(points = %points.len(), bytes = %bytes, "influx_write_ok");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::point::PointFields;
    use std::collections::BTreeMap;

    fn point(tags: &[(&'static str, &str)], value: f64) -> TimeSeriesPoint {
        TimeSeriesPoint {
            time: 1_619_827_200,
            measurement: "generation".to_string(),
            fields: PointFields { value },
            tags: tags.iter().map(|(k, v)| (*k, v.to_string())).collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_line_sorted_tags() {
        let p = point(&[("type", "Solar"), ("map_code", "AT"), ("area_code", "10YAT")], 10.5);
        assert_eq!(
            to_line_protocol(&p),
            "generation,area_code=10YAT,map_code=AT,type=Solar value=10.5 1619827200"
        );
    }

    #[test]
    fn test_line_escapes_spaces_and_commas() {
        let p = point(&[("type", "Fossil Brown coal-Lignite"), ("map_code_desc", "A,B=C")], 1.0);
        assert_eq!(
            to_line_protocol(&p),
            "generation,map_code_desc=A\\,B\\=C,type=Fossil\\ Brown\\ coal-Lignite value=1 1619827200"
        );
    }

    #[test]
    fn test_line_escapes_backslash_and_line_breaks() {
        let p = point(&[("map_code_desc", "APG\\"), ("type", "a\nb")], 1.0);
        assert_eq!(
            to_line_protocol(&p),
            "generation,map_code_desc=APG\\\\,type=a\\ b value=1 1619827200"
        );
    }

    #[test]
    fn test_line_skips_empty_tag_values() {
        let p = point(&[("map_code", ""), ("type", "Wind Onshore")], -3.25);
        assert_eq!(to_line_protocol(&p), "generation,type=Wind\\ Onshore value=-3.25 1619827200");
    }

    #[test]
    fn test_measurement_escaping() {
        let mut p = point(&[], 2.0);
        p.measurement = "cross border,flow".to_string();
        assert_eq!(to_line_protocol(&p), "cross\\ border\\,flow value=2 1619827200");
    }

    #[test]
    fn test_batch_body_joins_lines_in_order() {
        let mut second = point(&[], 2.0);
        second.time += 900;
        let body = batch_body(&[point(&[], 1.0), second]);
        assert_eq!(body, "generation value=1 1619827200\ngeneration value=2 1619828100");
    }

    #[test]
    fn test_write_url_carries_database_and_precision() {
        let store =
            InfluxStore::with_base_url("http://localhost:8086/", "entsoe", None, None, Duration::from_secs(1))
                .unwrap();
        assert_eq!(store.write_url.as_str(), "http://localhost:8086/write?db=entsoe&precision=s");
        assert_eq!(store.ping_url.as_str(), "http://localhost:8086/ping");
    }

    #[tokio::test]
    async fn test_empty_write_does_not_contact_store() {
        // Nothing listens on port 9; an actual request would fail
        let store =
            InfluxStore::with_base_url("http://127.0.0.1:9", "entsoe", None, None, Duration::from_millis(100))
                .unwrap();
        store.write_points(&[]).await.unwrap();
    }
}
