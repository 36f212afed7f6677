use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::backend::{FdsnClient, WaveformQuery};
use crate::domain::to_datetime;
use crate::error::ArchiveError;
use crate::response::{Inventory, InventoryClient, InventoryQuery};
use crate::waveform::{Stream, WaveformCodec};

pub const IRIS_BASE_URL: &str = "https://service.iris.edu";

const DATASELECT_PATH: &str = "/fdsnws/dataselect/1/query";
const STATION_PATH: &str = "/fdsnws/station/1/query";

#[derive(Clone)]
pub struct FdsnHttpClient {
    client: Client,
    base_url: String,
    codec: Option<Arc<dyn WaveformCodec>>,
}

impl FdsnHttpClient {
    pub fn new(base_url: &str) -> Result<Self, ArchiveError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("seis-archive/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ArchiveError::Configuration(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| ArchiveError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            codec: None,
        })
    }

    pub fn iris() -> Result<Self, ArchiveError> {
        Self::new(IRIS_BASE_URL)
    }

    pub fn with_codec(mut self, codec: Arc<dyn WaveformCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn dataselect_url(&self) -> String {
        format!("{}{DATASELECT_PATH}", self.base_url)
    }

    pub fn station_url(&self) -> String {
        format!("{}{STATION_PATH}", self.base_url)
    }

    fn handle_status(response: Response) -> Result<Response, ArchiveError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "FDSN request failed".to_string());
        Err(ArchiveError::TransportStatus { status, message })
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<Response, ArchiveError>
    where
        F: FnMut() -> RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 500;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Err(ArchiveError::Transport(err.to_string()));
                }
            }
        }
    }
}

impl FdsnClient for FdsnHttpClient {
    fn get_waveforms(
        &self,
        query: &WaveformQuery,
        attach_response: bool,
    ) -> Result<Stream, ArchiveError> {
        let codec = self.codec.as_deref().ok_or_else(|| {
            ArchiveError::Configuration(format!(
                "{} returns miniSEED, a waveform codec is required to decode it",
                self.base_url
            ))
        })?;
        let params = waveform_params(query)?;
        let url = self.dataselect_url();
        let response = self.send_with_retries(|| self.client.get(&url).query(&params))?;
        // 204 is the service's way of saying "no data"
        if response.status().as_u16() == 204 {
            return Err(ArchiveError::TransportStatus {
                status: 204,
                message: "no data available".to_string(),
            });
        }
        let bytes = Self::handle_status(response)?
            .bytes()
            .map_err(|err| ArchiveError::Transport(err.to_string()))?;
        let mut stream = codec.decode(&bytes)?;

        if attach_response {
            let inventory = self.get_stations(&InventoryQuery {
                network: query.network.clone(),
                station: query.station.clone(),
                location: query.location.clone(),
                channels: query.channel.split(',').map(str::to_string).collect(),
                start: query.start,
                end: query.end,
            })?;
            for trace in stream.traces_mut() {
                trace.response = Some(inventory.document.clone());
            }
        }
        Ok(stream)
    }
}

impl InventoryClient for FdsnHttpClient {
    fn get_stations(&self, query: &InventoryQuery) -> Result<Inventory, ArchiveError> {
        let params = [
            ("network", query.network.clone()),
            ("station", query.station.clone()),
            ("location", wire_location(&query.location)),
            ("channel", query.channels.join(",")),
            ("starttime", wire_time(query.start)?),
            ("endtime", wire_time(query.end)?),
            ("level", "response".to_string()),
        ];
        let url = self.station_url();
        let response = self
            .send_with_retries(|| self.client.get(&url).query(&params))
            .map_err(|err| ArchiveError::Inventory(err.to_string()))?;
        let document = Self::handle_status(response)
            .map_err(|err| ArchiveError::Inventory(err.to_string()))?
            .text()
            .map_err(|err| ArchiveError::Inventory(err.to_string()))?;
        Ok(Inventory {
            source: self.base_url.clone(),
            document,
        })
    }
}

fn waveform_params(query: &WaveformQuery) -> Result<Vec<(&'static str, String)>, ArchiveError> {
    Ok(vec![
        ("network", query.network.clone()),
        ("station", query.station.clone()),
        ("location", wire_location(&query.location)),
        ("channel", query.channel.clone()),
        ("starttime", wire_time(query.start)?),
        ("endtime", wire_time(query.end)?),
    ])
}

fn wire_location(location: &str) -> String {
    if location.is_empty() {
        "--".to_string()
    } else {
        location.to_string()
    }
}

fn wire_time(epoch: f64) -> Result<String, ArchiveError> {
    to_datetime(epoch)
        .map(|time| time.format("%Y-%m-%dT%H:%M:%S%.6f").to_string())
        .ok_or_else(|| ArchiveError::InvalidTime(epoch.to_string()))
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_follow_fdsn_paths() {
        let client = FdsnHttpClient::new("https://service.iris.edu/").unwrap();
        assert_eq!(
            client.dataselect_url(),
            "https://service.iris.edu/fdsnws/dataselect/1/query"
        );
        assert_eq!(
            client.station_url(),
            "https://service.iris.edu/fdsnws/station/1/query"
        );
    }

    #[test]
    fn params_use_wire_conventions() {
        let query = WaveformQuery {
            network: "UU".to_string(),
            station: "SRU".to_string(),
            location: String::new(),
            channel: "HHZ,HHN".to_string(),
            start: 0.0,
            end: 1.5,
        };
        let params = waveform_params(&query).unwrap();
        assert!(params.contains(&("location", "--".to_string())));
        assert!(params.contains(&("channel", "HHZ,HHN".to_string())));
        assert!(params.contains(&("starttime", "1970-01-01T00:00:00.000000".to_string())));
        assert!(params.contains(&("endtime", "1970-01-01T00:00:01.500000".to_string())));
    }

    #[test]
    fn waveforms_need_a_codec() {
        let client = FdsnHttpClient::new("http://127.0.0.1:9").unwrap();
        let query = WaveformQuery {
            network: "UU".to_string(),
            station: "SRU".to_string(),
            location: "*".to_string(),
            channel: "HHZ".to_string(),
            start: 0.0,
            end: 1.0,
        };
        let err = client.get_waveforms(&query, false).unwrap_err();
        assert!(matches!(err, ArchiveError::Configuration(_)));
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
    }
}
