use crate::archive::Archive;
use crate::domain::{StationRequest, format_time};
use crate::error::ArchiveError;
use crate::logging::LogSink;
use crate::waveform::Stream;

#[derive(Debug, Clone, PartialEq)]
pub struct WaveformQuery {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub start: f64,
    pub end: f64,
}

impl WaveformQuery {
    fn for_channel(request: &StationRequest, channel: &str) -> Self {
        Self {
            network: request.network.clone(),
            station: request.station.clone(),
            location: request.location.clone(),
            channel: channel.to_string(),
            start: request.start,
            end: request.end,
        }
    }
}

pub trait FdsnClient: Send + Sync {
    fn get_waveforms(
        &self,
        query: &WaveformQuery,
        attach_response: bool,
    ) -> Result<Stream, ArchiveError>;
}

pub trait NeicClient: Send + Sync {
    fn get_waveform(&self, query: &WaveformQuery) -> Result<Stream, ArchiveError>;
}

pub trait EarthwormClient: Send + Sync {
    fn get_waveform(&self, query: &WaveformQuery) -> Result<Stream, ArchiveError>;
}

pub enum RemoteClient {
    Fdsn(Box<dyn FdsnClient>),
    Neic(Box<dyn NeicClient>),
    Earthworm(Box<dyn EarthwormClient>),
}

impl RemoteClient {
    pub fn kind(&self) -> &'static str {
        match self {
            RemoteClient::Fdsn(_) => "fdsn",
            RemoteClient::Neic(_) => "neic",
            RemoteClient::Earthworm(_) => "earthworm",
        }
    }
}

#[derive(Clone)]
pub struct ArchiveBackend {
    archive: Archive,
}

impl ArchiveBackend {
    pub fn new(archive: Archive) -> Result<Self, ArchiveError> {
        if archive.codec().is_none() {
            return Err(ArchiveError::Configuration(format!(
                "reading from {} requires a waveform codec",
                archive.root()
            )));
        }
        Ok(Self { archive })
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    fn fetch(
        &self,
        request: &StationRequest,
        sink: &dyn LogSink,
    ) -> Result<Option<Stream>, ArchiveError> {
        let paths = self
            .archive
            .query(&request.netsta(), request.start, request.end, sink)?;
        let Some(paths) = paths else {
            sink.warn(format!(
                "data from {} to {} on {} not found in {}",
                format_time(request.start),
                format_time(request.end),
                request.netsta(),
                self.archive.root()
            ));
            return Ok(None);
        };
        let Some(codec) = self.archive.codec() else {
            return Ok(None);
        };

        let mut stream = Stream::default();
        for path in &paths {
            match codec.read(path) {
                Ok(read) => stream.extend(read),
                Err(err) => sink.warn(format!(
                    "cannot read {path}, the file may be corrupt, skipping it: {err}"
                )),
            }
        }

        let location = match request.location.as_str() {
            "??" | "???" => "*",
            other => other,
        };
        let mut selected = Stream::default();
        for channel in &request.channels {
            selected.extend(stream.select(channel, location));
        }
        Ok(Some(selected))
    }
}

pub enum Backend {
    Archive(ArchiveBackend),
    Fdsn(Box<dyn FdsnClient>),
    Neic(Box<dyn NeicClient>),
    Earthworm(Box<dyn EarthwormClient>),
}

impl From<RemoteClient> for Backend {
    fn from(client: RemoteClient) -> Self {
        match client {
            RemoteClient::Fdsn(client) => Backend::Fdsn(client),
            RemoteClient::Neic(client) => Backend::Neic(client),
            RemoteClient::Earthworm(client) => Backend::Earthworm(client),
        }
    }
}

impl Backend {
    pub fn kind(&self) -> &'static str {
        match self {
            Backend::Archive(_) => "archive",
            Backend::Fdsn(_) => "fdsn",
            Backend::Neic(_) => "neic",
            Backend::Earthworm(_) => "earthworm",
        }
    }

    pub fn fetch(
        &self,
        request: &StationRequest,
        attach_response: bool,
        sink: &dyn LogSink,
    ) -> Result<Option<Stream>, ArchiveError> {
        match self {
            Backend::Archive(backend) => backend.fetch(request, sink),
            Backend::Fdsn(client) => {
                let query = WaveformQuery::for_channel(request, &request.channels.join(","));
                match client.get_waveforms(&query, attach_response) {
                    Ok(stream) => Ok(Some(stream)),
                    Err(err) => {
                        report_transport(request, sink, &err);
                        Ok(None)
                    }
                }
            }
            Backend::Neic(client) => Ok(Some(per_channel(request, sink, |query| {
                client.get_waveform(query)
            }))),
            Backend::Earthworm(client) => Ok(Some(per_channel(request, sink, |query| {
                client.get_waveform(query)
            }))),
        }
    }
}

fn per_channel<F>(request: &StationRequest, sink: &dyn LogSink, mut fetch: F) -> Stream
where
    F: FnMut(&WaveformQuery) -> Result<Stream, ArchiveError>,
{
    let mut stream = Stream::default();
    for channel in &request.channels {
        match fetch(&WaveformQuery::for_channel(request, channel)) {
            Ok(fetched) => stream.extend(fetched),
            Err(err) => report_transport(request, sink, &err),
        }
    }
    stream
}

fn report_transport(request: &StationRequest, sink: &dyn LogSink, err: &ArchiveError) {
    sink.warn(format!(
        "could not fetch data on {} from {} to {}: {err}",
        request.netsta(),
        format_time(request.start),
        format_time(request.end)
    ));
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::logging::{Level, MemorySink};
    use crate::waveform::Trace;

    #[derive(Default)]
    struct RecordingNeic {
        queries: Mutex<Vec<String>>,
    }

    impl NeicClient for RecordingNeic {
        fn get_waveform(&self, query: &WaveformQuery) -> Result<Stream, ArchiveError> {
            self.queries.lock().unwrap().push(query.channel.clone());
            if query.channel == "BHN" {
                return Err(ArchiveError::Transport("connection reset".to_string()));
            }
            Ok(Stream::new(vec![Trace::new(
                &query.network,
                &query.station,
                "",
                &query.channel,
                query.start,
                1.0,
                vec![1.0; 10],
            )]))
        }
    }

    struct JoinedFdsn;

    impl FdsnClient for JoinedFdsn {
        fn get_waveforms(
            &self,
            query: &WaveformQuery,
            _attach_response: bool,
        ) -> Result<Stream, ArchiveError> {
            Err(ArchiveError::Transport(format!("timeout for {}", query.channel)))
        }
    }

    fn request() -> StationRequest {
        StationRequest {
            network: "NT".to_string(),
            station: "STA".to_string(),
            channels: vec!["BHZ".to_string(), "BHN".to_string(), "BHE".to_string()],
            location: "*".to_string(),
            start: 0.0,
            end: 10.0,
        }
    }

    #[test]
    fn neic_requests_each_channel_and_skips_failures() {
        let sink = MemorySink::new();
        let client = RecordingNeic::default();
        let backend = Backend::Neic(Box::new(client));
        let stream = backend.fetch(&request(), false, &sink).unwrap().unwrap();

        assert_eq!(stream.len(), 2);
        assert_eq!(sink.count(Level::Warn), 1);
    }

    #[test]
    fn fdsn_transport_errors_become_none() {
        let sink = MemorySink::new();
        let backend = Backend::Fdsn(Box::new(JoinedFdsn));
        assert!(backend.fetch(&request(), true, &sink).unwrap().is_none());
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].message.contains("BHZ,BHN,BHE"));
    }
}
