use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::str::FromStr;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::archive::{Archive, QueryTolerance};
use crate::backend::{ArchiveBackend, Backend, RemoteClient};
use crate::chunker::{self, Chunks, Sampling};
use crate::domain::{
    EventKey, OutputType, PreFilter, StationId, StationKey, StationRequest, TimeWindow,
    format_time,
};
use crate::error::ArchiveError;
use crate::fdsn::FdsnHttpClient;
use crate::layout::{self, CONTINUOUS_DIR_DEFAULT};
use crate::logging::LogSink;
use crate::quality::QualityGate;
use crate::response::{
    Inventory, InventorySource, ResponsePolicy, ResponseRemover, ResponseStage,
};
use crate::waveform::{Stream, WaveformCodec};

const EVENT_LOCATION: &str = "??";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FetchMethod {
    #[default]
    Dir,
    Client,
    Iris,
    Uuss,
}

impl FetchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchMethod::Dir => "dir",
            FetchMethod::Client => "client",
            FetchMethod::Iris => "iris",
            FetchMethod::Uuss => "uuss",
        }
    }
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchMethod {
    type Err = ArchiveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dir" => Ok(FetchMethod::Dir),
            "client" => Ok(FetchMethod::Client),
            "iris" => Ok(FetchMethod::Iris),
            "uuss" => Ok(FetchMethod::Uuss),
            _ => Err(ArchiveError::InvalidMethod(value.to_string())),
        }
    }
}

impl TryFrom<String> for FetchMethod {
    type Error = ArchiveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FetchMethod> for String {
    fn from(method: FetchMethod) -> Self {
        method.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InventorySpec {
    Iris,
    File(Utf8PathBuf),
}

impl InventorySpec {
    pub fn resolve(&self) -> Result<InventorySource, ArchiveError> {
        match self {
            InventorySpec::Iris => Ok(InventorySource::Client(Box::new(FdsnHttpClient::iris()?))),
            InventorySpec::File(path) => {
                let document = fs::read_to_string(path.as_std_path())
                    .map_err(|err| ArchiveError::Inventory(format!("cannot read {path}: {err}")))?;
                Ok(InventorySource::Static(Inventory {
                    source: path.to_string(),
                    document,
                }))
            }
        }
    }
}

impl From<String> for InventorySpec {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("iris") {
            InventorySpec::Iris
        } else {
            InventorySpec::File(Utf8PathBuf::from(value))
        }
    }
}

impl From<InventorySpec> for String {
    fn from(spec: InventorySpec) -> Self {
        match spec {
            InventorySpec::Iris => "iris".to_string(),
            InventorySpec::File(path) => path.into_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    pub short_data_seconds: f64,
    pub overlap_fraction: f64,
    pub index_load_buffer: Option<f64>,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            short_data_seconds: QualityGate::default().short_data_seconds,
            overlap_fraction: QueryTolerance::default().overlap_fraction,
            index_load_buffer: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub method: FetchMethod,
    pub directory: Option<Utf8PathBuf>,
    pub remove_response: bool,
    pub inventory: Option<InventorySpec>,
    pub output_type: OutputType,
    pub pre_filter: PreFilter,
    pub check_data: bool,
    pub fill_zeros: bool,
    pub duration: f64,
    pub buffer: f64,
    pub time_before_origin: f64,
    pub time_after_origin: f64,
    pub tolerances: Tolerances,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            method: FetchMethod::Dir,
            directory: None,
            remove_response: true,
            inventory: None,
            output_type: OutputType::Vel,
            pre_filter: PreFilter::default(),
            check_data: true,
            fill_zeros: false,
            duration: 3600.0,
            buffer: 120.0,
            time_before_origin: 60.0,
            time_after_origin: 240.0,
            tolerances: Tolerances::default(),
        }
    }
}

impl FetcherConfig {
    pub fn with_method(method: FetchMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn query_tolerance(&self) -> QueryTolerance {
        QueryTolerance {
            overlap_fraction: self.tolerances.overlap_fraction,
            load_buffer: self
                .tolerances
                .index_load_buffer
                .unwrap_or(3.0 * self.duration),
        }
    }

    fn response_policy(&self) -> ResponsePolicy {
        ResponsePolicy {
            output: self.output_type,
            pre_filter: self.pre_filter,
        }
    }
}

#[derive(Default)]
pub struct Collaborators {
    pub codec: Option<Arc<dyn WaveformCodec>>,
    pub client: Option<RemoteClient>,
    pub inventory: Option<InventorySource>,
    pub remover: Option<Box<dyn ResponseRemover>>,
}

pub struct DataFetcher {
    config: FetcherConfig,
    backend: Backend,
    quality: Option<QualityGate>,
    response: Option<ResponseStage>,
    sink: Arc<dyn LogSink>,
}

impl DataFetcher {
    pub fn new(
        config: FetcherConfig,
        collaborators: Collaborators,
        sink: Arc<dyn LogSink>,
    ) -> Result<Self, ArchiveError> {
        config.pre_filter.validate()?;
        if !config.duration.is_finite() || config.duration <= 0.0 {
            return Err(ArchiveError::Configuration(format!(
                "chunk duration must be positive, got {}",
                config.duration
            )));
        }
        let Collaborators {
            codec,
            client,
            inventory,
            remover,
        } = collaborators;

        let (backend, default_inventory) = match config.method {
            FetchMethod::Dir => {
                let directory = config
                    .directory
                    .clone()
                    .unwrap_or_else(|| Utf8PathBuf::from(CONTINUOUS_DIR_DEFAULT));
                let archive = Archive::open(directory)?;
                let codec = codec.ok_or_else(|| {
                    ArchiveError::Configuration(
                        "method dir requires a waveform codec to read archive files".to_string(),
                    )
                })?;
                let archive = archive
                    .with_codec(codec)
                    .with_tolerance(config.query_tolerance());
                (Backend::Archive(ArchiveBackend::new(archive)?), None)
            }
            FetchMethod::Client => {
                let client = client.ok_or_else(|| {
                    ArchiveError::Configuration(
                        "method client requires a remote client".to_string(),
                    )
                })?;
                (Backend::from(client), None)
            }
            FetchMethod::Iris => {
                let codec = codec.ok_or_else(|| {
                    ArchiveError::Configuration(
                        "method iris requires a waveform codec to decode miniSEED".to_string(),
                    )
                })?;
                let client = FdsnHttpClient::iris()?.with_codec(codec);
                let inventory = InventorySource::Client(Box::new(client.clone()));
                (Backend::Fdsn(Box::new(client)), Some(inventory))
            }
            FetchMethod::Uuss => {
                let Some(RemoteClient::Neic(client)) = client else {
                    return Err(ArchiveError::Configuration(
                        "method uuss requires a NEIC client".to_string(),
                    ));
                };
                let inventory = InventorySource::Client(Box::new(FdsnHttpClient::iris()?));
                (Backend::Neic(client), Some(inventory))
            }
        };

        let response = if config.remove_response {
            let inventory = match inventory {
                Some(source) => Some(source),
                None => config
                    .inventory
                    .as_ref()
                    .map(InventorySpec::resolve)
                    .transpose()?
                    .or(default_inventory),
            };
            Self::response_stage(&config, &backend, inventory, remover, sink.as_ref())?
        } else {
            None
        };
        let quality = config
            .check_data
            .then(|| QualityGate::new(config.tolerances.short_data_seconds));

        Ok(Self {
            config,
            backend,
            quality,
            response,
            sink,
        })
    }

    fn response_stage(
        config: &FetcherConfig,
        backend: &Backend,
        inventory: Option<InventorySource>,
        remover: Option<Box<dyn ResponseRemover>>,
        sink: &dyn LogSink,
    ) -> Result<Option<ResponseStage>, ArchiveError> {
        if inventory.is_none() {
            match backend {
                Backend::Archive(archive) => {
                    sink.warn(format!(
                        "no inventory given for {}, response removal is disabled",
                        archive.archive().root()
                    ));
                    return Ok(None);
                }
                Backend::Neic(_) | Backend::Earthworm(_) => {
                    return Err(ArchiveError::Configuration(format!(
                        "response removal with a {} client requires an inventory",
                        backend.kind()
                    )));
                }
                Backend::Fdsn(_) => {}
            }
        }
        let remover = remover.ok_or_else(|| {
            ArchiveError::Configuration(
                "response removal requires a response remover".to_string(),
            )
        })?;
        Ok(Some(ResponseStage::new(
            config.response_policy(),
            inventory,
            remover,
        )))
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn removes_response(&self) -> bool {
        self.response.is_some()
    }

    pub fn sink(&self) -> &dyn LogSink {
        self.sink.as_ref()
    }

    // Runs one request through fetch, quality check, response removal and
    // normalization. `Ok(None)` means the chunk was dropped; the reason has
    // already been reported to the sink. Only index failures are errors.
    pub fn get_stream(&self, request: &StationRequest) -> Result<Option<Stream>, ArchiveError> {
        let sink = self.sink.as_ref();
        // FDSN services can attach responses themselves when no inventory was given
        let attach = self
            .response
            .as_ref()
            .is_some_and(|stage| !stage.has_inventory());

        let Some(stream) = self.backend.fetch(request, attach, sink)? else {
            return Ok(None);
        };
        if stream.is_empty() {
            return Ok(None);
        }

        let stream = match &self.quality {
            Some(gate) => gate.check(stream, request.start, request.end, sink),
            None => Some(stream),
        };
        let Some(stream) = stream else {
            return Ok(None);
        };

        let stream = match &self.response {
            Some(stage) => stage.apply(stream, request, sink),
            None => Some(stream),
        };
        let Some(mut stream) = stream else {
            return Ok(None);
        };

        self.normalize(&mut stream, request.start, request.end);
        Ok((!stream.is_empty()).then_some(stream))
    }

    fn normalize(&self, stream: &mut Stream, start: f64, end: f64) {
        stream.trim(start, end);
        stream.merge(None);
        stream.detrend_linear();
        if self.config.fill_zeros {
            stream.merge(Some(0.0));
            stream.trim_padded(start, end, 0.0);
        }
    }

    pub fn event_chunks<'a>(
        &'a self,
        stations: &'a [StationKey],
        events: &'a [EventKey],
        options: EventOptions,
    ) -> Result<EventChunks<'a>, ArchiveError> {
        let span = options.time_before_origin + options.time_after_origin;
        if !span.is_finite() || span <= 0.0 {
            return Err(ArchiveError::InvalidWindow(format!(
                "{} s before and {} s after origin is an empty window",
                options.time_before_origin, options.time_after_origin
            )));
        }
        Ok(EventChunks {
            fetcher: self,
            stations,
            events,
            options,
            station_index: 0,
            event_index: 0,
        })
    }

    pub fn continuous_chunks<'a>(
        &'a self,
        stations: &'a [StationKey],
        options: ContinuousOptions,
    ) -> Result<ContinuousChunks<'a>, ArchiveError> {
        if !options.duration.is_finite() || options.duration <= 0.0 || options.buffer < 0.0 {
            return Err(ArchiveError::InvalidWindow(format!(
                "duration {} with buffer {}",
                options.duration, options.buffer
            )));
        }
        Ok(ContinuousChunks {
            fetcher: self,
            stations,
            options,
            station_index: 0,
            current: None,
        })
    }

    fn event_chunk(
        &self,
        key: &StationKey,
        event: &EventKey,
        options: &EventOptions,
    ) -> Result<Option<EventChunk>, ArchiveError> {
        let netsta = key.id.to_string();
        let skipped = options
            .skip
            .get(&netsta)
            .is_some_and(|names| names.contains(&event.name));
        if skipped {
            return Ok(None);
        }
        if let Some(dir) = &options.skip_existing {
            if layout::event_location(dir, &key.id, &event.name).exists() {
                self.sink
                    .info(format!("{netsta} for {} already exists, skipping", event.name));
                return Ok(None);
            }
        }

        let window = TimeWindow::new(
            event.origin - options.time_before_origin,
            event.origin + options.time_after_origin,
        )?;
        let request = StationRequest::new(&key.id, &key.channels, EVENT_LOCATION, window);
        Ok(self.get_stream(&request)?.map(|stream| EventChunk {
            station: key.id.clone(),
            event: event.name.clone(),
            window,
            stream,
        }))
    }

    fn continuous_chunk(
        &self,
        key: &StationKey,
        chunk_start: f64,
        options: &ContinuousOptions,
    ) -> Result<Option<ContinuousChunk>, ArchiveError> {
        if let Some(dir) = &options.skip_existing {
            if layout::continuous_location(dir, &key.id, chunk_start)?.exists() {
                return Ok(None);
            }
        }
        let window = TimeWindow::new(chunk_start, chunk_start + options.duration + options.buffer)?;
        let request = StationRequest::new(&key.id, &key.channels, &key.location, window);
        Ok(self.get_stream(&request)?.map(|stream| ContinuousChunk {
            station: key.id.clone(),
            chunk_start,
            window,
            stream,
        }))
    }

    fn station_chunks(
        &self,
        key: &StationKey,
        options: &ContinuousOptions,
    ) -> Result<Chunks, ArchiveError> {
        let start = options.start.or(key.starttime);
        let end = options.end.or(key.endtime);
        let (Some(start), Some(end)) = (start, end) else {
            return Err(ArchiveError::Configuration(format!(
                "no time range given for {}",
                key.id
            )));
        };
        self.sink.info(format!(
            "fetching continuous data for {} from {} to {}",
            key.id,
            format_time(start),
            format_time(end)
        ));
        chunker::chunks(start, end, options.duration, options.sampling, self.sink.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventOptions {
    pub time_before_origin: f64,
    pub time_after_origin: f64,
    pub skip_existing: Option<Utf8PathBuf>,
    pub skip: HashMap<String, HashSet<String>>,
}

impl EventOptions {
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            time_before_origin: config.time_before_origin,
            time_after_origin: config.time_after_origin,
            ..Self::default()
        }
    }

    pub fn skip_existing_in(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.skip_existing = Some(dir.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContinuousOptions {
    pub duration: f64,
    pub buffer: f64,
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub sampling: Option<Sampling>,
    pub skip_existing: Option<Utf8PathBuf>,
}

impl ContinuousOptions {
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            duration: config.duration,
            buffer: config.buffer,
            ..Self::default()
        }
    }

    pub fn skip_existing_in(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.skip_existing = Some(dir.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventChunk {
    pub station: StationId,
    pub event: String,
    pub window: TimeWindow,
    pub stream: Stream,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousChunk {
    pub station: StationId,
    pub chunk_start: f64,
    pub window: TimeWindow,
    pub stream: Stream,
}

impl ContinuousChunk {
    pub fn location(&self, root: &Utf8Path) -> Result<layout::ChunkLocation, ArchiveError> {
        layout::continuous_location(root, &self.station, self.chunk_start)
    }
}

pub struct EventChunks<'a> {
    fetcher: &'a DataFetcher,
    stations: &'a [StationKey],
    events: &'a [EventKey],
    options: EventOptions,
    station_index: usize,
    event_index: usize,
}

impl Iterator for EventChunks<'_> {
    type Item = Result<EventChunk, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let key = self.stations.get(self.station_index)?;
            let Some(event) = self.events.get(self.event_index) else {
                self.station_index += 1;
                self.event_index = 0;
                continue;
            };
            self.event_index += 1;
            match self.fetcher.event_chunk(key, event, &self.options) {
                Ok(Some(chunk)) => return Some(Ok(chunk)),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

pub struct ContinuousChunks<'a> {
    fetcher: &'a DataFetcher,
    stations: &'a [StationKey],
    options: ContinuousOptions,
    station_index: usize,
    current: Option<Chunks>,
}

impl Iterator for ContinuousChunks<'_> {
    type Item = Result<ContinuousChunk, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let key = self.stations.get(self.station_index)?;
            if self.current.is_none() {
                match self.fetcher.station_chunks(key, &self.options) {
                    Ok(chunks) => self.current = Some(chunks),
                    Err(err) => {
                        self.station_index += 1;
                        return Some(Err(err));
                    }
                }
            }
            let Some(chunk_start) = self.current.as_mut().and_then(Iterator::next) else {
                self.current = None;
                self.station_index += 1;
                continue;
            };
            match self.fetcher.continuous_chunk(key, chunk_start, &self.options) {
                Ok(Some(chunk)) => return Some(Ok(chunk)),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

pub fn quick_fetch(
    arg: &str,
    collaborators: Collaborators,
    sink: Arc<dyn LogSink>,
) -> Result<DataFetcher, ArchiveError> {
    let config = match arg.parse::<FetchMethod>() {
        Ok(method) => FetcherConfig::with_method(method),
        Err(_) if Utf8Path::new(arg).as_std_path().is_dir() => FetcherConfig {
            directory: Some(Utf8PathBuf::from(arg)),
            ..FetcherConfig::default()
        },
        Err(err) => return Err(err),
    };
    DataFetcher::new(config, collaborators, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FdsnClient, WaveformQuery};
    use crate::logging::MemorySink;
    use crate::waveform::Trace;

    struct FlatFdsn;

    impl FdsnClient for FlatFdsn {
        fn get_waveforms(
            &self,
            query: &WaveformQuery,
            _attach_response: bool,
        ) -> Result<Stream, ArchiveError> {
            let npts = (query.end - query.start) as usize + 1;
            Ok(query
                .channel
                .split(',')
                .map(|channel| {
                    Trace::new(
                        &query.network,
                        &query.station,
                        "",
                        channel,
                        query.start,
                        1.0,
                        (0..npts).map(|i| (i % 7) as f64 + 1.0).collect(),
                    )
                })
                .collect())
        }
    }

    fn client_fetcher(config: FetcherConfig, sink: Arc<MemorySink>) -> DataFetcher {
        let collaborators = Collaborators {
            client: Some(RemoteClient::Fdsn(Box::new(FlatFdsn))),
            ..Collaborators::default()
        };
        DataFetcher::new(config, collaborators, sink).unwrap()
    }

    fn plain_config() -> FetcherConfig {
        FetcherConfig {
            method: FetchMethod::Client,
            remove_response: false,
            ..FetcherConfig::default()
        }
    }

    fn station(name: &str) -> StationKey {
        StationKey::new(StationId::new("NT", name).unwrap(), vec!["BHZ".to_string()])
    }

    #[test]
    fn methods_parse_case_insensitively() {
        assert_eq!("IRIS".parse::<FetchMethod>().unwrap(), FetchMethod::Iris);
        assert_eq!(" Dir ".parse::<FetchMethod>().unwrap(), FetchMethod::Dir);
        assert!(matches!(
            "ftp".parse::<FetchMethod>(),
            Err(ArchiveError::InvalidMethod(_))
        ));
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: FetcherConfig = serde_json::from_str(r#"{"method": "UUSS"}"#).unwrap();
        assert_eq!(config.method, FetchMethod::Uuss);
        assert_eq!(config.duration, 3600.0);
        assert_eq!(config.query_tolerance().load_buffer, 3.0 * 3600.0);
    }

    #[test]
    fn client_method_requires_client() {
        let sink = Arc::new(MemorySink::new());
        let err = DataFetcher::new(plain_config(), Collaborators::default(), sink)
            .err()
            .unwrap();
        assert!(matches!(err, ArchiveError::Configuration(_)));
    }

    #[test]
    fn uuss_requires_neic_client() {
        let sink = Arc::new(MemorySink::new());
        let collaborators = Collaborators {
            client: Some(RemoteClient::Fdsn(Box::new(FlatFdsn))),
            ..Collaborators::default()
        };
        let config = FetcherConfig {
            method: FetchMethod::Uuss,
            remove_response: false,
            ..FetcherConfig::default()
        };
        assert!(DataFetcher::new(config, collaborators, sink).is_err());
    }

    #[test]
    fn response_without_remover_is_rejected() {
        let sink = Arc::new(MemorySink::new());
        let collaborators = Collaborators {
            client: Some(RemoteClient::Fdsn(Box::new(FlatFdsn))),
            ..Collaborators::default()
        };
        let config = FetcherConfig {
            method: FetchMethod::Client,
            ..FetcherConfig::default()
        };
        assert!(DataFetcher::new(config, collaborators, sink).is_err());
    }

    #[test]
    fn missing_directory_is_fatal() {
        let sink = Arc::new(MemorySink::new());
        let config = FetcherConfig {
            directory: Some(Utf8PathBuf::from("/no/such/archive")),
            ..FetcherConfig::default()
        };
        let err = DataFetcher::new(config, Collaborators::default(), sink)
            .err()
            .unwrap();
        assert!(matches!(err, ArchiveError::DirectoryNotFound(_)));
    }

    #[test]
    fn event_chunks_are_station_major_and_honor_skips() {
        let sink = Arc::new(MemorySink::new());
        let fetcher = client_fetcher(plain_config(), sink);
        let stations = vec![station("AAA"), station("BBB")];
        let events = vec![
            EventKey {
                name: "e1".to_string(),
                origin: 1000.0,
            },
            EventKey {
                name: "e2".to_string(),
                origin: 5000.0,
            },
        ];
        let mut options = EventOptions::from_config(fetcher.config());
        options.skip.insert(
            "NT.BBB".to_string(),
            HashSet::from(["e1".to_string()]),
        );

        let order = fetcher
            .event_chunks(&stations, &events, options)
            .unwrap()
            .map(|chunk| {
                let chunk = chunk.unwrap();
                format!("{}:{}", chunk.station, chunk.event)
            })
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["NT.AAA:e1", "NT.AAA:e2", "NT.BBB:e2"]);
    }

    #[test]
    fn event_window_spans_origin() {
        let sink = Arc::new(MemorySink::new());
        let fetcher = client_fetcher(plain_config(), sink);
        let stations = vec![station("AAA")];
        let events = vec![EventKey {
            name: "e1".to_string(),
            origin: 1000.0,
        }];
        let chunk = fetcher
            .event_chunks(&stations, &events, EventOptions::from_config(fetcher.config()))
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(chunk.window, TimeWindow::new(940.0, 1240.0).unwrap());
        assert_eq!(chunk.stream.starttime(), Some(940.0));
        assert_eq!(chunk.stream.endtime(), Some(1240.0));
    }

    #[test]
    fn continuous_chunks_need_a_time_range() {
        let sink = Arc::new(MemorySink::new());
        let fetcher = client_fetcher(plain_config(), sink);
        let stations = vec![station("AAA")];
        let mut chunks = fetcher
            .continuous_chunks(&stations, ContinuousOptions::from_config(fetcher.config()))
            .unwrap();
        assert!(matches!(chunks.next(), Some(Err(ArchiveError::Configuration(_)))));
        assert!(chunks.next().is_none());
    }

    #[test]
    fn continuous_windows_include_buffer() {
        let sink = Arc::new(MemorySink::new());
        let fetcher = client_fetcher(plain_config(), sink);
        let stations = vec![station("AAA").with_range(3600.0, 3.0 * 3600.0 - 1.0)];
        let windows = fetcher
            .continuous_chunks(&stations, ContinuousOptions::from_config(fetcher.config()))
            .unwrap()
            .map(|chunk| chunk.unwrap().window)
            .collect::<Vec<_>>();
        assert_eq!(
            windows,
            vec![
                TimeWindow::new(3600.0, 7320.0).unwrap(),
                TimeWindow::new(7200.0, 10_920.0).unwrap(),
            ]
        );
    }

    #[test]
    fn quick_fetch_rejects_unknown_argument() {
        let sink = Arc::new(MemorySink::new());
        let err = quick_fetch("nowhere-at-all", Collaborators::default(), sink)
            .err()
            .unwrap();
        assert!(matches!(err, ArchiveError::InvalidMethod(_)));
    }
}
