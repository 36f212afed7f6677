use crate::domain::{OutputType, PreFilter, StationRequest, format_time};
use crate::error::ArchiveError;
use crate::logging::LogSink;
use crate::waveform::Stream;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponsePolicy {
    pub output: OutputType,
    pub pre_filter: PreFilter,
}

impl Default for ResponsePolicy {
    fn default() -> Self {
        Self {
            output: OutputType::Vel,
            pre_filter: PreFilter::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    pub source: String,
    pub document: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InventoryQuery {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channels: Vec<String>,
    pub start: f64,
    pub end: f64,
}

impl From<&StationRequest> for InventoryQuery {
    fn from(request: &StationRequest) -> Self {
        Self {
            network: request.network.clone(),
            station: request.station.clone(),
            location: request.location.clone(),
            channels: request.channels.clone(),
            start: request.start,
            end: request.end,
        }
    }
}

pub trait InventoryClient: Send + Sync {
    fn get_stations(&self, query: &InventoryQuery) -> Result<Inventory, ArchiveError>;
}

pub enum InventorySource {
    Static(Inventory),
    Client(Box<dyn InventoryClient>),
}

impl InventorySource {
    pub fn resolve(&self, query: &InventoryQuery) -> Result<Inventory, ArchiveError> {
        match self {
            InventorySource::Static(inventory) => Ok(inventory.clone()),
            InventorySource::Client(client) => client.get_stations(query),
        }
    }
}

pub trait ResponseRemover: Send + Sync {
    fn attach(&self, stream: &mut Stream, inventory: &Inventory) -> Result<(), ArchiveError>;

    fn remove(
        &self,
        stream: &mut Stream,
        output: OutputType,
        pre_filter: PreFilter,
    ) -> Result<(), ArchiveError>;
}

pub struct ResponseStage {
    policy: ResponsePolicy,
    inventory: Option<InventorySource>,
    remover: Box<dyn ResponseRemover>,
}

impl ResponseStage {
    pub fn new(
        policy: ResponsePolicy,
        inventory: Option<InventorySource>,
        remover: Box<dyn ResponseRemover>,
    ) -> Self {
        Self {
            policy,
            inventory,
            remover,
        }
    }

    pub fn has_inventory(&self) -> bool {
        self.inventory.is_some()
    }

    pub fn apply(
        &self,
        mut stream: Stream,
        request: &StationRequest,
        sink: &dyn LogSink,
    ) -> Option<Stream> {
        if let Some(source) = &self.inventory {
            if !stream.has_response() {
                let attached = source
                    .resolve(&InventoryQuery::from(request))
                    .and_then(|inventory| self.remover.attach(&mut stream, &inventory));
                if let Err(err) = attached {
                    sink.warn(format!(
                        "could not attach response for {} from {}, skipping: {err}",
                        request.netsta(),
                        format_time(request.start)
                    ));
                    return None;
                }
            }
        }

        stream.detrend_linear();
        even_first_trace(&mut stream);
        if let Err(err) =
            self.remover
                .remove(&mut stream, self.policy.output, self.policy.pre_filter)
        {
            let (from, to) = (
                stream.starttime().unwrap_or(request.start),
                stream.endtime().unwrap_or(request.end),
            );
            sink.warn(format!(
                "response removal failed for {} from {} to {}, skipping: {err}",
                request.netsta(),
                format_time(from),
                format_time(to)
            ));
            return None;
        }
        Some(stream)
    }
}

// Gives the first trace an even number of samples before the FFT-based
// response removal: an odd trace gains a copy of its first sample when
// `npts % 100 > 50`, otherwise loses its first sample.
pub fn even_first_trace(stream: &mut Stream) {
    let Some(trace) = stream.traces_mut().first_mut() else {
        return;
    };
    let npts = trace.npts();
    if npts % 2 == 0 {
        return;
    }
    let delta = trace.delta();
    if npts % 100 > 50 {
        let first = trace.data[0];
        trace.data.insert(0, first);
        trace.starttime -= delta;
    } else {
        trace.data.remove(0);
        trace.starttime += delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{Level, MemorySink};
    use crate::waveform::Trace;

    struct ScaleRemover {
        fail: bool,
    }

    impl ResponseRemover for ScaleRemover {
        fn attach(&self, stream: &mut Stream, inventory: &Inventory) -> Result<(), ArchiveError> {
            for trace in stream.traces_mut() {
                trace.response = Some(inventory.document.clone());
            }
            Ok(())
        }

        fn remove(
            &self,
            stream: &mut Stream,
            _output: OutputType,
            _pre_filter: PreFilter,
        ) -> Result<(), ArchiveError> {
            if self.fail || !stream.has_response() {
                return Err(ArchiveError::ResponseRemoval("no response".to_string()));
            }
            for trace in stream.traces_mut() {
                trace.data.iter_mut().for_each(|value| *value *= 0.5);
            }
            Ok(())
        }
    }

    fn request() -> StationRequest {
        StationRequest {
            network: "NT".to_string(),
            station: "STA".to_string(),
            channels: vec!["BHZ".to_string()],
            location: "*".to_string(),
            start: 0.0,
            end: 10.0,
        }
    }

    fn stream(npts: usize) -> Stream {
        Stream::new(vec![Trace::new(
            "NT",
            "STA",
            "",
            "BHZ",
            0.0,
            1.0,
            (0..npts).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect(),
        )])
    }

    fn inventory() -> InventorySource {
        InventorySource::Static(Inventory {
            source: "test".to_string(),
            document: "<FDSNStationXML/>".to_string(),
        })
    }

    #[test]
    fn attaches_then_removes() {
        let sink = MemorySink::new();
        let stage = ResponseStage::new(
            ResponsePolicy::default(),
            Some(inventory()),
            Box::new(ScaleRemover { fail: false }),
        );
        let out = stage.apply(stream(10), &request(), &sink).unwrap();
        assert!(out.has_response());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn removal_failure_drops_chunk() {
        let sink = MemorySink::new();
        let stage = ResponseStage::new(
            ResponsePolicy::default(),
            Some(inventory()),
            Box::new(ScaleRemover { fail: true }),
        );
        assert!(stage.apply(stream(10), &request(), &sink).is_none());
        assert_eq!(sink.count(Level::Warn), 1);
    }

    #[test]
    fn odd_traces_are_evened() {
        let mut short = stream(21);
        even_first_trace(&mut short);
        assert_eq!(short.traces()[0].npts(), 20);
        assert_eq!(short.traces()[0].starttime, 1.0);

        let mut long = stream(77);
        even_first_trace(&mut long);
        assert_eq!(long.traces()[0].npts(), 78);
        assert_eq!(long.traces()[0].starttime, -1.0);
    }
}
