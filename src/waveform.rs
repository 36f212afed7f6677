use std::collections::BTreeSet;
use std::fs;

use camino::Utf8Path;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::OutputFormat;
use crate::error::ArchiveError;

const SAMPLE_EPS: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub starttime: f64,
    pub sampling_rate: f64,
    pub data: Vec<f64>,
    #[serde(default)]
    pub response: Option<String>,
}

impl Trace {
    pub fn new(
        network: &str,
        station: &str,
        location: &str,
        channel: &str,
        starttime: f64,
        sampling_rate: f64,
        data: Vec<f64>,
    ) -> Self {
        Self {
            network: network.to_string(),
            station: station.to_string(),
            location: location.to_string(),
            channel: channel.to_string(),
            starttime,
            sampling_rate,
            data,
            response: None,
        }
    }

    pub fn id(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }

    pub fn netsta(&self) -> String {
        format!("{}.{}", self.network, self.station)
    }

    pub fn npts(&self) -> usize {
        self.data.len()
    }

    pub fn delta(&self) -> f64 {
        1.0 / self.sampling_rate
    }

    pub fn endtime(&self) -> f64 {
        if self.data.is_empty() {
            return self.starttime;
        }
        self.starttime + (self.data.len() - 1) as f64 * self.delta()
    }

    pub fn is_all_zero(&self) -> bool {
        self.data.iter().all(|value| *value == 0.0)
    }

    fn trim(&mut self, start: f64, end: f64) {
        if self.data.is_empty() {
            return;
        }
        let delta = self.delta();
        let last = self.data.len() as f64 - 1.0;
        let first_idx = ((start - self.starttime) / delta - SAMPLE_EPS).ceil().max(0.0);
        let last_idx = ((end - self.starttime) / delta + SAMPLE_EPS).floor().min(last);
        if first_idx > last_idx {
            self.data.clear();
            return;
        }
        let (first_idx, last_idx) = (first_idx as usize, last_idx as usize);
        self.data.truncate(last_idx + 1);
        self.data.drain(..first_idx);
        self.starttime += first_idx as f64 * delta;
    }

    fn pad(&mut self, start: f64, end: f64, fill: f64) {
        if self.data.is_empty() {
            return;
        }
        let delta = self.delta();
        if start < self.starttime {
            let count = ((self.starttime - start) / delta + SAMPLE_EPS).floor() as usize;
            if count > 0 {
                let mut padded = vec![fill; count];
                padded.extend_from_slice(&self.data);
                self.data = padded;
                self.starttime -= count as f64 * delta;
            }
        }
        let endtime = self.endtime();
        if end > endtime {
            let count = ((end - endtime) / delta + SAMPLE_EPS).floor() as usize;
            self.data.extend(std::iter::repeat_n(fill, count));
        }
    }

    fn detrend_linear(&mut self) {
        let n = self.data.len();
        if n == 0 {
            return;
        }
        let mean_x = (n as f64 - 1.0) / 2.0;
        let mean_y = self.data.iter().sum::<f64>() / n as f64;
        let mut sxy = 0.0;
        let mut sxx = 0.0;
        for (i, value) in self.data.iter().enumerate() {
            let dx = i as f64 - mean_x;
            sxy += dx * (value - mean_y);
            sxx += dx * dx;
        }
        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        for (i, value) in self.data.iter_mut().enumerate() {
            *value -= mean_y + slope * (i as f64 - mean_x);
        }
    }

    fn same_channel(&self, other: &Trace) -> bool {
        self.network == other.network
            && self.station == other.station
            && self.location == other.location
            && self.channel == other.channel
            && (self.sampling_rate - other.sampling_rate).abs() < 1e-9
    }

    fn splice(&mut self, next: &Trace, fill: f64) {
        let offset = ((next.starttime - self.starttime) * self.sampling_rate)
            .round()
            .max(0.0) as usize;
        let new_len = self.data.len().max(offset + next.data.len());
        self.data.resize(new_len, fill);
        self.data[offset..offset + next.data.len()].copy_from_slice(&next.data);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gap {
    pub id: String,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    traces: Vec<Trace>,
}

impl Stream {
    pub fn new(traces: Vec<Trace>) -> Self {
        Self { traces }
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    pub fn traces_mut(&mut self) -> &mut [Trace] {
        &mut self.traces
    }

    pub fn push(&mut self, trace: Trace) {
        self.traces.push(trace);
    }

    pub fn extend(&mut self, other: Stream) {
        self.traces.extend(other.traces);
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn starttime(&self) -> Option<f64> {
        self.traces
            .iter()
            .map(|trace| trace.starttime)
            .reduce(f64::min)
    }

    pub fn endtime(&self) -> Option<f64> {
        self.traces.iter().map(Trace::endtime).reduce(f64::max)
    }

    pub fn channel_count(&self) -> usize {
        self.traces
            .iter()
            .map(|trace| trace.channel.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn has_response(&self) -> bool {
        !self.traces.is_empty() && self.traces.iter().all(|trace| trace.response.is_some())
    }

    pub fn gaps(&self) -> Vec<Gap> {
        let mut sorted = self.traces.iter().collect::<Vec<_>>();
        sorted.sort_by(|a, b| a.id().cmp(&b.id()).then(a.starttime.total_cmp(&b.starttime)));
        sorted
            .windows(2)
            .filter(|pair| pair[0].id() == pair[1].id())
            .filter_map(|pair| {
                let (prev, next) = (pair[0], pair[1]);
                let duration = next.starttime - prev.endtime();
                (duration > prev.delta() * (1.0 + SAMPLE_EPS)).then(|| Gap {
                    id: prev.id(),
                    start: prev.endtime(),
                    end: next.starttime,
                    duration,
                })
            })
            .collect()
    }

    pub fn gap_seconds(&self) -> f64 {
        self.gaps().iter().map(|gap| gap.duration).sum()
    }

    pub fn round_sampling_rates(&mut self) -> bool {
        let mut changed = false;
        for trace in &mut self.traces {
            if trace.sampling_rate.fract() != 0.0 {
                trace.sampling_rate = trace.sampling_rate.round().max(1.0);
                changed = true;
            }
        }
        changed
    }

    pub fn trim(&mut self, start: f64, end: f64) {
        for trace in &mut self.traces {
            trace.trim(start, end);
        }
        self.traces.retain(|trace| !trace.data.is_empty());
    }

    pub fn trim_padded(&mut self, start: f64, end: f64, fill: f64) {
        self.trim(start, end);
        for trace in &mut self.traces {
            trace.pad(start, end, fill);
        }
    }

    // Joins segments of the same channel. Overlaps keep the later segment's
    // samples. Without `fill`, segments separated by a gap stay separate, so
    // the result is a set of contiguous segments; with `fill`, gaps are
    // filled and each channel becomes one trace.
    pub fn merge(&mut self, fill: Option<f64>) {
        let mut pending = std::mem::take(&mut self.traces);
        pending.sort_by(|a, b| a.id().cmp(&b.id()).then(a.starttime.total_cmp(&b.starttime)));

        let mut merged: Vec<Trace> = Vec::with_capacity(pending.len());
        for next in pending {
            let Some(current) = merged.last_mut() else {
                merged.push(next);
                continue;
            };
            if !current.same_channel(&next) {
                merged.push(next);
                continue;
            }
            let gap_samples = (next.starttime - current.endtime()) * current.sampling_rate;
            match fill {
                _ if gap_samples <= 1.0 + SAMPLE_EPS => current.splice(&next, 0.0),
                Some(value) => current.splice(&next, value),
                None => merged.push(next),
            }
        }
        self.traces = merged;
    }

    pub fn detrend_linear(&mut self) {
        for trace in &mut self.traces {
            trace.detrend_linear();
        }
    }

    pub fn select(&self, channel: &str, location: &str) -> Stream {
        let channel = WildcardPattern::new(channel);
        let location = WildcardPattern::new(location);
        Stream::new(
            self.traces
                .iter()
                .filter(|trace| channel.matches(&trace.channel) && location.matches(&trace.location))
                .cloned()
                .collect(),
        )
    }
}

impl FromIterator<Trace> for Stream {
    fn from_iter<I: IntoIterator<Item = Trace>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for Stream {
    type Item = Trace;
    type IntoIter = std::vec::IntoIter<Trace>;

    fn into_iter(self) -> Self::IntoIter {
        self.traces.into_iter()
    }
}

struct WildcardPattern {
    literal: String,
    regex: Option<Regex>,
}

impl WildcardPattern {
    fn new(pattern: &str) -> Self {
        let regex = (pattern.contains('?') || pattern.contains('*')).then(|| {
            let body = regex::escape(pattern)
                .replace(r"\?", ".")
                .replace(r"\*", ".*");
            Regex::new(&format!("^{body}$"))
        });
        Self {
            literal: pattern.to_string(),
            regex: regex.and_then(Result::ok),
        }
    }

    fn matches(&self, value: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(value),
            None => self.literal == value,
        }
    }
}

pub trait WaveformCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Stream, ArchiveError>;

    fn read(&self, path: &Utf8Path) -> Result<Stream, ArchiveError> {
        let bytes = fs::read(path.as_std_path())
            .map_err(|err| ArchiveError::Decode(format!("{path}: {err}")))?;
        self.decode(&bytes)
    }
}

pub trait WaveformWriter: Send + Sync {
    fn write(&self, stream: &Stream, path: &Utf8Path, format: OutputFormat)
    -> Result<(), ArchiveError>;
}
