use crate::domain::format_time;
use crate::logging::LogSink;
use crate::waveform::Stream;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityGate {
    pub short_data_seconds: f64,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self {
            short_data_seconds: 10.0 * 60.0,
        }
    }
}

impl QualityGate {
    pub fn new(short_data_seconds: f64) -> Self {
        Self { short_data_seconds }
    }

    pub fn check(
        &self,
        mut stream: Stream,
        start: f64,
        end: f64,
        sink: &dyn LogSink,
    ) -> Option<Stream> {
        let first = stream.traces().first()?;
        let netsta = first.netsta();
        let time = format_time(first.starttime);

        let covered = match (stream.starttime(), stream.endtime()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        };
        if (end - start) - covered > self.short_data_seconds {
            sink.info(format!("{netsta} starting on {time} is shorter than expected"));
        }

        if stream.round_sampling_rates() {
            sink.warn(format!(
                "found non-integer sampling rates, rounded to nearest integer on {netsta} around {time}"
            ));
        }

        if stream.traces().iter().any(|trace| trace.is_all_zero()) {
            sink.warn(format!(
                "at least one channel is all zeros on {netsta} around {time}, skipping"
            ));
            return None;
        }
        Some(stream)
    }
}
