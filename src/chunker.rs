use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::ArchiveError;
use crate::logging::LogSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sampling {
    pub count: usize,
    pub seed: Option<u64>,
}

impl Sampling {
    pub fn new(count: usize) -> Self {
        Self { count, seed: None }
    }

    pub fn seeded(count: usize, seed: u64) -> Self {
        Self {
            count,
            seed: Some(seed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Chunks {
    duration: f64,
    state: ChunkState,
}

#[derive(Debug, Clone)]
enum ChunkState {
    Aligned { next: i64, last: i64 },
    Sampled(std::vec::IntoIter<i64>),
}

impl Iterator for Chunks {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let multiple = match &mut self.state {
            ChunkState::Aligned { next, last } => {
                if *next > *last {
                    return None;
                }
                let current = *next;
                *next += 1;
                current
            }
            ChunkState::Sampled(iter) => iter.next()?,
        };
        Some(multiple as f64 * self.duration)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match &self.state {
            ChunkState::Aligned { next, last } => (last - next + 1).max(0) as usize,
            ChunkState::Sampled(iter) => iter.len(),
        };
        (remaining, Some(remaining))
    }
}

pub fn chunks(
    start: f64,
    end: f64,
    duration: f64,
    sampling: Option<Sampling>,
    sink: &dyn LogSink,
) -> Result<Chunks, ArchiveError> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(ArchiveError::InvalidWindow(format!(
            "chunk duration must be positive, got {duration}"
        )));
    }
    if !start.is_finite() || !end.is_finite() {
        return Err(ArchiveError::InvalidWindow(format!("{start} to {end}")));
    }
    let first = chunk_index(start, duration)?;
    let last = chunk_index(end, duration)?;

    let Some(sampling) = sampling else {
        return Ok(Chunks {
            duration,
            state: ChunkState::Aligned { next: first, last },
        });
    };

    let population = usize::try_from((last - first + 1).max(0)).map_err(|_| {
        ArchiveError::InvalidWindow(format!("too many {duration} s chunks from {start} to {end}"))
    })?;
    let cap = if population == 0 {
        0
    } else {
        (population / 4).max(1)
    };
    let count = if sampling.count > cap {
        sink.info(format!(
            "population too small for {} random samples, taking {cap}",
            sampling.count
        ));
        cap
    } else {
        sampling.count
    };

    let mut rng = match sampling.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let drawn = rand::seq::index::sample(&mut rng, population, count)
        .into_iter()
        .map(|offset| first + offset as i64)
        .collect::<Vec<_>>();
    Ok(Chunks {
        duration,
        state: ChunkState::Sampled(drawn.into_iter()),
    })
}

// Chunk starts are exact multiples only while the index fits in an f64 mantissa.
const MAX_CHUNK_INDEX: f64 = (1u64 << 53) as f64;

fn chunk_index(time: f64, duration: f64) -> Result<i64, ArchiveError> {
    let index = (time / duration).floor();
    if !index.is_finite() || index.abs() > MAX_CHUNK_INDEX {
        return Err(ArchiveError::InvalidWindow(format!(
            "{time} is out of range for {duration} s chunks"
        )));
    }
    Ok(index as i64)
}
