//! Fan-out of independent stream decodes.
//!
//! Loading has to walk the segment bytes in order, but once every stream is
//! loaded each owns its state outright. The scheduler decodes them and joins
//! before returning; results keep submission order.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::{EncodedData, PredictorType, Result};

/// How stream decodes are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerMode {
    /// Decode everything on the calling thread.
    Serial,
    /// Streams with at least `serial_threshold` values go to the rayon pool,
    /// smaller ones stay on the calling thread.
    Parallel { serial_threshold: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub mode: SchedulerMode,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mode: SchedulerMode::Parallel {
                serial_threshold: 4096,
            },
        }
    }
}

impl SchedulerConfig {
    pub fn serial() -> Self {
        Self {
            mode: SchedulerMode::Serial,
        }
    }
}

/// One loaded stream plus the predictor that unpacks it.
#[derive(Debug)]
pub struct DecodeJob {
    pub data: EncodedData,
    pub predictor: PredictorType,
}

impl DecodeJob {
    pub fn new(data: EncodedData, predictor: PredictorType) -> Self {
        Self { data, predictor }
    }

    pub fn value_count(&self) -> usize {
        self.data.value_count()
    }

    pub fn run(self) -> Result<Vec<i32>> {
        let mut values = self.data.decode()?;
        self.predictor.unpack(&mut values);
        Ok(values)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Decode every job; the first error in submission order wins.
    pub fn decode_all(&self, jobs: Vec<DecodeJob>) -> Result<Vec<Vec<i32>>> {
        match self.config.mode {
            SchedulerMode::Serial => {
                tracing::debug!(jobs = jobs.len(), "decoding streams serially");
                jobs.into_iter().map(DecodeJob::run).collect()
            }
            SchedulerMode::Parallel { serial_threshold } => {
                Self::decode_parallel(jobs, serial_threshold)
            }
        }
    }

    #[cfg(feature = "parallel")]
    fn decode_parallel(jobs: Vec<DecodeJob>, serial_threshold: usize) -> Result<Vec<Vec<i32>>> {
        let (inline, pooled): (Vec<_>, Vec<_>) = jobs
            .into_iter()
            .enumerate()
            .partition(|(_, job)| job.value_count() < serial_threshold);
        tracing::debug!(
            inline = inline.len(),
            pooled = pooled.len(),
            "dispatching stream decodes"
        );

        let (mut results, pooled_results): (Vec<_>, Vec<_>) = rayon::join(
            || {
                inline
                    .into_iter()
                    .map(|(i, job)| (i, job.run()))
                    .collect::<Vec<_>>()
            },
            || {
                pooled
                    .into_par_iter()
                    .map(|(i, job)| (i, job.run()))
                    .collect::<Vec<_>>()
            },
        );
        results.extend(pooled_results);
        results.sort_unstable_by_key(|(i, _)| *i);
        results.into_iter().map(|(_, r)| r).collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn decode_parallel(jobs: Vec<DecodeJob>, _serial_threshold: usize) -> Result<Vec<Vec<i32>>> {
        jobs.into_iter().map(DecodeJob::run).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DecodeError;

    fn jobs() -> Vec<DecodeJob> {
        (0..6)
            .map(|n| {
                let values: Vec<i32> = (0..n * 3).map(|v| v as i32).collect();
                DecodeJob::new(EncodedData::Null(values), PredictorType::Lag1)
            })
            .collect()
    }

    #[test]
    fn test_modes_agree() {
        let serial = Scheduler::new(SchedulerConfig::serial()).decode_all(jobs()).unwrap();
        for threshold in [0, 5, usize::MAX] {
            let config = SchedulerConfig {
                mode: SchedulerMode::Parallel {
                    serial_threshold: threshold,
                },
            };
            let parallel = Scheduler::new(config).decode_all(jobs()).unwrap();
            assert_eq!(serial, parallel);
        }
        assert_eq!(serial.len(), 6);
        assert_eq!(serial[2], vec![0, 1, 2, 3, 7, 12]);
    }

    #[test]
    fn test_error_is_reported() {
        let mut all = jobs();
        all.push(DecodeJob::new(
            EncodedData::Bitlength2(crate::decode::bitlength::Bitlength2Codec {
                value_count: 3,
                code_text_bits: 0,
                code: crate::decode::BitReader::default(),
            }),
            PredictorType::None,
        ));

        let result = Scheduler::default().decode_all(all);
        assert_eq!(result, Err(DecodeError::UnexpectedEof));
    }
}
