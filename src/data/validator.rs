use crate::error::{GarpError, Result};
use crate::types::Sample;

pub struct SampleValidator;

impl SampleValidator {
    /// Validate that every sample has `dimension` finite features
    pub fn validate(samples: &[Sample], dimension: usize) -> Result<()> {
        for (i, sample) in samples.iter().enumerate() {
            if sample.dimension() != dimension {
                return Err(GarpError::Data(format!(
                    "Sample {} has {} features, expected {}",
                    i,
                    sample.dimension(),
                    dimension
                )));
            }
            if let Some(pos) = sample.features().iter().position(|v| !v.is_finite()) {
                return Err(GarpError::Data(format!(
                    "Sample {} has a non-finite value in dimension {}",
                    i, pos
                )));
            }
        }
        Ok(())
    }

    /// Infer the shared dimension of a set of sample groups.
    pub fn infer_dimension(groups: &[&[Sample]]) -> Result<usize> {
        let first = groups
            .iter()
            .flat_map(|g| g.iter())
            .next()
            .ok_or_else(|| GarpError::Data("No samples available".to_string()))?;
        let dimension = first.dimension();
        if dimension == 0 {
            return Err(GarpError::Data("Samples have no features".to_string()));
        }
        for group in groups {
            Self::validate(group, dimension)?;
        }
        Ok(dimension)
    }

    /// Count features outside the normalized `[-1, 1]` domain.
    pub fn out_of_domain(samples: &[Sample]) -> usize {
        samples
            .iter()
            .flat_map(|s| s.features().iter())
            .filter(|v| **v < -1.0 || **v > 1.0)
            .count()
    }
}
