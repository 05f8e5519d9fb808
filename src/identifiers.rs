//! Producing and checking the identifiers handed to the ring.

use std::collections::BTreeSet;

use rand::seq::index;
use rand::Rng;

use crate::abstractions::ProcessId;
use crate::error::ConfigurationError;

/// Random identifiers are drawn from `1..=MAX_RANDOM_ID`.
pub const MAX_RANDOM_ID: u32 = 9999;

pub fn random(count: usize) -> Result<Vec<u32>, ConfigurationError> {
    random_with(count, &mut rand::rng())
}

/// Draws `count` distinct identifiers in ring order.
pub fn random_with(count: usize, rng: &mut impl Rng) -> Result<Vec<u32>, ConfigurationError> {
    ensure_ring_size(count)?;
    let available = MAX_RANDOM_ID as usize;
    if count > available {
        return Err(ConfigurationError::TooManyProcesses {
            requested: count,
            available,
        });
    }

    Ok(index::sample(rng, available, count)
        .into_iter()
        .map(|i| i as u32 + 1)
        .collect())
}

/// Checks user supplied identifiers: at least two, all positive, no repeats.
pub fn validate(ids: &[i64]) -> Result<Vec<u32>, ConfigurationError> {
    ensure_ring_size(ids.len())?;

    let ids = ids
        .iter()
        .map(|&id| match u32::try_from(id) {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(ConfigurationError::InvalidIdentifier { id: id.to_string() }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    ensure_unique(&ids)?;
    Ok(ids)
}

pub fn ensure_ring_size(size: usize) -> Result<(), ConfigurationError> {
    if size < 2 {
        return Err(ConfigurationError::RingTooSmall { size });
    }
    Ok(())
}

pub fn ensure_unique<I: ProcessId>(ids: &[I]) -> Result<(), ConfigurationError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(*id) {
            return Err(ConfigurationError::DuplicateIdentifier {
                id: format!("{id:?}"),
            });
        }
    }
    Ok(())
}
