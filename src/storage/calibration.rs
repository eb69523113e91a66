//! Applied profile versions and calibration proposals

use super::{ForecastStore, StoreError};
use crate::calibration::CalibrationProposal;
use crate::types::ProfileSet;

fn version_key(version: u64) -> String {
    format!("{version:010}")
}

impl ForecastStore {
    // ========================================================================
    // Profile versions
    // ========================================================================

    /// The most recently applied profile set, if any was ever applied.
    pub fn active_profile_set(&self) -> Result<Option<ProfileSet>, StoreError> {
        match self.profiles.last()? {
            Some((_, bytes)) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Record a new profile version. Versions are write-once; a second
    /// writer for the same version gets `VersionConflict`.
    pub fn put_profile_set(&self, profiles: &ProfileSet) -> Result<(), StoreError> {
        let key = version_key(profiles.version);
        let swapped = self.profiles.compare_and_swap(
            key.as_bytes(),
            None::<&[u8]>,
            Some(serde_json::to_vec(profiles)?),
        )?;
        swapped.map_err(|_| StoreError::VersionConflict(profiles.version))?;
        self.profiles.flush()?;
        Ok(())
    }

    pub fn profile_history(&self) -> Result<Vec<ProfileSet>, StoreError> {
        self.profiles
            .iter()
            .values()
            .map(|v| Ok(serde_json::from_slice(&v?)?))
            .collect()
    }

    // ========================================================================
    // Proposals
    // ========================================================================

    /// Id for the next proposal. Callers hold the calibration lock.
    pub fn next_proposal_id(&self) -> Result<u64, StoreError> {
        match self.proposals.last()? {
            Some((_, bytes)) => {
                let last: CalibrationProposal = serde_json::from_slice(&bytes)?;
                Ok(last.id + 1)
            }
            None => Ok(1),
        }
    }

    pub fn put_proposal(&self, proposal: &CalibrationProposal) -> Result<(), StoreError> {
        self.proposals
            .insert(version_key(proposal.id).as_bytes(), serde_json::to_vec(proposal)?)?;
        self.proposals.flush()?;
        Ok(())
    }

    pub fn proposal(&self, id: u64) -> Result<Option<CalibrationProposal>, StoreError> {
        match self.proposals.get(version_key(id).as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All stored proposals, oldest first.
    pub fn proposals(&self) -> Result<Vec<CalibrationProposal>, StoreError> {
        self.proposals
            .iter()
            .values()
            .map(|v| Ok(serde_json::from_slice(&v?)?))
            .collect()
    }
}
