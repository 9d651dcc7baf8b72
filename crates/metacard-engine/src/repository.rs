//! Repository collaborator
//!
//! The engine never persists anything itself. On save it hands the settled
//! [`CardSnapshot`] to a [`MetadataRepository`] and returns the
//! repository's error unchanged.

use crate::card::CardSnapshot;

/// Persists committed card values
pub trait MetadataRepository {
    /// Repository error (permissions, persistence), surfaced unchanged
    type Error: std::error::Error;

    /// Store a settled card
    ///
    /// # Errors
    /// Whatever the repository reports.
    fn save(&mut self, snapshot: &CardSnapshot) -> Result<(), Self::Error>;
}

impl<R: MetadataRepository + ?Sized> MetadataRepository for &mut R {
    type Error = R::Error;

    fn save(&mut self, snapshot: &CardSnapshot) -> Result<(), Self::Error> {
        (**self).save(snapshot)
    }
}
