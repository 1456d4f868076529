use rand::seq::SliceRandom;
use rand::Rng;
use timbre_core::{Error, Result, TrackId};

use crate::artifacts::IndexStore;

/// Draw `n` distinct entries from `tracks`. Order is unspecified.
pub fn sample_tracks<R: Rng + ?Sized>(
    tracks: &[TrackId],
    n: usize,
    rng: &mut R,
) -> Result<Vec<TrackId>> {
    if n > tracks.len() {
        return Err(Error::InvalidInput(format!(
            "cannot sample {n} tracks from an index of {}",
            tracks.len()
        )));
    }
    Ok(tracks.choose_multiple(rng, n).cloned().collect())
}

/// Sample `n` tracks from the persisted identifier list.
pub fn random_sample(store: &IndexStore, n: usize) -> Result<Vec<TrackId>> {
    let tracks = store.load_tracks()?;
    sample_tracks(&tracks, n, &mut rand::thread_rng())
}
