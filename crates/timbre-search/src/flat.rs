use timbre_core::{squared_l2, Embedding, Error, Result};

/// One search hit: a row position in the index and its distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    /// Squared Euclidean distance to the query.
    pub distance: f32,
}

/// Exhaustive nearest-neighbor index over equal-length vectors.
///
/// Rows are kept contiguously in insertion order, so row `i` is the `i`-th
/// vector added. Search cost is linear in the number of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidInput("index dimension must be positive".to_string()));
        }
        Ok(Self {
            dim,
            data: Vec::new(),
        })
    }

    /// Rebuild from contiguous row-major storage.
    pub fn from_raw(dim: usize, data: Vec<f32>) -> Result<Self> {
        if dim == 0 || data.len() % dim != 0 {
            return Err(Error::InvalidInput(format!(
                "{} values do not form rows of width {dim}",
                data.len()
            )));
        }
        Ok(Self { dim, data })
    }

    /// Build from embeddings in order. All embeddings must share one length.
    pub fn from_embeddings(embeddings: &[Embedding]) -> Result<Self> {
        let first = embeddings.first().ok_or(Error::EmptyBuild)?;
        let mut index = Self::new(first.dim())?;
        index.data.reserve(embeddings.len() * first.dim());
        for embedding in embeddings {
            index.add(embedding.as_slice())?;
        }
        Ok(index)
    }

    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
                context: format!("row {}", self.len()),
            });
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_raw(&self) -> &[f32] {
        &self.data
    }

    pub fn row(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dim)?;
        let end = start.checked_add(self.dim)?;
        self.data.get(start..end)
    }

    /// The `k` nearest rows to `query`, closest first.
    ///
    /// Returns `min(k, len)` results; never pads. Equal distances are
    /// ordered by row position.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
                context: "query".to_string(),
            });
        }

        let mut hits: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(position, row)| Neighbor {
                position,
                distance: squared_l2(query, row),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        });
        hits.truncate(k);
        Ok(hits)
    }
}
