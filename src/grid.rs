use rand::seq::SliceRandom;
use rand::Rng;

use crate::color::{Rgb, OVERRIDE_PALETTE};

pub const GRID_WIDTH: usize = 8;
pub const GRID_HEIGHT: usize = 8;
pub const GRID_LEN: usize = GRID_WIDTH * GRID_HEIGHT;

/// One LED of the matrix. A cell is active exactly when it carries an
/// override color, so the two can never disagree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelCell {
    override_color: Option<Rgb>,
}

impl PixelCell {
    pub const INACTIVE: PixelCell = PixelCell {
        override_color: None,
    };

    pub fn active(color: Rgb) -> Self {
        Self {
            override_color: Some(color),
        }
    }

    pub fn is_active(&self) -> bool {
        self.override_color.is_some()
    }

    pub fn override_color(&self) -> Option<Rgb> {
        self.override_color
    }
}

/// Row and column of a row-major index
pub fn row_col(index: usize) -> (usize, usize) {
    (index / GRID_WIDTH, index % GRID_WIDTH)
}

pub fn index_of(row: usize, col: usize) -> usize {
    row * GRID_WIDTH + col
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    cells: [PixelCell; GRID_LEN],
}

impl Default for PixelGrid {
    fn default() -> Self {
        Self {
            cells: [PixelCell::INACTIVE; GRID_LEN],
        }
    }
}

impl PixelGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cells(cells: [PixelCell; GRID_LEN]) -> Self {
        Self { cells }
    }

    pub fn cell(&self, index: usize) -> PixelCell {
        self.cells[index]
    }

    pub fn cells(&self) -> &[PixelCell; GRID_LEN] {
        &self.cells
    }

    pub fn active_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_active()).count()
    }

    /// Paint a cell with a color drawn uniformly from the override palette.
    ///
    /// Inactive cells become active; active cells get a fresh draw, which
    /// may repeat the previous color. Returns the new color.
    ///
    /// # Panics
    ///
    /// If `index` is not below [`GRID_LEN`].
    pub fn click<R: Rng + ?Sized>(&mut self, index: usize, rng: &mut R) -> Rgb {
        assert!(index < GRID_LEN, "pixel index {} out of range", index);
        let color = OVERRIDE_PALETTE
            .choose(rng)
            .copied()
            .unwrap_or(OVERRIDE_PALETTE[0]);
        self.cells[index] = PixelCell::active(color);
        color
    }

    pub fn clear_all(&mut self) {
        self.cells = [PixelCell::INACTIVE; GRID_LEN];
    }
}
