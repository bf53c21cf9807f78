use crate::image_pipeline::common::error::Result;

/// One resolution stored in a pyramid source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelInfo {
    pub width: u64,
    pub height: u64,
    /// Resolution relative to level 0, rounded to an integer
    pub downsample: u32,
}

pub trait PyramidSource: Send + Sync {
    /// Stored levels, full resolution first
    fn levels(&self) -> &[LevelInfo];

    /// Width and height of the full resolution level
    fn dimensions(&self) -> (u64, u64) {
        self.levels()
            .first()
            .map(|level| (level.width, level.height))
            .unwrap_or((0, 0))
    }

    /// Reads interleaved RGB8 pixels of a rectangle of `level`.
    ///
    /// Pixels falling outside the level are white.
    fn read_region(&self, level: usize, x: u64, y: u64, width: u32, height: u32) -> Result<Vec<u8>>;

    /// Physical width and height of the full resolution level in millimeters
    fn physical_size_mm(&self) -> Option<(f64, f64)>;
}
