use log::{debug, warn};
use std::fmt;
use std::num::IntErrorKind;
use std::ops::Range;
use thiserror::Error;

/// Errors raised while validating window specifications, flat indices, or pair
/// coordinates. Every variant is a contract violation at the call site; nothing
/// here is retried or clamped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("Invalid window specification (window={window}, step={step}): {reason}.")]
    InvalidSpec {
        window: u64,
        step: u64,
        reason: &'static str,
    },

    #[error("Invalid flat index '{input}': {reason}.")]
    InvalidIndex { input: String, reason: &'static str },

    #[error("Invalid pair coordinate (i={i}, j={j}, period={period}): {reason}.")]
    InvalidCoordinate {
        i: u64,
        j: u64,
        period: u64,
        reason: &'static str,
    },

    #[error("Arithmetic overflow while computing the {0}; value does not fit in 64 bits.")]
    Overflow(&'static str),
}

/// A validated `(window, step)` pair together with the derived block geometry.
///
/// `window` is the number of trailing positions compared against the first
/// position of each sliding block and `step` is the advance between periods.
/// Only rows `i < min(step, window)` are emitted per period; rows at or beyond
/// `step` are owned by a later period where they reappear as `i - step`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowSpec {
    window: u64,
    step: u64,
    rows: u64,
    block: u64,
}

/// Window-relative coordinates of one comparison: `0 <= i < j <= window`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairCoordinate {
    pub i: u64,
    pub j: u64,
    pub period: u64,
}

/// Absolute positions of a comparison along the scanned sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AbsolutePair {
    pub left: u64,
    pub right: u64,
}

impl WindowSpec {
    /// Builds a spec for overlapping or touching windows (`step <= window`).
    pub fn new(window: u64, step: u64) -> Result<Self, WindowError> {
        if window > 0 && step > window {
            return Err(WindowError::InvalidSpec {
                window,
                step,
                reason: "step exceeds window, leaving uncompared gaps between periods; use WindowSpec::with_gaps to opt in",
            });
        }
        Self::build(window, step)
    }

    /// Builds a spec that may leave gaps between windows (`step > window`).
    ///
    /// Positions falling between the end of one window and the start of the
    /// next are never the left member of any comparison.
    pub fn with_gaps(window: u64, step: u64) -> Result<Self, WindowError> {
        let spec = Self::build(window, step)?;
        if spec.is_gapped() {
            warn!(
                "Window spec with step {step} > window {window}: {} positions per period are never compared as the left member",
                step - window
            );
        }
        Ok(spec)
    }

    fn build(window: u64, step: u64) -> Result<Self, WindowError> {
        if window == 0 {
            return Err(WindowError::InvalidSpec {
                window,
                step,
                reason: "window must be at least 1",
            });
        }
        if step == 0 {
            return Err(WindowError::InvalidSpec {
                window,
                step,
                reason: "step must be at least 1",
            });
        }

        let rows = step.min(window);
        let block = u64::try_from(triangular_prefix(window, rows))
            .map_err(|_| WindowError::Overflow("block size"))?;

        debug!("Window spec: window={window}, step={step}, rows per period={rows}, block size={block}");

        Ok(Self {
            window,
            step,
            rows,
            block,
        })
    }

    pub fn window(&self) -> u64 {
        self.window
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    /// Number of rows `i` emitted per period, `min(step, window)`.
    pub fn rows_per_period(&self) -> u64 {
        self.rows
    }

    /// Number of flat indices assigned to each period.
    pub fn block_size(&self) -> u64 {
        self.block
    }

    pub fn is_gapped(&self) -> bool {
        self.step > self.window
    }

    /// Flat offset of the first pair of row `i` inside a block.
    pub fn row_offset(&self, row: u64) -> Result<u64, WindowError> {
        if row >= self.rows {
            return Err(WindowError::InvalidCoordinate {
                i: row,
                j: row.saturating_add(1),
                period: 0,
                reason: "row is not emitted within a period",
            });
        }
        // prefix(row) < block, which already fits in u64.
        Ok(self.prefix(row) as u64)
    }

    /// Number of partners `j` in row `i`.
    pub fn row_len(&self, row: u64) -> u64 {
        self.window.saturating_sub(row)
    }

    /// Maps a flat task counter to the pair it represents.
    pub fn invert(&self, flat: u64) -> PairCoordinate {
        let period = flat / self.block;
        let offset = flat % self.block;

        let i = self.row_of(offset);
        let column = (u128::from(offset) - self.prefix(i)) as u64;

        PairCoordinate {
            i,
            j: i + column + 1,
            period,
        }
    }

    /// Maps a pair back to the flat task counter that `invert` sends to it.
    pub fn pack(&self, coord: PairCoordinate) -> Result<u64, WindowError> {
        self.validate(coord)?;

        let within = self.prefix(coord.i) as u64 + (coord.j - coord.i - 1);
        coord
            .period
            .checked_mul(self.block)
            .and_then(|base| base.checked_add(within))
            .ok_or(WindowError::Overflow("flat index"))
    }

    /// Contiguous range of flat indices owned by `period`.
    pub fn period_range(&self, period: u64) -> Result<Range<u64>, WindowError> {
        let start = period
            .checked_mul(self.block)
            .ok_or(WindowError::Overflow("period start"))?;
        let end = start
            .checked_add(self.block)
            .ok_or(WindowError::Overflow("period end"))?;
        Ok(start..end)
    }

    /// Every pair of one period, in the same row-major order as `invert`.
    pub fn block_pairs(&self, period: u64) -> impl Iterator<Item = PairCoordinate> + use<> {
        let window = self.window;
        (0..self.rows).flat_map(move |i| {
            (i + 1..=window).map(move |j| PairCoordinate { i, j, period })
        })
    }

    fn validate(&self, coord: PairCoordinate) -> Result<(), WindowError> {
        let reason = if coord.i >= coord.j {
            "i must be strictly less than j"
        } else if coord.j > self.window {
            "j lies beyond the window"
        } else if coord.i >= self.rows {
            "i is deferred to a later period and never emitted here"
        } else {
            return Ok(());
        };

        Err(WindowError::InvalidCoordinate {
            i: coord.i,
            j: coord.j,
            period: coord.period,
            reason,
        })
    }

    fn prefix(&self, row: u64) -> u128 {
        triangular_prefix(self.window, row)
    }

    // Largest row whose prefix does not exceed `offset`.
    fn row_of(&self, offset: u64) -> u64 {
        let offset = u128::from(offset);
        let Some(guess) = self.quadratic_row(offset) else {
            return self.search_row(offset);
        };

        let mut row = guess.min(self.rows - 1);
        while self.prefix(row) > offset {
            row -= 1;
        }
        while row + 1 < self.rows && self.prefix(row + 1) <= offset {
            row += 1;
        }
        row
    }

    // Lower root of x^2 - (2w + 1)x + 2r = 0, from an exact integer square root.
    // None when (2w + 1)^2 does not fit in u128.
    fn quadratic_row(&self, offset: u128) -> Option<u64> {
        let b = 2 * u128::from(self.window) + 1;
        let discriminant = b.checked_mul(b)? - 8 * offset;
        let root = discriminant.isqrt();
        u64::try_from((b - root) / 2).ok()
    }

    fn search_row(&self, offset: u128) -> u64 {
        let (mut lo, mut hi) = (0u64, self.rows);
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if self.prefix(mid) <= offset {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        lo
    }
}

impl fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window={} step={}", self.window, self.step)
    }
}

impl PairCoordinate {
    /// Translates relative offsets to positions `period*step + i` and `period*step + j`.
    pub fn absolute(&self, spec: &WindowSpec) -> Result<AbsolutePair, WindowError> {
        let start = self
            .period
            .checked_mul(spec.step())
            .ok_or(WindowError::Overflow("period start position"))?;
        let left = start
            .checked_add(self.i)
            .ok_or(WindowError::Overflow("left position"))?;
        let right = start
            .checked_add(self.j)
            .ok_or(WindowError::Overflow("right position"))?;
        Ok(AbsolutePair { left, right })
    }
}

impl fmt::Display for PairCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}) @ period {}", self.i, self.j, self.period)
    }
}

/// `sum_{k < row} (window - k)`, i.e. `row*window - row*(row-1)/2`.
fn triangular_prefix(window: u64, row: u64) -> u128 {
    if row == 0 {
        return 0;
    }
    let row = u128::from(row);
    row * u128::from(window) - row * (row - 1) / 2
}

/// Inverts `flat` under `(window, step)`, returning `(i, j, period)`.
pub fn invert_index(flat: u64, window: u64, step: u64) -> Result<(u64, u64, u64), WindowError> {
    let coord = WindowSpec::new(window, step)?.invert(flat);
    Ok((coord.i, coord.j, coord.period))
}

/// Packs `(i, j, period)` under `(window, step)` into its flat index.
pub fn pack_index(i: u64, j: u64, period: u64, window: u64, step: u64) -> Result<u64, WindowError> {
    WindowSpec::new(window, step)?.pack(PairCoordinate { i, j, period })
}

/// Parses a flat index from text, rejecting negative and non-integer input.
pub fn parse_flat_index(text: &str) -> Result<u64, WindowError> {
    let trimmed = text.trim();
    trimmed.parse::<u64>().or_else(|err| {
        let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
        let is_integer = !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit());
        let is_negative = is_integer && trimmed.starts_with('-');
        if is_negative && digits.bytes().all(|b| b == b'0') {
            return Ok(0);
        }
        let reason = match err.kind() {
            IntErrorKind::PosOverflow => return Err(WindowError::Overflow("flat index")),
            IntErrorKind::Empty => "input is empty",
            _ if is_negative => "flat indices must be non-negative",
            _ => "not an integer",
        };
        Err(WindowError::InvalidIndex {
            input: trimmed.to_string(),
            reason,
        })
    })
}
