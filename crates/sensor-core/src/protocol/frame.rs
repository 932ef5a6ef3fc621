//! Sensor frame decoding.
//!
//! The device prints one line per sweep: `N` whitespace-separated decimal
//! integers, each an ADC reading in `0..=MAX`.  A line is either a complete,
//! valid frame or noise (boot banners, calibration chatter, a sweep cut in
//! half by a reset).  [`FrameDecoder::decode`] tells the two apart.
//!
//! # Rejection rules
//!
//! | Condition                             | Error                        |
//! |---------------------------------------|------------------------------|
//! | token count differs from `N`          | [`FrameError::WrongArity`]   |
//! | token is not a decimal integer        | [`FrameError::NotANumber`]   |
//! | value is negative or greater than MAX | [`FrameError::OutOfRange`]   |
//!
//! The arity check runs first, so a short line never reports a per-token
//! error.

use std::num::IntErrorKind;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of channels the reference device reports per frame.
pub const FRAME_WIDTH: usize = 16;

/// Largest value a 10-bit ADC channel can report.
pub const MAX_VALUE: u16 = 1023;

/// Reasons a line is rejected as a frame.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The line did not contain exactly the configured number of values.
    #[error("expected {expected} values, found {found}")]
    WrongArity { expected: usize, found: usize },

    /// A token could not be parsed as an integer (e.g. `"abc"`, `"1.5"`).
    #[error("value {index} is not a number: {token:?}")]
    NotANumber { index: usize, token: String },

    /// A token parsed as an integer but lies outside `0..=max`.
    #[error("value {index} out of range 0..={max}: {token}")]
    OutOfRange {
        index: usize,
        token: String,
        max: u16,
    },
}

/// One decoded, validated reading of every channel.
///
/// Serialises as a bare JSON array (`[10,20,...]`) because the browser tells
/// frames apart from status objects by shape alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorFrame(Vec<u16>);

impl SensorFrame {
    /// Channel values in device order.
    pub fn values(&self) -> &[u16] {
        &self.0
    }

    /// Number of channels in the frame.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Validates text lines against a frame width and value ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDecoder {
    width: usize,
    max: u16,
}

impl FrameDecoder {
    /// Creates a decoder for frames of `width` values in `0..=max`.
    pub fn new(width: usize, max: u16) -> Self {
        Self { width, max }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn max(&self) -> u16 {
        self.max
    }

    /// Decodes one line (without its line terminator) into a frame.
    ///
    /// Leading, trailing and repeated whitespace are tolerated.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] describing the first rule the line breaks.
    ///
    /// # Example
    ///
    /// ```rust
    /// use sensor_core::FrameDecoder;
    ///
    /// let decoder = FrameDecoder::new(3, 1023);
    /// let frame = decoder.decode("1 2 1023").unwrap();
    /// assert_eq!(frame.values(), &[1, 2, 1023]);
    /// assert!(decoder.decode("1 2").is_err());
    /// ```
    pub fn decode(&self, line: &str) -> Result<SensorFrame, FrameError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != self.width {
            return Err(FrameError::WrongArity {
                expected: self.width,
                found: tokens.len(),
            });
        }

        let mut values = Vec::with_capacity(self.width);
        for (index, token) in tokens.into_iter().enumerate() {
            values.push(self.parse_value(index, token)?);
        }
        Ok(SensorFrame(values))
    }

    fn parse_value(&self, index: usize, token: &str) -> Result<u16, FrameError> {
        let out_of_range = || FrameError::OutOfRange {
            index,
            token: token.to_string(),
            max: self.max,
        };

        match token.parse::<i64>() {
            Ok(v) if (0..=i64::from(self.max)).contains(&v) => Ok(v as u16),
            Ok(_) => Err(out_of_range()),
            // Syntactically an integer, just too wide for i64.
            Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
                Err(out_of_range())
            }
            Err(_) => Err(FrameError::NotANumber {
                index,
                token: token.to_string(),
            }),
        }
    }
}

impl Default for FrameDecoder {
    /// 16 channels, 10-bit values.
    fn default() -> Self {
        Self::new(FRAME_WIDTH, MAX_VALUE)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
