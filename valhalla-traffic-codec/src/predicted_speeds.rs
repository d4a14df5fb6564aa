//! # Predicted (Historical) Traffic
//!
//! Helpers for working with predicted speeds.
//! A week of average speeds is broken up into equal-sized buckets.
//! That's a lot of data per edge, so it's stored in a compressed form
//! by keeping only the first few coefficients of its DCT-II.
//! When routing, single buckets are recovered using the inverse operation (DCT-III).
//!
//! The codec is generic over the layout.
//! [`HourlyProfileCodec`] (168 hourly buckets, 10 coefficients, 20 byte tokens)
//! is what our traffic pipeline produces.
//! [`ValhallaProfileCodec`] (2016 five-minute buckets, 200 coefficients)
//! is the native layout of Valhalla's graph tiles.
//!
//! NOTE: The term "predicted speed" is preserved from Valhalla.
//! However, it's perhaps more accurate to understand it as historical average speeds,
//! which are useful for prediction as long as there isn't a special event,
//! temporary lane closure, etc.
use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

const SECONDS_PER_WEEK: u32 = 7 * 24 * 60 * 60;

/// The number of buckets in an hourly profile.
pub const BUCKETS_PER_WEEK: usize = 7 * 24;

/// The number of coefficients kept for an hourly profile.
pub const COEFFICIENT_COUNT: usize = 10;

/// The number of buckets in a Valhalla tile profile (5 minute buckets).
pub const VALHALLA_BUCKETS_PER_WEEK: usize = 7 * 24 * 12;

/// The number of coefficients Valhalla stores per edge.
pub const VALHALLA_COEFFICIENT_COUNT: usize = 200;

pub type HourlyProfileCodec = SpeedProfileCodec<BUCKETS_PER_WEEK, COEFFICIENT_COUNT>;
pub type ValhallaProfileCodec =
    SpeedProfileCodec<VALHALLA_BUCKETS_PER_WEEK, VALHALLA_COEFFICIENT_COUNT>;

static HOURLY: LazyLock<HourlyProfileCodec> = LazyLock::new(HourlyProfileCodec::new);
static VALHALLA: LazyLock<ValhallaProfileCodec> = LazyLock::new(ValhallaProfileCodec::new);

/// The shared hourly codec. The cosine table is built on first use.
pub fn hourly() -> &'static HourlyProfileCodec {
    &HOURLY
}

/// The shared Valhalla-layout codec. The cosine table is built on first use.
pub fn valhalla() -> &'static ValhallaProfileCodec {
    &VALHALLA
}

#[derive(Debug, Error, PartialEq)]
pub enum PredictedSpeedCodecError {
    #[error("Base64 decoding error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
    #[error("Incorrect number of bytes decoded: found {actual}; expected {expected}")]
    IncorrectByteCount { expected: usize, actual: usize },
    #[error("Coefficient {index} ({value}) does not fit in 16 bits")]
    CoefficientOverflow { index: usize, value: f32 },
    #[error("Bucket {bucket} is out of range for a profile with {buckets} buckets")]
    BucketOutOfRange { bucket: usize, buckets: usize },
}

/// A DCT codec for weekly speed profiles of `BUCKETS` buckets,
/// keeping `COEFFICIENTS` coefficients.
///
/// Owns its cosine lookup table, which is immutable once built,
/// so a codec can be shared freely across threads.
/// Use [`hourly`] or [`valhalla`] rather than building your own
/// unless you need a custom layout.
pub struct SpeedProfileCodec<const BUCKETS: usize, const COEFFICIENTS: usize> {
    /// Cosine table, pre-scaled by the normalization factor
    /// (and by 1/sqrt(2) in the DC column).
    cos_table: Box<[[f32; COEFFICIENTS]]>,
}

impl<const BUCKETS: usize, const COEFFICIENTS: usize> SpeedProfileCodec<BUCKETS, COEFFICIENTS> {
    /// The width of each bucket, rounded down when `BUCKETS` doesn't divide a week.
    #[allow(clippy::cast_possible_truncation)]
    pub const BUCKET_SIZE_SECONDS: u32 = SECONDS_PER_WEEK / BUCKETS as u32;

    /// Size (bytes) of the decoded wire form.
    /// Each value (`i16`) is encoded as 2 bytes in big-endian order.
    pub const DECODED_SPEED_SIZE: usize = 2 * COEFFICIENTS;

    /// Builds the codec and its cosine table.
    ///
    /// The basis is `cos(π / BUCKETS · (bucket + 0.5) · c)`,
    /// normalized by `sqrt(2 / BUCKETS)`.
    /// For the Valhalla layout those work out to `π / 2016` and `0.031497039`.
    pub fn new() -> Self {
        const {
            assert!(BUCKETS > 0 && BUCKETS < (1 << 24));
            assert!(COEFFICIENTS > 0 && COEFFICIENTS <= BUCKETS);
        }

        #[allow(
            clippy::cast_precision_loss,
            reason = "BUCKETS is always <= 23 bits"
        )]
        let pi_bucket_const = std::f32::consts::PI / BUCKETS as f32;
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            reason = "BUCKETS is always <= 23 bits"
        )]
        let speed_norm = (2.0 / BUCKETS as f64).sqrt() as f32;

        let mut rows: Vec<[f32; COEFFICIENTS]> = vec![[0.0; COEFFICIENTS]; BUCKETS];
        for (bucket, row) in rows.iter_mut().enumerate() {
            #[allow(
                clippy::cast_precision_loss,
                reason = "BUCKETS is always <= 23 bits"
            )]
            let bucket_center = (bucket as f32) + 0.5;

            // c == 0 column (DC) with extra 1/sqrt(2)
            row[0] = (pi_bucket_const * bucket_center * 0.0f32).cos()
                * speed_norm
                * std::f32::consts::FRAC_1_SQRT_2;

            for (c, value) in row.iter_mut().enumerate().skip(1) {
                #[allow(
                    clippy::cast_precision_loss,
                    reason = "COEFFICIENTS is always <= 23 bits"
                )]
                let v = (pi_bucket_const * bucket_center * c as f32).cos() * speed_norm;
                *value = v;
            }
        }

        Self {
            cos_table: rows.into_boxed_slice(),
        }
    }

    /// Compress a full week of speed buckets by truncating its DCT-II.
    ///
    /// Speeds are expected to be specified in kilometers per hour.
    /// Plausibility of the speeds is the caller's business;
    /// the transform accepts any finite input.
    ///
    /// # Errors
    ///
    /// Fails if a rounded coefficient does not fit in an `i16`.
    pub fn compress(
        &self,
        speeds: &[f32; BUCKETS],
    ) -> Result<[i16; COEFFICIENTS], PredictedSpeedCodecError> {
        let mut acc = [0f32; COEFFICIENTS];

        // DCT-II accumulation (bucket-major) using the precomputed, scaled cosines.
        for (row, &speed) in self.cos_table.iter().zip(speeds.iter()) {
            for (a, &basis) in acc.iter_mut().zip(row.iter()) {
                *a += speed * basis;
            }
        }

        let mut result = [0i16; COEFFICIENTS];
        for (index, (out, coeff)) in result.iter_mut().zip(acc).enumerate() {
            *out = quantize(index, coeff)?;
        }
        Ok(result)
    }

    /// Recover a single bucket's speed from the compressed coefficients.
    ///
    /// Returns a speed in kilometers per hour.
    ///
    /// # Errors
    ///
    /// `bucket` must be in `[0, BUCKETS)`.
    #[inline]
    pub fn decompress_bucket(
        &self,
        coefficients: &[i16; COEFFICIENTS],
        bucket: usize,
    ) -> Result<f32, PredictedSpeedCodecError> {
        let row = self
            .cos_table
            .get(bucket)
            .ok_or(PredictedSpeedCodecError::BucketOutOfRange {
                bucket,
                buckets: BUCKETS,
            })?;
        Ok(reconstruct(row, coefficients))
    }

    /// Recover the speed at a time of week.
    ///
    /// The time `seconds_from_start_of_week` is measured from midnight Sunday local time.
    ///
    /// # Errors
    ///
    /// Fails for times past the end of the week.
    pub fn speed_at(
        &self,
        coefficients: &[i16; COEFFICIENTS],
        seconds_from_start_of_week: u32,
    ) -> Result<f32, PredictedSpeedCodecError> {
        #[allow(clippy::cast_possible_truncation)]
        let bucket = (u64::from(seconds_from_start_of_week) * BUCKETS as u64
            / u64::from(SECONDS_PER_WEEK)) as usize;
        self.decompress_bucket(coefficients, bucket)
    }

    /// Recover every bucket of the week.
    pub fn decompress(&self, coefficients: &[i16; COEFFICIENTS]) -> Vec<f32> {
        self.cos_table
            .iter()
            .map(|row| reconstruct(row, coefficients))
            .collect()
    }

    /// Pack transformed speed values into a base64 string.
    pub fn encode(&self, coefficients: &[i16; COEFFICIENTS]) -> String {
        encode_coefficients(coefficients)
    }

    /// Decode a base64 string into the coefficients.
    ///
    /// # Errors
    ///
    /// Fails on malformed base64, or if the decoded length isn't [`Self::DECODED_SPEED_SIZE`].
    pub fn decode(&self, encoded: &str) -> Result<[i16; COEFFICIENTS], PredictedSpeedCodecError> {
        decode_coefficients(encoded)
    }
}

impl<const BUCKETS: usize, const COEFFICIENTS: usize> Default
    for SpeedProfileCodec<BUCKETS, COEFFICIENTS>
{
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn quantize(index: usize, coeff: f32) -> Result<i16, PredictedSpeedCodecError> {
    let rounded = coeff.round();
    if (f32::from(i16::MIN)..=f32::from(i16::MAX)).contains(&rounded) {
        Ok(rounded as i16)
    } else {
        Err(PredictedSpeedCodecError::CoefficientOverflow {
            index,
            value: coeff,
        })
    }
}

/// DCT-III at one bucket, using a normalized cosine row.
#[inline]
fn reconstruct<const COEFFICIENTS: usize>(
    row: &[f32; COEFFICIENTS],
    coefficients: &[i16; COEFFICIENTS],
) -> f32 {
    // Regrettably, the manual messy indexed loop is the only way to get this code to auto-vectorize
    // at the time of this writing.
    let mut s = 0.0f32;
    for i in 0..COEFFICIENTS {
        s = row[i].mul_add(f32::from(coefficients[i]), s);
    }
    s
}

/// Pack coefficients into a base64 string.
/// Each i16 is serialized big-endian to match Valhalla.
pub fn encode_coefficients<const COEFFICIENTS: usize>(coefficients: &[i16; COEFFICIENTS]) -> String {
    let raw: Vec<u8> = coefficients.iter().flat_map(|c| c.to_be_bytes()).collect();
    STANDARD.encode(raw)
}

/// Decode a base64 string into exactly `COEFFICIENTS` big-endian i16 coefficients.
///
/// # Errors
///
/// Fails on malformed base64, or if the decoded byte length != `2 * COEFFICIENTS`.
/// Short or long payloads are never padded or truncated.
pub fn decode_coefficients<const COEFFICIENTS: usize>(
    encoded: &str,
) -> Result<[i16; COEFFICIENTS], PredictedSpeedCodecError> {
    let raw = STANDARD.decode(encoded.as_bytes())?;
    if raw.len() != 2 * COEFFICIENTS {
        return Err(PredictedSpeedCodecError::IncorrectByteCount {
            expected: 2 * COEFFICIENTS,
            actual: raw.len(),
        });
    }
    let mut out = [0i16; COEFFICIENTS];
    for (value, chunk) in out.iter_mut().zip(raw.chunks_exact(2)) {
        *value = i16::from_be_bytes([chunk[0], chunk[1]]);
    }
    Ok(out)
}

/// Compress an hourly week of speeds with the shared codec.
///
/// # Errors
///
/// See [`SpeedProfileCodec::compress`].
pub fn compress_speed_buckets(
    speeds: &[f32; BUCKETS_PER_WEEK],
) -> Result<[i16; COEFFICIENT_COUNT], PredictedSpeedCodecError> {
    hourly().compress(speeds)
}

/// Recover one hourly bucket with the shared codec.
///
/// # Errors
///
/// See [`SpeedProfileCodec::decompress_bucket`].
pub fn decompress_speed_bucket(
    coefficients: &[i16; COEFFICIENT_COUNT],
    bucket: usize,
) -> Result<f32, PredictedSpeedCodecError> {
    hourly().decompress_bucket(coefficients, bucket)
}

/// Encode an hourly coefficient set to its 20 byte token.
pub fn encode_compressed_speeds(coefficients: &[i16; COEFFICIENT_COUNT]) -> String {
    encode_coefficients(coefficients)
}

/// Decode an hourly token.
///
/// # Errors
///
/// See [`decode_coefficients`].
pub fn decode_compressed_speeds(
    encoded: &str,
) -> Result<[i16; COEFFICIENT_COUNT], PredictedSpeedCodecError> {
    decode_coefficients(encoded)
}

/// A compressed speed profile, displayed and parsed as its base64 token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressedSpeeds<const COEFFICIENTS: usize>(pub [i16; COEFFICIENTS]);

/// The compressed form of an hourly profile.
pub type HourlyCompressedSpeeds = CompressedSpeeds<COEFFICIENT_COUNT>;

impl<const COEFFICIENTS: usize> CompressedSpeeds<COEFFICIENTS> {
    pub const fn coefficients(&self) -> &[i16; COEFFICIENTS] {
        &self.0
    }
}

impl<const COEFFICIENTS: usize> Display for CompressedSpeeds<COEFFICIENTS> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&encode_coefficients(&self.0))
    }
}

impl<const COEFFICIENTS: usize> FromStr for CompressedSpeeds<COEFFICIENTS> {
    type Err = PredictedSpeedCodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_coefficients(s.trim()).map(Self)
    }
}
