use clap::ValueEnum;
use valhalla_traffic_codec::PredictedSpeedCodecError;
use valhalla_traffic_codec::predicted_speeds::{hourly, valhalla};

/// Which speed profile layout a token or input line uses.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProfileLayout {
    /// 168 hourly buckets, 10 coefficients
    #[default]
    Hourly,
    /// 2016 five-minute buckets, 200 coefficients (native Valhalla tiles)
    Valhalla,
}

impl ProfileLayout {
    pub const fn bucket_count(self) -> usize {
        match self {
            ProfileLayout::Hourly => valhalla_traffic_codec::predicted_speeds::BUCKETS_PER_WEEK,
            ProfileLayout::Valhalla => {
                valhalla_traffic_codec::predicted_speeds::VALHALLA_BUCKETS_PER_WEEK
            }
        }
    }

    /// Checks that a token decodes to exactly this layout's coefficient count.
    pub fn validate_token(self, token: &str) -> Result<(), PredictedSpeedCodecError> {
        match self {
            ProfileLayout::Hourly => hourly().decode(token).map(drop),
            ProfileLayout::Valhalla => valhalla().decode(token).map(drop),
        }
    }
}
