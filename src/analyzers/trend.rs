use crate::channel::Channel;

/// Slope magnitude, in normalized units per hour, beyond which a channel is
/// considered to be trending.
pub const SLOPE_THRESHOLD: f64 = 0.01;

/// Direction of a fitted trend line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

/// Classifies a fitted slope.
///
/// | Slope          | Trend      |
/// |----------------|------------|
/// | > 0.01         | Increasing |
/// | < -0.01        | Decreasing |
/// | otherwise      | Stable     |
pub fn classify(slope: f64) -> Trend {
    match slope {
        s if s > SLOPE_THRESHOLD => Trend::Increasing,
        s if s < -SLOPE_THRESHOLD => Trend::Decreasing,
        _ => Trend::Stable,
    }
}

impl Trend {
    pub fn describe(self, channel: Channel) -> String {
        match self {
            Trend::Increasing => format!("Increasing trend in {channel}"),
            Trend::Decreasing => format!("Decreasing trend in {channel}"),
            Trend::Stable => format!("Stable {channel} trend"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(classify(0.5), Trend::Increasing);
        assert_eq!(classify(0.0101), Trend::Increasing);
        assert_eq!(classify(0.01), Trend::Stable);
        assert_eq!(classify(0.0), Trend::Stable);
        assert_eq!(classify(-0.01), Trend::Stable);
        assert_eq!(classify(-0.0101), Trend::Decreasing);
        assert_eq!(classify(-2.0), Trend::Decreasing);
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            Trend::Increasing.describe(Channel::Pm25),
            "Increasing trend in pm2_5"
        );
        assert_eq!(
            Trend::Decreasing.describe(Channel::NitrogenDioxide),
            "Decreasing trend in nitrogen_dioxide"
        );
        assert_eq!(Trend::Stable.describe(Channel::Pm10), "Stable pm10 trend");
    }
}
