//! Measurement quality and state flags.
//!
//! Every sample carries a 32-bit [`MeasurementStateFlags`] word describing
//! the quality of its value and timestamp plus alarm and bookkeeping state.
//! The bit layout matches the upstream wire format, so flag words pass
//! through the pipeline untranslated.
//!
//! Only two bits participate in downsampling decisions: [`BAD_DATA`]
//! (value quality) and [`BAD_TIME`](MeasurementStateFlags::BAD_TIME)
//! (timestamp quality). The remaining bits are carried for consumers
//! downstream of the concentrator.
//!
//! Combining quality is infectious: deriving a flag word from several
//! sources ORs their badness together, so one bad input marks the result
//! bad and a good input never clears anything.
//!
//! [`BAD_DATA`]: MeasurementStateFlags::BAD_DATA

use bitflags::bitflags;

use crate::measurement::Measurement;

bitflags! {
    /// State and quality flags attached to every measurement.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MeasurementStateFlags: u32 {
        /// Value quality is bad.
        const BAD_DATA = 1 << 0;
        /// Value quality is suspect.
        const SUSPECT_DATA = 1 << 1;
        /// Value is over its measurable range.
        const OVER_RANGE = 1 << 2;
        /// Value is under its measurable range.
        const UNDER_RANGE = 1 << 3;
        /// Value exceeds its high alarm limit.
        const ALARM_HIGH = 1 << 4;
        /// Value is below its low alarm limit.
        const ALARM_LOW = 1 << 5;
        /// Value exceeds its high warning limit.
        const WARNING_HIGH = 1 << 6;
        /// Value is below its low warning limit.
        const WARNING_LOW = 1 << 7;
        /// Value has not changed across the flat-line window.
        const FLATLINE_ALARM = 1 << 8;
        /// Value failed a comparison check against a companion signal.
        const COMPARISON_ALARM = 1 << 9;
        /// Value failed a rate-of-change check.
        const ROC_ALARM = 1 << 10;
        /// Source reported the value as bad on arrival.
        const RECEIVED_AS_BAD = 1 << 11;
        /// Value was calculated rather than measured.
        const CALCULATED_VALUE = 1 << 12;
        /// A calculation producing this value failed.
        const CALCULATION_ERROR = 1 << 13;
        /// A calculation producing this value raised a warning.
        const CALCULATION_WARNING = 1 << 14;
        /// Reserved value-quality bit.
        const RESERVED_QUALITY = 1 << 15;
        /// Timestamp quality is bad.
        const BAD_TIME = 1 << 16;
        /// Timestamp quality is suspect.
        const SUSPECT_TIME = 1 << 17;
        /// Timestamp arrived later than the configured tolerance.
        const LATE_TIME_ALARM = 1 << 18;
        /// Timestamp is ahead of the configured tolerance.
        const FUTURE_TIME_ALARM = 1 << 19;
        /// Value was up-sampled to fill a frame.
        const UP_SAMPLED = 1 << 20;
        /// Value was down-sampled from multiple source samples.
        const DOWN_SAMPLED = 1 << 21;
        /// Reserved time-quality bit.
        const RESERVED_TIME = 1 << 22;
        /// Application-defined flag 1.
        const USER_DEFINED1 = 1 << 23;
        /// Application-defined flag 2.
        const USER_DEFINED2 = 1 << 24;
        /// Application-defined flag 3.
        const USER_DEFINED3 = 1 << 25;
        /// Application-defined flag 4.
        const USER_DEFINED4 = 1 << 26;
        /// Application-defined flag 5.
        const USER_DEFINED5 = 1 << 27;
        /// A system error occurred while handling this measurement.
        const SYSTEM_ERROR = 1 << 28;
        /// A system warning occurred while handling this measurement.
        const SYSTEM_WARNING = 1 << 29;
        /// The measurement itself is in an error state.
        const MEASUREMENT_ERROR = 1 << 30;
        /// The measurement was discarded by the pipeline.
        const DISCARDED_VALUE = 1 << 31;
    }
}

impl MeasurementStateFlags {
    /// No abnormal state: good value, good time, no alarms.
    pub const NORMAL: Self = Self::empty();

    /// Derives flags from a single value/timestamp quality pair.
    ///
    /// A `false` value quality sets [`BAD_DATA`](Self::BAD_DATA); a `false`
    /// timestamp quality sets [`BAD_TIME`](Self::BAD_TIME).
    pub fn from_quality(value_quality_is_good: bool, timestamp_quality_is_good: bool) -> Self {
        let mut flags = Self::NORMAL;
        if !value_quality_is_good {
            flags |= Self::BAD_DATA;
        }
        if !timestamp_quality_is_good {
            flags |= Self::BAD_TIME;
        }
        flags
    }

    /// Derives flags from per-source quality vectors.
    ///
    /// One `false` element marks the corresponding dimension bad. Empty
    /// slices contribute nothing, yielding [`NORMAL`](Self::NORMAL) when
    /// both are empty.
    pub fn from_qualities(value_qualities: &[bool], timestamp_qualities: &[bool]) -> Self {
        let value_good = value_qualities.iter().all(|&good| good);
        let timestamp_good = timestamp_qualities.iter().all(|&good| good);
        Self::from_quality(value_good, timestamp_good)
    }

    /// Derives flags from the quality of a set of measurements.
    ///
    /// Each measurement contributes its value and timestamp quality; one
    /// bad input in either dimension marks the combined result bad.
    pub fn combining<'a, I>(measurements: I) -> Self
    where
        I: IntoIterator<Item = &'a Measurement>,
    {
        let mut value_good = true;
        let mut timestamp_good = true;
        for measurement in measurements {
            value_good &= measurement.value_quality_is_good();
            timestamp_good &= measurement.timestamp_quality_is_good();
        }
        Self::from_quality(value_good, timestamp_good)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MeasurementMetadata;
    use crate::ticks::Ticks;

    fn flagged(flags: MeasurementStateFlags) -> Measurement {
        Measurement::with_flags(MeasurementMetadata::undefined(), f64::NAN, Ticks::ZERO, flags)
    }

    #[test]
    fn good_qualities_yield_normal() {
        assert_eq!(
            MeasurementStateFlags::from_quality(true, true),
            MeasurementStateFlags::NORMAL
        );
    }

    #[test]
    fn bad_value_quality_sets_bad_data_only() {
        let flags = MeasurementStateFlags::from_quality(false, true);
        assert_eq!(flags, MeasurementStateFlags::BAD_DATA);
        assert!(!flags.contains(MeasurementStateFlags::BAD_TIME));
    }

    #[test]
    fn bad_time_quality_sets_bad_time_only() {
        let flags = MeasurementStateFlags::from_quality(true, false);
        assert_eq!(flags, MeasurementStateFlags::BAD_TIME);
        assert!(!flags.contains(MeasurementStateFlags::BAD_DATA));
    }

    #[test]
    fn both_bad_qualities_set_both_bits() {
        let flags = MeasurementStateFlags::from_quality(false, false);
        assert!(flags.contains(MeasurementStateFlags::BAD_DATA | MeasurementStateFlags::BAD_TIME));
    }

    #[test]
    fn one_bad_element_marks_the_vector_bad() {
        let flags = MeasurementStateFlags::from_qualities(&[true, false, true], &[true, true]);
        assert_eq!(flags, MeasurementStateFlags::BAD_DATA);
    }

    #[test]
    fn empty_quality_vectors_are_normal() {
        assert_eq!(
            MeasurementStateFlags::from_qualities(&[], &[]),
            MeasurementStateFlags::NORMAL
        );
    }

    #[test]
    fn combining_ors_badness_across_measurements() {
        let good = Measurement::default();
        let bad_value = flagged(MeasurementStateFlags::BAD_DATA);
        let bad_time = flagged(MeasurementStateFlags::BAD_TIME);

        let combined = MeasurementStateFlags::combining([&good, &bad_value, &bad_time]);
        assert!(combined.contains(MeasurementStateFlags::BAD_DATA));
        assert!(combined.contains(MeasurementStateFlags::BAD_TIME));
    }

    #[test]
    fn combining_good_measurements_stays_normal() {
        let samples = vec![Measurement::default(), Measurement::default()];
        assert_eq!(
            MeasurementStateFlags::combining(&samples),
            MeasurementStateFlags::NORMAL
        );
    }
}
