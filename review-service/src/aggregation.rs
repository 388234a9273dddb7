use center_service::RatingSummary;

/// Mean and count of a center's ratings; no ratings gives a zero rating
#[must_use]
pub fn summarize(ratings: &[i16]) -> RatingSummary {
    if ratings.is_empty() {
        return RatingSummary::EMPTY;
    }
    let sum: f64 = ratings.iter().map(|r| f64::from(*r)).sum();
    let count = i64::try_from(ratings.len()).unwrap_or(i64::MAX);
    #[allow(clippy::cast_precision_loss)]
    let mean = sum / ratings.len() as f64;
    RatingSummary {
        rating: mean,
        total_reviews: count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_resets_to_zero() {
        assert_eq!(summarize(&[]), RatingSummary::EMPTY);
    }

    #[test]
    fn test_mean_and_count() {
        let summary = summarize(&[4, 2]);
        assert!((summary.rating - 3.0).abs() < f64::EPSILON);
        assert_eq!(summary.total_reviews, 2);

        let summary = summarize(&[5, 4, 4]);
        assert!((summary.rating - 13.0 / 3.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_rating_stays_in_scale(ratings in prop::collection::vec(1i16..=5, 1..200)) {
            let summary = summarize(&ratings);
            prop_assert!(summary.rating >= 1.0 && summary.rating <= 5.0);
            prop_assert_eq!(summary.total_reviews, ratings.len() as i64);
        }

        #[test]
        fn prop_order_does_not_matter(mut ratings in prop::collection::vec(1i16..=5, 0..50)) {
            let forward = summarize(&ratings);
            ratings.reverse();
            let backward = summarize(&ratings);
            prop_assert!((forward.rating - backward.rating).abs() < 1e-9);
            prop_assert_eq!(forward.total_reviews, backward.total_reviews);
        }
    }
}
