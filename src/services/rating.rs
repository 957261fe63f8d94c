/// Mean of the given review ratings, `None` when there are no reviews.
pub fn average_rating(ratings: &[i16]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let sum: i64 = ratings.iter().map(|&r| i64::from(r)).sum();
    Some(sum as f64 / ratings.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_reviews_means_no_rating() {
        assert_eq!(average_rating(&[]), None);
    }

    #[test]
    fn mean_of_ratings() {
        assert_eq!(average_rating(&[3, 5]), Some(4.0));
        assert_eq!(average_rating(&[5]), Some(5.0));
        assert_eq!(average_rating(&[1, 2, 2]), Some(5.0 / 3.0));
    }
}
