//! Kelly-criterion position sizing

/// Half-Kelly fraction of capital, capped at 25%
///
/// `f* = (p*b - (1-p)) / b` with `b = avg_win / avg_loss`; the returned
/// fraction is `clamp(0.5 * f*, 0, 0.25)`. Zero when `avg_loss` is not
/// positive.
pub fn kelly_fraction(win_probability: f64, avg_win: f64, avg_loss: f64) -> f64 {
    if avg_loss <= 0.0 {
        return 0.0;
    }
    let b = avg_win / avg_loss;
    let kelly = (win_probability * b - (1.0 - win_probability)) / b;
    (kelly * 0.5).clamp(0.0, 0.25)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn favorable_edge_sizes_half_kelly() {
        // p=0.6, b=2: f* = (1.2 - 0.4)/2 = 0.4, half = 0.2
        assert_relative_eq!(kelly_fraction(0.6, 2.0, 1.0), 0.2);
    }

    #[test]
    fn cap_at_quarter_of_capital() {
        // Huge edge clamps to 0.25
        assert_relative_eq!(kelly_fraction(0.9, 10.0, 1.0), 0.25);
    }

    #[rstest]
    #[case(0.3, 1.0, 1.0)] // negative edge
    #[case(0.5, 1.0, 1.0)] // zero edge
    fn no_edge_sizes_zero(#[case] p: f64, #[case] win: f64, #[case] loss: f64) {
        assert_relative_eq!(kelly_fraction(p, win, loss), 0.0);
    }

    #[test]
    fn degenerate_loss_is_zero() {
        assert_eq!(kelly_fraction(0.9, 2.0, 0.0), 0.0);
        assert_eq!(kelly_fraction(0.9, 2.0, -1.0), 0.0);
    }
}
