use crate::error::EngineError;
use crate::models::{EngineState, KLine, RsiPoint};
use rust_decimal::{Decimal, RoundingStrategy};

/// Fractional digits kept after every division
pub const CALCULATION_SCALE: u32 = 10;

const ONE_HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Which path the engine took for a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsiOutcome {
    /// Not enough klines; nothing computed, state untouched
    InsufficientData,
    /// Averages bootstrapped from the seed window
    Seeded,
    /// Continued from prior state
    Resumed,
    /// Prior state already covers the last kline
    UpToDate,
}

/// Result of one `compute` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsiComputation {
    pub points: Vec<RsiPoint>,
    /// State to hand to the next call (the prior state when nothing ran)
    pub state: Option<EngineState>,
    pub outcome: RsiOutcome,
}

impl RsiComputation {
    fn unchanged(prior: Option<&EngineState>, outcome: RsiOutcome) -> Self {
        Self {
            points: Vec::new(),
            state: prior.copied(),
            outcome,
        }
    }
}

/// Calculate RSI incrementally with Wilder's smoothing
///
/// Seeds the averages from the first `period` close-to-close changes when
/// `reset_requested` is set or `prior` is missing or was seeded with another
/// period; otherwise resumes after the bar stamped `prior.last_timestamp`.
/// Every division is rounded half-up to [`CALCULATION_SCALE`] digits so the
/// same input always yields the same output.
///
/// # Arguments
/// * `klines` - Full available history, oldest first
/// * `period` - Lookback period (>= 1)
/// * `reset_requested` - Discard `prior` and reseed
/// * `prior` - State returned by the previous call for this series
///
/// # Returns
/// New points (possibly empty) plus the state for the next call
pub fn compute(
    klines: &[KLine],
    period: usize,
    reset_requested: bool,
    prior: Option<&EngineState>,
) -> Result<RsiComputation, EngineError> {
    if period == 0 {
        return Err(EngineError::InvalidPeriod(period));
    }

    if klines.len() < period {
        return Ok(RsiComputation::unchanged(prior, RsiOutcome::InsufficientData));
    }

    let resumable = match prior {
        Some(state) if !reset_requested && state.is_valid_for(period) => Some(state),
        Some(state) if !reset_requested => {
            tracing::debug!(
                "Stored RSI state (period {}) not usable for period {}, reseeding",
                state.period,
                period
            );
            None
        }
        _ => None,
    };

    let resumed = match resumable {
        Some(state) => match resume_index(klines, state) {
            Resume::UpToDate => {
                return Ok(RsiComputation::unchanged(prior, RsiOutcome::UpToDate));
            }
            Resume::At(index) => Some((index, state.avg_gain, state.avg_loss)),
            Resume::AnchorLost => {
                tracing::warn!(
                    "Last processed bar {} not found in buffer, reseeding RSI",
                    state.last_timestamp
                );
                None
            }
        },
        None => None,
    };

    let (start, avg_gain, avg_loss, outcome) = match resumed {
        Some((index, gain, loss)) => (index, gain, loss, RsiOutcome::Resumed),
        None => {
            // Seed window needs `period` changes, i.e. one bar more than the period
            if klines.len() <= period {
                return Ok(RsiComputation::unchanged(prior, RsiOutcome::InsufficientData));
            }
            let (gain, loss) = seed_averages(klines, period);
            tracing::debug!(
                "Seeded RSI({}) from {} bars: avg_gain={}, avg_loss={}",
                period,
                klines.len(),
                gain,
                loss
            );
            (period, gain, loss, RsiOutcome::Seeded)
        }
    };

    let mut smoother = WilderSmoother::new(period, avg_gain, avg_loss);
    let points: Vec<RsiPoint> = klines[start..]
        .iter()
        .zip(&klines[start - 1..])
        .map(|(current, previous)| RsiPoint {
            timestamp: current.timestamp,
            value: smoother.next(current.close.saturating_sub(previous.close)),
        })
        .collect();

    // Non-empty here: every path that reaches the loop has at least `start + 1` bars
    let last_timestamp = klines[klines.len() - 1].timestamp;

    Ok(RsiComputation {
        points,
        state: Some(EngineState {
            avg_gain: smoother.avg_gain,
            avg_loss: smoother.avg_loss,
            last_timestamp,
            period,
        }),
        outcome,
    })
}

enum Resume {
    At(usize),
    UpToDate,
    AnchorLost,
}

/// Locate the first bar newer than the stored timestamp
///
/// The bar right before it must be the one the state was saved at, and the
/// tail from there on must be strictly increasing. Anything else means the
/// buffer was trimmed past the anchor or history was rewritten.
fn resume_index(klines: &[KLine], state: &EngineState) -> Resume {
    let Some(index) = klines
        .iter()
        .position(|k| k.timestamp > state.last_timestamp)
    else {
        return Resume::UpToDate;
    };

    if index == 0 || klines[index - 1].timestamp != state.last_timestamp {
        return Resume::AnchorLost;
    }

    let ordered = klines[index - 1..]
        .windows(2)
        .all(|w| w[0].timestamp < w[1].timestamp);
    if !ordered {
        return Resume::AnchorLost;
    }

    Resume::At(index)
}

/// Simple mean of gains and losses over changes 1..=period
fn seed_averages(klines: &[KLine], period: usize) -> (Decimal, Decimal) {
    let (gain_sum, loss_sum) = klines[..=period].windows(2).fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(gains, losses), w| {
            let change = w[1].close.saturating_sub(w[0].close);
            if change > Decimal::ZERO {
                (gains.saturating_add(change), losses)
            } else if change < Decimal::ZERO {
                (gains, losses.saturating_sub(change))
            } else {
                (gains, losses)
            }
        },
    );

    let period = Decimal::from(period);
    (div_half_up(gain_sum, period), div_half_up(loss_sum, period))
}

/// Running Wilder averages for one series
struct WilderSmoother {
    period: Decimal,
    weight: Decimal,
    avg_gain: Decimal,
    avg_loss: Decimal,
}

impl WilderSmoother {
    fn new(period: usize, avg_gain: Decimal, avg_loss: Decimal) -> Self {
        let period = Decimal::from(period);
        Self {
            period,
            weight: period - Decimal::ONE,
            avg_gain,
            avg_loss,
        }
    }

    /// Fold one close-to-close change in and return the resulting RSI
    fn next(&mut self, change: Decimal) -> Decimal {
        let gain = change.max(Decimal::ZERO);
        let loss = (-change).max(Decimal::ZERO);

        self.avg_gain = div_half_up(smooth_sum(self.avg_gain, self.weight, gain), self.period);
        self.avg_loss = div_half_up(smooth_sum(self.avg_loss, self.weight, loss), self.period);

        rsi_from_averages(self.avg_gain, self.avg_loss)
    }
}

/// RSI = 100 - 100 / (1 + RS); a zero average loss pins RSI at 100
pub fn rsi_from_averages(avg_gain: Decimal, avg_loss: Decimal) -> Decimal {
    if avg_loss.is_zero() {
        return ONE_HUNDRED;
    }

    let rs = div_half_up(avg_gain, avg_loss);
    ONE_HUNDRED - div_half_up(ONE_HUNDRED, Decimal::ONE.saturating_add(rs))
}

/// `avg * weight + value`, saturating at `Decimal::MAX`
fn smooth_sum(avg: Decimal, weight: Decimal, value: Decimal) -> Decimal {
    avg.saturating_mul(weight).saturating_add(value)
}

/// Denominators are never zero here; an overflowing quotient saturates
fn div_half_up(numerator: Decimal, denominator: Decimal) -> Decimal {
    numerator
        .checked_div(denominator)
        .unwrap_or(Decimal::MAX)
        .round_dp_with_strategy(CALCULATION_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn klines_from(closes: &[Decimal]) -> Vec<KLine> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| KLine::new(start() + Duration::minutes(5 * i as i64), close))
            .collect()
    }

    fn golden_closes() -> Vec<Decimal> {
        vec![
            dec!(44.34), dec!(44.09), dec!(44.15), dec!(43.61), dec!(44.33),
            dec!(44.83), dec!(45.10), dec!(45.42), dec!(45.84), dec!(46.08),
            dec!(45.89), dec!(46.03), dec!(45.61), dec!(46.28), dec!(46.28),
            dec!(46.00), dec!(46.03), dec!(46.41), dec!(46.22), dec!(45.64),
        ]
    }

    fn values(points: &[RsiPoint]) -> Vec<Decimal> {
        points.iter().map(|p| p.value).collect()
    }

    #[test]
    fn test_golden_sequence() {
        let klines = klines_from(&golden_closes());
        let result = compute(&klines, 14, false, None).unwrap();

        assert_eq!(result.outcome, RsiOutcome::Seeded);
        assert_eq!(
            values(&result.points),
            vec![
                dec!(70.4641350166),
                dec!(65.9462111843),
                dec!(66.1962935244),
                dec!(69.2742797332),
                dec!(66.0365442099),
                dec!(57.2414752845),
            ]
        );
        assert_eq!(result.points[0].timestamp, klines[14].timestamp);

        let state = result.state.unwrap();
        assert_eq!(state.avg_gain, dec!(0.1780556941));
        assert_eq!(state.avg_loss, dec!(0.1330049367));
        assert_eq!(state.last_timestamp, klines[19].timestamp);
        assert_eq!(state.period, 14);
    }

    #[test]
    fn test_zero_period_rejected() {
        let klines = klines_from(&golden_closes());
        let result = compute(&klines, 0, false, None);
        assert_eq!(result, Err(EngineError::InvalidPeriod(0)));
    }

    #[test]
    fn test_insufficient_data_leaves_state_untouched() {
        let klines = klines_from(&golden_closes());
        let prior = compute(&klines, 14, false, None).unwrap().state;

        let short = &klines[..10];
        let result = compute(short, 14, false, prior.as_ref()).unwrap();

        assert_eq!(result.outcome, RsiOutcome::InsufficientData);
        assert!(result.points.is_empty());
        assert_eq!(result.state, prior);
    }

    #[test]
    fn test_exactly_period_bars_cannot_seed() {
        let klines = klines_from(&golden_closes()[..14]);
        let result = compute(&klines, 14, false, None).unwrap();

        assert_eq!(result.outcome, RsiOutcome::InsufficientData);
        assert!(result.points.is_empty());
        assert!(result.state.is_none());
    }

    #[test]
    fn test_seed_window_covers_first_period_changes() {
        // Changes: +1, -2, +3, 0 -> gains 4, losses 2 over period 4
        let klines = klines_from(&[dec!(10), dec!(11), dec!(9), dec!(12), dec!(12), dec!(13)]);
        let (gain, loss) = seed_averages(&klines, 4);

        assert_eq!(gain, dec!(1));
        assert_eq!(loss, dec!(0.5));
    }

    #[test]
    fn test_flat_series_is_pinned_at_100() {
        let klines = klines_from(&[dec!(50); 20]);
        let result = compute(&klines, 14, false, None).unwrap();

        assert_eq!(result.points.len(), 6);
        assert!(result.points.iter().all(|p| p.value == dec!(100)));

        let state = result.state.unwrap();
        assert!(state.avg_gain.is_zero());
        assert!(state.avg_loss.is_zero());
    }

    #[test]
    fn test_all_losses_give_zero() {
        let closes: Vec<Decimal> = (0..10).map(|i| Decimal::from(100 - i)).collect();
        let result = compute(&klines_from(&closes), 5, false, None).unwrap();

        assert!(result.points.iter().all(|p| p.value == dec!(0)));
    }

    #[test]
    fn test_no_new_bars_is_idempotent() {
        let klines = klines_from(&golden_closes());
        let first = compute(&klines, 14, false, None).unwrap();
        let second = compute(&klines, 14, false, first.state.as_ref()).unwrap();

        assert_eq!(second.outcome, RsiOutcome::UpToDate);
        assert!(second.points.is_empty());
        assert_eq!(second.state, first.state);
    }

    #[test]
    fn test_resume_matches_batch() {
        let klines = klines_from(&golden_closes());
        let batch = compute(&klines, 14, false, None).unwrap();

        let head = compute(&klines[..17], 14, false, None).unwrap();
        let tail = compute(&klines, 14, false, head.state.as_ref()).unwrap();

        assert_eq!(tail.outcome, RsiOutcome::Resumed);
        assert_eq!(tail.points.len(), 3);
        assert_eq!(tail.points[..], batch.points[3..]);
        assert_eq!(tail.state, batch.state);
    }

    #[test]
    fn test_resume_after_buffer_trim() {
        let klines = klines_from(&golden_closes());
        let batch = compute(&klines, 14, false, None).unwrap();
        let head = compute(&klines[..17], 14, false, None).unwrap();

        // Host dropped the oldest bars but kept the last processed one
        let tail = compute(&klines[10..], 14, false, head.state.as_ref()).unwrap();
        assert_eq!(tail.outcome, RsiOutcome::InsufficientData);
        assert_eq!(tail.state, head.state);

        let trimmed = &klines[3..];
        let tail = compute(trimmed, 14, false, head.state.as_ref()).unwrap();
        assert_eq!(tail.outcome, RsiOutcome::Resumed);
        assert_eq!(tail.points[..], batch.points[3..]);
    }

    #[test]
    fn test_lost_anchor_reseeds() {
        let klines = klines_from(&golden_closes());
        let stale = EngineState {
            avg_gain: dec!(1),
            avg_loss: dec!(1),
            // Between two bars: never matches any buffered timestamp
            last_timestamp: klines[15].timestamp + Duration::minutes(1),
            period: 14,
        };

        let result = compute(&klines, 14, false, Some(&stale)).unwrap();
        let fresh = compute(&klines, 14, false, None).unwrap();

        assert_eq!(result.outcome, RsiOutcome::Seeded);
        assert_eq!(result, fresh);
    }

    #[test]
    fn test_reordered_tail_reseeds() {
        let mut klines = klines_from(&golden_closes());
        let prior = compute(&klines, 14, false, None).unwrap().state;
        let last = klines[19].timestamp;

        // Late bar arrives after a newer one: t22 then t21
        klines.push(KLine::new(last + Duration::minutes(15), dec!(46.10)));
        klines.push(KLine::new(last + Duration::minutes(10), dec!(45.90)));

        let result = compute(&klines, 14, false, prior.as_ref()).unwrap();
        let fresh = compute(&klines, 14, false, None).unwrap();

        assert_eq!(result.outcome, RsiOutcome::Seeded);
        assert_eq!(result, fresh);
    }

    #[test]
    fn test_extreme_closes_do_not_overflow() {
        let closes: Vec<Decimal> = (0..12)
            .map(|i| if i % 2 == 0 { Decimal::ZERO } else { Decimal::MAX })
            .collect();
        let klines = klines_from(&closes);

        let result = compute(&klines, 2, false, None).unwrap();
        assert_eq!(result.points.len(), 10);
        for point in &result.points {
            assert!(point.value >= Decimal::ZERO && point.value <= ONE_HUNDRED);
        }

        let state = result.state.unwrap();
        let extended = klines_from(&[closes.clone(), vec![Decimal::MAX]].concat());
        let resumed = compute(&extended, 2, false, Some(&state)).unwrap();
        assert_eq!(resumed.outcome, RsiOutcome::Resumed);
        assert_eq!(resumed.points.len(), 1);
    }

    #[test]
    fn test_division_overflow_saturates() {
        assert_eq!(div_half_up(Decimal::MAX, dec!(0.5)), Decimal::MAX);
        assert_eq!(rsi_from_averages(Decimal::MAX, dec!(0.0000000001)), dec!(100));
    }

    #[test]
    fn test_reset_ignores_valid_prior_state() {
        let klines = klines_from(&golden_closes());
        let head = compute(&klines[..17], 14, false, None).unwrap();

        let reset = compute(&klines, 14, true, head.state.as_ref()).unwrap();
        let fresh = compute(&klines, 14, false, None).unwrap();

        assert_eq!(reset.outcome, RsiOutcome::Seeded);
        assert_eq!(reset, fresh);
    }

    #[test]
    fn test_period_change_reseeds() {
        let klines = klines_from(&golden_closes());
        let prior = compute(&klines[..17], 14, false, None).unwrap().state;

        let result = compute(&klines, 5, false, prior.as_ref()).unwrap();

        assert_eq!(result.outcome, RsiOutcome::Seeded);
        assert_eq!(result.points.len(), 15);
        assert_eq!(result.state.unwrap().period, 5);
    }

    #[test]
    fn test_period_one() {
        let klines = klines_from(&[dec!(10), dec!(11), dec!(10), dec!(10)]);
        let result = compute(&klines, 1, false, None).unwrap();

        // With period 1 the averages are just the latest change
        assert_eq!(values(&result.points), vec![dec!(100), dec!(0), dec!(100)]);
    }

    #[test]
    fn test_values_stay_in_range() {
        let closes: Vec<Decimal> = (0..60)
            .map(|i| Decimal::from((i * 37) % 23) + dec!(0.01) * Decimal::from(i))
            .collect();
        let result = compute(&klines_from(&closes), 7, false, None).unwrap();

        assert!(!result.points.is_empty());
        for point in &result.points {
            assert!(point.value >= Decimal::ZERO && point.value <= ONE_HUNDRED);
        }
    }

    #[test]
    fn test_rsi_from_averages() {
        assert_eq!(rsi_from_averages(dec!(1), dec!(0)), dec!(100));
        assert_eq!(rsi_from_averages(dec!(0), dec!(0)), dec!(100));
        assert_eq!(rsi_from_averages(dec!(1), dec!(1)), dec!(50));
        assert_eq!(rsi_from_averages(dec!(0), dec!(2)), dec!(0));
    }

    #[test]
    fn test_division_rounds_half_up() {
        assert_eq!(div_half_up(dec!(1), dec!(3)), dec!(0.3333333333));
        assert_eq!(div_half_up(dec!(2), dec!(3)), dec!(0.6666666667));
        assert_eq!(div_half_up(dec!(0.00000000005), dec!(1)), dec!(0.0000000001));
    }
}
