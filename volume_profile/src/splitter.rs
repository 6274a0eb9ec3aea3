//! Partitioning an ascending bar series into calendar periods under a row budget.

use market_data::Bar;
use tracing::debug;

use crate::period::{PeriodClock, PeriodType};

/// A contiguous run of bars sharing one period key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodBoundary<'a> {
    pub start_time: i64,
    /// Exclusive.
    pub end_time: i64,
    pub bars: &'a [Bar],
    /// Rows this period was charged against the budget.
    pub rows: usize,
}

/// Rows each period costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowBudget {
    Fixed(usize),
    /// The `recent_periods` newest periods get `recent_rows`, older ones `older_rows`.
    Variable {
        recent_periods: usize,
        recent_rows: usize,
        older_rows: usize,
    },
}

impl RowBudget {
    /// Rows for the period `age` places back from the newest (0 = newest).
    pub fn rows_for(&self, age: usize) -> usize {
        let rows = match *self {
            Self::Fixed(rows) => rows,
            Self::Variable {
                recent_periods,
                recent_rows,
                older_rows,
            } => {
                if age < recent_periods {
                    recent_rows
                } else {
                    older_rows
                }
            }
        };
        rows.max(1)
    }
}

/// Splits `bars` (ascending) into periods, keeping the newest ones that fit in
/// `max_total_rows`.
///
/// A new period opens whenever a bar's period key differs from the previous
/// bar's. Bars whose time cannot be mapped to a calendar date stay in the
/// current period. Output is chronological.
pub fn split_into_periods<'a>(
    bars: &'a [Bar],
    period: PeriodType,
    max_total_rows: usize,
    budget: RowBudget,
    clock: &PeriodClock,
) -> Vec<PeriodBoundary<'a>> {
    let mut runs: Vec<(usize, usize, i64)> = Vec::new();
    let mut current_key = None;
    for (i, bar) in bars.iter().enumerate() {
        let key = clock.key(period, bar.time);
        let continues = !runs.is_empty() && (key.is_none() || key == current_key);
        match runs.last_mut() {
            Some(run) if continues => run.1 = i + 1,
            _ => {
                runs.push((i, i + 1, bar.time));
                current_key = key;
            }
        }
    }

    let mut kept = Vec::new();
    let mut used = 0usize;
    for (age, &(start, end, first_time)) in runs.iter().rev().enumerate() {
        let rows = budget.rows_for(age);
        if used.saturating_add(rows) > max_total_rows {
            debug!(
                dropped = runs.len() - age,
                kept = age,
                max_total_rows,
                "row budget exhausted, dropping oldest periods"
            );
            break;
        }
        used += rows;

        let slice = &bars[start..end];
        let (start_time, end_time) = match clock.span(period, first_time) {
            Some(span) => (span.start_time, span.end_time),
            None => (first_time, slice.last().map_or(first_time, |b| b.time) + 1),
        };
        kept.push(PeriodBoundary {
            start_time,
            end_time,
            bars: slice,
            rows,
        });
    }
    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = 86_400;
    // 2024-01-01 00:00:00Z, a Monday
    const T0: i64 = 1_704_067_200;

    fn bar(time: i64) -> Bar {
        Bar {
            time,
            open: 1.0,
            high: 2.0,
            low: 1.0,
            close: 1.5,
            volume: 1.0,
        }
    }

    fn split(bars: &[Bar], period: PeriodType, max: usize, budget: RowBudget) -> Vec<PeriodBoundary<'_>> {
        split_into_periods(bars, period, max, budget, &PeriodClock::utc())
    }

    fn hourly(days: i64) -> Vec<Bar> {
        (0..days * 24).map(|h| bar(T0 + h * 3_600)).collect()
    }

    #[test]
    fn sessions_cut_at_midnight() {
        let bars = hourly(3);
        let periods = split(&bars, PeriodType::Session, 100, RowBudget::Fixed(10));

        assert_eq!(periods.len(), 3);
        for (d, p) in periods.iter().enumerate() {
            assert_eq!(p.bars.len(), 24);
            assert_eq!(p.start_time, T0 + d as i64 * DAY);
            assert_eq!(p.end_time, p.start_time + DAY);
        }
    }

    #[test]
    fn budget_drops_oldest_periods() {
        let bars = hourly(5);
        let periods = split(&bars, PeriodType::Session, 25, RowBudget::Fixed(10));

        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].start_time, T0 + 3 * DAY);
        assert_eq!(periods[1].start_time, T0 + 4 * DAY);
    }

    #[test]
    fn variable_budget_charges_recent_periods_more() {
        let bars = hourly(6);
        let budget = RowBudget::Variable {
            recent_periods: 2,
            recent_rows: 40,
            older_rows: 10,
        };
        let periods = split(&bars, PeriodType::Session, 100, budget);

        let rows: Vec<usize> = periods.iter().map(|p| p.rows).collect();
        assert_eq!(rows, vec![10, 10, 40, 40]);
    }

    #[test]
    fn oversized_newest_period_yields_nothing() {
        let bars = hourly(2);
        let periods = split(&bars, PeriodType::Session, 5, RowBudget::Fixed(10));
        assert!(periods.is_empty());
    }

    #[test]
    fn weekly_gaps_keep_calendar_bounds() {
        // Monday and Wednesday of one week, then the next Tuesday
        let bars = vec![bar(T0), bar(T0 + 2 * DAY), bar(T0 + 8 * DAY)];
        let periods = split(&bars, PeriodType::Week, 100, RowBudget::Fixed(1));

        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].bars.len(), 2);
        assert_eq!(periods[1].start_time, T0 + 7 * DAY);
        assert_eq!(periods[0].end_time, periods[1].start_time);
    }

    #[test]
    fn empty_input_has_no_periods() {
        assert!(split(&[], PeriodType::Month, 100, RowBudget::Fixed(1)).is_empty());
    }
}
