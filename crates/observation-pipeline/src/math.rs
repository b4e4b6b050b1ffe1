/// Return `val` if finite, else `default`. Every calculator routes its
/// output through this so a divide-by-zero or NaN never reaches storage.
#[inline]
pub fn finite_or(val: f64, default: f64) -> f64 {
    if val.is_finite() {
        val
    } else {
        default
    }
}

pub fn sma(data: &[f64], period: usize) -> Option<f64> {
    if period == 0 || data.len() < period {
        return None;
    }
    let window = &data[data.len() - period..];
    Some(finite_or(window.iter().sum::<f64>() / period as f64, f64::NAN)).filter(|v| v.is_finite())
}

pub fn ema_series(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.is_empty() {
        return vec![];
    }
    if data.len() < period {
        return vec![];
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed = data[..period].iter().sum::<f64>() / period as f64;

    let mut result = Vec::with_capacity(data.len() - period + 1);
    result.push(finite_or(seed, 0.0));

    for value in &data[period..] {
        let prev = *result.last().unwrap();
        let next = (value - prev) * multiplier + prev;
        result.push(finite_or(next, prev));
    }

    result
}

pub fn ema(data: &[f64], period: usize) -> Option<f64> {
    ema_series(data, period).last().copied()
}

pub fn rsi(data: &[f64], period: usize) -> Option<f64> {
    if period == 0 || data.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = data.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = changes.iter().map(|c| c.max(0.0)).collect();
    let losses: Vec<f64> = changes.iter().map(|c| (-c).max(0.0)).collect();

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
    }

    let rs = if avg_loss == 0.0 { return Some(100.0) } else { avg_gain / avg_loss };
    Some(finite_or(100.0 - (100.0 / (1.0 + rs)), 50.0))
}

pub fn macd_histogram(data: &[f64], fast: usize, slow: usize, signal: usize) -> Option<f64> {
    if slow < fast || data.len() < slow + signal {
        return None;
    }

    let ema_fast = ema_series(data, fast);
    let ema_slow = ema_series(data, slow);
    if ema_fast.is_empty() || ema_slow.is_empty() {
        return None;
    }

    let offset = ema_fast.len().saturating_sub(ema_slow.len());
    let macd_line: Vec<f64> = ema_slow
        .iter()
        .enumerate()
        .map(|(i, slow_v)| ema_fast[i + offset] - slow_v)
        .collect();

    let signal_line = ema_series(&macd_line, signal);
    let macd_last = *macd_line.last()?;
    let signal_last = *signal_line.last()?;
    Some(finite_or(macd_last - signal_last, 0.0))
}

pub fn rate_of_change(data: &[f64], period: usize) -> Option<f64> {
    if data.len() <= period {
        return None;
    }
    let now = *data.last()?;
    let then = data[data.len() - 1 - period];
    if then == 0.0 {
        return None;
    }
    Some(finite_or((now - then) / then * 100.0, 0.0))
}

pub fn momentum(data: &[f64], period: usize) -> Option<f64> {
    if data.len() <= period {
        return None;
    }
    let now = *data.last()?;
    let then = data[data.len() - 1 - period];
    Some(finite_or(now - then, 0.0))
}

pub fn stochastic_k(data: &[f64], period: usize) -> Option<f64> {
    if data.len() < period {
        return None;
    }
    let window = &data[data.len() - period..];
    let high = window.iter().cloned().fold(f64::MIN, f64::max);
    let low = window.iter().cloned().fold(f64::MAX, f64::min);
    let now = *data.last()?;
    if (high - low).abs() < f64::EPSILON {
        return Some(50.0);
    }
    Some(finite_or((now - low) / (high - low) * 100.0, 50.0))
}

pub fn cci(data: &[f64], period: usize) -> Option<f64> {
    if data.len() < period {
        return None;
    }
    let window = &data[data.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let mean_dev = window.iter().map(|v| (v - mean).abs()).sum::<f64>() / period as f64;
    if mean_dev.abs() < f64::EPSILON {
        return Some(0.0);
    }
    let now = *data.last()?;
    Some(finite_or((now - mean) / (0.015 * mean_dev), 0.0))
}

pub fn stdev(data: &[f64]) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    let mean = data.iter().sum::<f64>() / data.len() as f64;
    let variance = data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / data.len() as f64;
    Some(finite_or(variance.sqrt(), 0.0))
}

pub fn returns(data: &[f64]) -> Vec<f64> {
    data.windows(2)
        .map(|w| if w[0] != 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

pub fn bollinger_width(data: &[f64], period: usize, std_dev: f64) -> Option<f64> {
    if data.len() < period {
        return None;
    }
    let window = &data[data.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let sd = stdev(window)?;
    let upper = mean + std_dev * sd;
    let lower = mean - std_dev * sd;
    if mean.abs() < f64::EPSILON {
        return None;
    }
    Some(finite_or((upper - lower) / mean, 0.0))
}

pub fn price_position_in_range(data: &[f64], period: usize) -> Option<f64> {
    if data.len() < period {
        return None;
    }
    let window = &data[data.len() - period..];
    let high = window.iter().cloned().fold(f64::MIN, f64::max);
    let low = window.iter().cloned().fold(f64::MAX, f64::min);
    let now = *data.last()?;
    if (high - low).abs() < f64::EPSILON {
        return Some(0.5);
    }
    Some(finite_or((now - low) / (high - low), 0.5))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_requires_full_window() {
        assert_eq!(sma(&[1.0, 2.0], 3), None);
        assert_eq!(sma(&[1.0, 2.0, 3.0], 3), Some(2.0));
    }

    #[test]
    fn rsi_is_bounded() {
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let value = rsi(&prices, 14).unwrap();
        assert!(value >= 0.0 && value <= 100.0);
        assert!(value > 50.0, "steadily rising prices should show RSI above midline");
    }

    #[test]
    fn stochastic_k_bounded_in_0_100() {
        let prices = vec![10.0, 12.0, 9.0, 15.0, 11.0, 14.0];
        let k = stochastic_k(&prices, 5).unwrap();
        assert!((0.0..=100.0).contains(&k));
    }
}
