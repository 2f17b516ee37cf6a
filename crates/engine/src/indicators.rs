//! Pure indicator evaluation: `evaluate_indicators(klines, cfg) -> Signal`.
//!
//! RSI (Wilder smoothing), an MA crossover, and a volume-spike ratio
//! feed a weighted strength score. This module has no I/O and no
//! dependency on any other component; it is a black box per the
//! external-interfaces contract.

use signal_core::{Action, IndicatorConfig, Kline, Signal};
use std::collections::HashMap;

pub fn evaluate_indicators(klines: &[Kline], symbol: &str, cfg: &IndicatorConfig) -> Signal {
    if klines.len() < cfg.ma2_period.max(cfg.ma1_period) + 1 {
        return Signal::hold(symbol.to_string(), "insufficient kline history");
    }

    let closes: Vec<f64> = klines.iter().map(|k| k.close).collect();
    let volumes: Vec<f64> = klines.iter().map(|k| k.volume).collect();

    let rsi = wilder_rsi(&closes, 14);
    let ma1 = simple_moving_average(&closes, cfg.ma1_period);
    let ma2 = simple_moving_average(&closes, cfg.ma2_period);
    let volume_ratio = volume_spike_ratio(&volumes);

    let mut indicators = HashMap::new();
    indicators.insert("rsi".to_string(), rsi);
    indicators.insert("ma1".to_string(), ma1);
    indicators.insert("ma2".to_string(), ma2);
    indicators.insert("volume_ratio".to_string(), volume_ratio);

    let bullish_crossover = ma1 > ma2;
    let volume_spike = volume_ratio >= cfg.volume_spike_threshold;

    let (action, reason, mut strength) = if rsi <= cfg.rsi_oversold && bullish_crossover {
        (Action::Buy, "rsi_oversold_with_bullish_crossover", 60.0)
    } else if rsi >= cfg.rsi_overbought && !bullish_crossover {
        (Action::Sell, "rsi_overbought_with_bearish_crossover", 60.0)
    } else if rsi <= cfg.rsi_oversold {
        (Action::Buy, "rsi_oversold", 45.0)
    } else if rsi >= cfg.rsi_overbought {
        (Action::Sell, "rsi_overbought", 45.0)
    } else {
        (Action::Hold, "no_clear_signal", 0.0)
    };

    if volume_spike && action != Action::Hold {
        strength += 20.0;
    }
    if bullish_crossover && action == Action::Buy {
        strength += 10.0;
    }
    if !bullish_crossover && action == Action::Sell {
        strength += 10.0;
    }

    Signal::new(symbol.to_string(), action, strength, reason).with_indicators(indicators)
}

/// Wilder-smoothed RSI over `period` bars. Returns 50.0 (neutral) when
/// there isn't enough history.
fn wilder_rsi(closes: &[f64], period: usize) -> f64 {
    if closes.len() <= period {
        return 50.0;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let (mut avg_gain, mut avg_loss) = {
        let seed = &changes[..period];
        let gain_sum: f64 = seed.iter().filter(|c| **c > 0.0).sum();
        let loss_sum: f64 = seed.iter().filter(|c| **c < 0.0).map(|c| -c).sum();
        (gain_sum / period as f64, loss_sum / period as f64)
    };

    for change in &changes[period..] {
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
    }

    if avg_loss == 0.0 {
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

fn simple_moving_average(closes: &[f64], period: usize) -> f64 {
    if closes.len() < period || period == 0 {
        return closes.last().copied().unwrap_or(0.0);
    }
    let window = &closes[closes.len() - period..];
    window.iter().sum::<f64>() / period as f64
}

fn volume_spike_ratio(volumes: &[f64]) -> f64 {
    if volumes.len() < 2 {
        return 1.0;
    }
    let latest = *volumes.last().unwrap();
    let history = &volumes[..volumes.len() - 1];
    let avg = history.iter().sum::<f64>() / history.len() as f64;
    if avg == 0.0 {
        1.0
    } else {
        latest / avg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kline_series(closes: &[f64], volumes: &[f64]) -> Vec<Kline> {
        closes
            .iter()
            .zip(volumes.iter())
            .enumerate()
            .map(|(i, (c, v))| Kline::new(i as i64, *c, *c, *c, *c, *v))
            .collect()
    }

    #[test]
    fn holds_with_insufficient_history() {
        let cfg = IndicatorConfig::default();
        let klines = kline_series(&[1.0, 2.0], &[10.0, 10.0]);
        let signal = evaluate_indicators(&klines, "BTC-USDT", &cfg);
        assert_eq!(signal.action, Action::Hold);
    }

    #[test]
    fn steadily_rising_prices_give_high_rsi() {
        let cfg = IndicatorConfig::default();
        let closes: Vec<f64> = (1..=30).map(|i| i as f64).collect();
        let volumes = vec![100.0; 30];
        let klines = kline_series(&closes, &volumes);
        let signal = evaluate_indicators(&klines, "BTC-USDT", &cfg);
        assert_eq!(*signal.indicators.get("rsi").unwrap() > 60.0, true);
    }

    #[test]
    fn volume_spike_boosts_strength() {
        let ratio = volume_spike_ratio(&[10.0, 10.0, 10.0, 50.0]);
        assert!(ratio > 1.5);
    }
}
