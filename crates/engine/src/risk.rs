//! C6 — pure, synchronous pre-trade risk validation.

use signal_core::{PositionSide, RiskConfig, Side};

/// Account snapshot the validator checks proposed trades against.
/// Supplied by the caller (C9) from C8's live position/ledger state.
#[derive(Debug, Clone, Copy)]
pub struct AccountState {
    pub equity: f64,
    pub daily_realized_loss: f64,
    pub drawdown_percent: f64,
}

#[derive(Debug, Clone)]
pub struct RiskAssessment {
    pub notional: f64,
    pub position_size_percent: f64,
    pub reward_risk_ratio: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub assessment: RiskAssessment,
}

pub struct RiskValidator {
    cfg: RiskConfig,
}

impl RiskValidator {
    pub fn new(cfg: RiskConfig) -> Self {
        Self { cfg }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn validate(
        &self,
        side: Side,
        quantity: f64,
        entry_price: f64,
        stop_loss: f64,
        take_profit: f64,
        account: AccountState,
    ) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let notional = quantity * entry_price;
        let position_size_percent = if account.equity > 0.0 {
            (notional / account.equity) * 100.0
        } else {
            f64::INFINITY
        };

        if quantity <= 0.0 || entry_price <= 0.0 {
            errors.push(format!(
                "quantity and entryPrice must be positive (got quantity={quantity}, entryPrice={entry_price})"
            ));
            return ValidationResult {
                is_valid: false,
                errors,
                warnings,
                assessment: RiskAssessment {
                    notional,
                    position_size_percent,
                    reward_risk_ratio: None,
                },
            };
        }

        let max_notional = (self.cfg.max_position_size_percent / 100.0) * account.equity;
        if notional > max_notional {
            errors.push(format!(
                "notional {notional:.2} exceeds max position size {max_notional:.2} ({:.1}% of equity)",
                self.cfg.max_position_size_percent
            ));
            return ValidationResult {
                is_valid: false,
                errors,
                warnings,
                assessment: RiskAssessment {
                    notional,
                    position_size_percent,
                    reward_risk_ratio: None,
                },
            };
        }

        if account.daily_realized_loss > self.cfg.max_daily_loss_usdt {
            errors.push(format!(
                "daily realized loss {:.2} exceeds limit {:.2}",
                account.daily_realized_loss, self.cfg.max_daily_loss_usdt
            ));
            return ValidationResult {
                is_valid: false,
                errors,
                warnings,
                assessment: RiskAssessment {
                    notional,
                    position_size_percent,
                    reward_risk_ratio: None,
                },
            };
        }

        if account.drawdown_percent > self.cfg.max_drawdown_percent {
            errors.push(format!(
                "drawdown {:.1}% exceeds limit {:.1}%",
                account.drawdown_percent, self.cfg.max_drawdown_percent
            ));
            return ValidationResult {
                is_valid: false,
                errors,
                warnings,
                assessment: RiskAssessment {
                    notional,
                    position_size_percent,
                    reward_risk_ratio: None,
                },
            };
        }

        let (risk, reward) = match side {
            Side::Buy => (entry_price - stop_loss, take_profit - entry_price),
            Side::Sell => (stop_loss - entry_price, entry_price - take_profit),
        };

        let reward_risk_ratio = if risk > 0.0 { Some(reward / risk) } else { None };

        match reward_risk_ratio {
            Some(ratio) if ratio >= self.cfg.risk_reward_ratio => {}
            Some(ratio) => {
                errors.push(format!(
                    "reward/risk {ratio:.2} below required {:.2}",
                    self.cfg.risk_reward_ratio
                ));
            }
            None => {
                errors.push("stop loss must be on the loss side of entry price".to_string());
            }
        }

        if position_size_percent > self.cfg.max_position_size_percent * 0.8 {
            warnings.push(format!(
                "position uses {position_size_percent:.1}% of equity, approaching the {:.1}% limit",
                self.cfg.max_position_size_percent
            ));
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            assessment: RiskAssessment {
                notional,
                position_size_percent,
                reward_risk_ratio,
            },
        }
    }
}

/// Default long stop/target convention: `stopLoss < entry < takeProfit`.
pub fn side_for(position_side: PositionSide) -> Side {
    match position_side {
        PositionSide::Long => Side::Buy,
        PositionSide::Short => Side::Sell,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> AccountState {
        AccountState {
            equity: 10_000.0,
            daily_realized_loss: 0.0,
            drawdown_percent: 0.0,
        }
    }

    #[test]
    fn rejects_non_positive_quantity() {
        let validator = RiskValidator::new(RiskConfig::default());
        let result = validator.validate(Side::Buy, 0.0, 100.0, 95.0, 110.0, account());
        assert!(!result.is_valid);
    }

    #[test]
    fn rejects_oversized_notional() {
        let validator = RiskValidator::new(RiskConfig::default());
        // 20% cap of 10_000 equity = 2_000 notional max
        let result = validator.validate(Side::Buy, 100.0, 100.0, 95.0, 120.0, account());
        assert!(!result.is_valid);
    }

    #[test]
    fn rejects_insufficient_reward_risk_ratio() {
        let validator = RiskValidator::new(RiskConfig::default());
        // notional well under cap, but reward/risk only 1:1
        let result = validator.validate(Side::Buy, 1.0, 100.0, 95.0, 105.0, account());
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("reward/risk")));
    }

    #[test]
    fn accepts_well_formed_trade() {
        let validator = RiskValidator::new(RiskConfig::default());
        let result = validator.validate(Side::Buy, 1.0, 100.0, 95.0, 115.0, account());
        assert!(result.is_valid);
        assert_eq!(result.assessment.reward_risk_ratio, Some(3.0));
    }

    #[test]
    fn rejects_daily_loss_breach() {
        let validator = RiskValidator::new(RiskConfig::default());
        let mut acc = account();
        acc.daily_realized_loss = 600.0;
        let result = validator.validate(Side::Buy, 1.0, 100.0, 95.0, 115.0, acc);
        assert!(!result.is_valid);
    }
}
