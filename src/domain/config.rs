//! Typed configuration builders.
//!
//! Reads the INI-backed [`ConfigPort`] into the domain config structs,
//! rejecting out-of-range values up front so engines never see them.

use std::time::Duration;

use crate::domain::autopilot::AutoPilotConfig;
use crate::domain::backtest::BacktestParams;
use crate::domain::error::OptionPilotError;
use crate::domain::indicator::IndicatorConfig;
use crate::domain::signal::ClassifierConfig;
use crate::domain::workflow::WorkflowConfig;
use crate::ports::config_port::ConfigPort;

fn invalid(section: &str, key: &str, reason: &str) -> OptionPilotError {
    OptionPilotError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn positive_period(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<usize, OptionPilotError> {
    let value = config.get_int(section, key, default);
    if value <= 0 {
        return Err(invalid(section, key, "period must be positive"));
    }
    Ok(value as usize)
}

/// Split a comma-separated symbol list, trimming and dropping empties.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn build_indicator_config(
    config: &dyn ConfigPort,
) -> Result<IndicatorConfig, OptionPilotError> {
    let defaults = IndicatorConfig::default();
    let built = IndicatorConfig {
        sma_short: positive_period(config, "signals", "sma_short", defaults.sma_short as i64)?,
        sma_mid: positive_period(config, "signals", "sma_mid", defaults.sma_mid as i64)?,
        sma_long: positive_period(config, "signals", "sma_long", defaults.sma_long as i64)?,
        rsi_period: positive_period(config, "signals", "rsi_period", defaults.rsi_period as i64)?,
    };
    if built.sma_short >= built.sma_long {
        return Err(invalid(
            "signals",
            "sma_short",
            "short window must be below the long window",
        ));
    }
    Ok(built)
}

pub fn build_classifier_config(
    config: &dyn ConfigPort,
) -> Result<ClassifierConfig, OptionPilotError> {
    let defaults = ClassifierConfig::default();
    let rsi_upper = config.get_double("signals", "rsi_upper", defaults.rsi_upper);
    let rsi_lower = config.get_double("signals", "rsi_lower", defaults.rsi_lower);
    if !(0.0..=100.0).contains(&rsi_upper) || !(0.0..=100.0).contains(&rsi_lower) {
        return Err(invalid(
            "signals",
            "rsi_upper",
            "RSI thresholds must be within 0..100",
        ));
    }
    if rsi_lower >= rsi_upper {
        return Err(invalid(
            "signals",
            "rsi_lower",
            "oversold threshold must be below the overbought threshold",
        ));
    }
    let cash_symbols = match config.get_string("signals", "cash_symbols") {
        Some(raw) => parse_symbols(&raw),
        None => defaults.cash_symbols,
    };
    Ok(ClassifierConfig {
        rsi_upper,
        rsi_lower,
        cash_symbols,
    })
}

pub fn build_backtest_params(config: &dyn ConfigPort) -> Result<BacktestParams, OptionPilotError> {
    let defaults = BacktestParams::default();
    let initial_capital = config.get_double("backtest", "initial_capital", defaults.initial_capital);
    if initial_capital <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    let stop_loss_pct = config.get_double("backtest", "stop_loss_pct", defaults.stop_loss_pct);
    if !(0.0..1.0).contains(&stop_loss_pct) {
        return Err(invalid(
            "backtest",
            "stop_loss_pct",
            "stop_loss_pct must be a fraction in [0, 1)",
        ));
    }
    let rsi_ceiling = config.get_double("backtest", "rsi_ceiling", defaults.rsi_ceiling);
    if rsi_ceiling <= 0.0 {
        return Err(invalid(
            "backtest",
            "rsi_ceiling",
            "rsi_ceiling must be positive",
        ));
    }
    Ok(BacktestParams {
        initial_capital,
        sma_short: positive_period(config, "backtest", "sma_short", defaults.sma_short as i64)?,
        sma_long: positive_period(config, "backtest", "sma_long", defaults.sma_long as i64)?,
        rsi_period: positive_period(config, "backtest", "rsi_period", defaults.rsi_period as i64)?,
        rsi_ceiling,
        stop_loss_pct,
    })
}

pub fn build_workflow_config(config: &dyn ConfigPort) -> Result<WorkflowConfig, OptionPilotError> {
    let poll_attempts = config.get_int("workflow", "poll_attempts", 10);
    if !(1..=120).contains(&poll_attempts) {
        return Err(invalid(
            "workflow",
            "poll_attempts",
            "poll_attempts must be within 1..120",
        ));
    }
    let poll_interval_secs = config.get_int("workflow", "poll_interval_secs", 1);
    if !(1..=60).contains(&poll_interval_secs) {
        return Err(invalid(
            "workflow",
            "poll_interval_secs",
            "poll_interval_secs must be within 1..60",
        ));
    }
    Ok(WorkflowConfig {
        poll_attempts: poll_attempts as u32,
        poll_interval: Duration::from_secs(poll_interval_secs as u64),
        cancel_on_timeout: config.get_bool("workflow", "cancel_on_timeout", false),
    })
}

pub fn build_autopilot_config(
    config: &dyn ConfigPort,
) -> Result<AutoPilotConfig, OptionPilotError> {
    let defaults = AutoPilotConfig::default();
    let wait_increment_secs = config.get_int(
        "autopilot",
        "wait_increment_secs",
        defaults.wait_increment.as_secs() as i64,
    );
    if wait_increment_secs <= 0 {
        return Err(invalid(
            "autopilot",
            "wait_increment_secs",
            "wait_increment_secs must be positive",
        ));
    }
    let resume_grace_secs = config.get_int(
        "autopilot",
        "resume_grace_secs",
        defaults.resume_grace.as_secs() as i64,
    );
    if resume_grace_secs < 0 {
        return Err(invalid(
            "autopilot",
            "resume_grace_secs",
            "resume_grace_secs must be non-negative",
        ));
    }
    let scan_expiries = config.get_int("autopilot", "scan_expiries", defaults.scan_expiries as i64);
    if scan_expiries <= 0 {
        return Err(invalid(
            "autopilot",
            "scan_expiries",
            "scan_expiries must be positive",
        ));
    }
    let limit_markup = config.get_double("autopilot", "limit_markup", defaults.limit_markup);
    if limit_markup < 0.0 {
        return Err(invalid(
            "autopilot",
            "limit_markup",
            "limit_markup must be non-negative",
        ));
    }
    Ok(AutoPilotConfig {
        wait_increment: Duration::from_secs(wait_increment_secs as u64),
        resume_grace: Duration::from_secs(resume_grace_secs as u64),
        grace_increment: defaults.grace_increment,
        scan_expiries: scan_expiries as usize,
        limit_markup,
        workflow: build_workflow_config(config)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    #[test]
    fn parse_symbols_trims_and_drops_empties() {
        assert_eq!(
            parse_symbols(" SGOV, SHV ,,BIL "),
            vec!["SGOV".to_string(), "SHV".to_string(), "BIL".to_string()]
        );
        assert!(parse_symbols("").is_empty());
    }

    #[test]
    fn defaults_used_when_sections_absent() {
        let adapter = FileConfigAdapter::from_string("[data]\ndir = /tmp\n").unwrap();

        let indicators = build_indicator_config(&adapter).unwrap();
        assert_eq!(indicators, IndicatorConfig::default());

        let classifier = build_classifier_config(&adapter).unwrap();
        assert_eq!(classifier, ClassifierConfig::default());

        let backtest = build_backtest_params(&adapter).unwrap();
        assert_eq!(backtest, BacktestParams::default());

        let workflow = build_workflow_config(&adapter).unwrap();
        assert_eq!(workflow, WorkflowConfig::default());

        let autopilot = build_autopilot_config(&adapter).unwrap();
        assert_eq!(autopilot, AutoPilotConfig::default());
    }

    #[test]
    fn classifier_thresholds_must_be_ordered() {
        let adapter =
            FileConfigAdapter::from_string("[signals]\nrsi_upper = 30\nrsi_lower = 70\n").unwrap();
        let err = build_classifier_config(&adapter).unwrap_err();
        assert!(matches!(err, OptionPilotError::ConfigInvalid { .. }));
    }

    #[test]
    fn classifier_cash_symbols_override() {
        let adapter =
            FileConfigAdapter::from_string("[signals]\ncash_symbols = SGOV, CASHX\n").unwrap();
        let classifier = build_classifier_config(&adapter).unwrap();
        assert_eq!(
            classifier.cash_symbols,
            vec!["SGOV".to_string(), "CASHX".to_string()]
        );
    }

    #[test]
    fn backtest_rejects_non_positive_capital() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ninitial_capital = 0\n").unwrap();
        assert!(build_backtest_params(&adapter).is_err());
    }

    #[test]
    fn backtest_rejects_stop_loss_of_one() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\nstop_loss_pct = 1.0\n").unwrap();
        assert!(build_backtest_params(&adapter).is_err());
    }

    #[test]
    fn workflow_rejects_zero_poll_attempts() {
        let adapter =
            FileConfigAdapter::from_string("[workflow]\npoll_attempts = 0\n").unwrap();
        assert!(build_workflow_config(&adapter).is_err());
    }

    #[test]
    fn indicator_short_window_below_long() {
        let adapter =
            FileConfigAdapter::from_string("[signals]\nsma_short = 200\nsma_long = 20\n").unwrap();
        assert!(build_indicator_config(&adapter).is_err());
    }

    #[test]
    fn autopilot_overrides_apply() {
        let content = "[autopilot]\nwait_increment_secs = 5\nresume_grace_secs = 3\nscan_expiries = 2\nlimit_markup = 0.10\n[workflow]\npoll_attempts = 12\npoll_interval_secs = 2\n";
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        let autopilot = build_autopilot_config(&adapter).unwrap();
        assert_eq!(autopilot.wait_increment, Duration::from_secs(5));
        assert_eq!(autopilot.resume_grace, Duration::from_secs(3));
        assert_eq!(autopilot.scan_expiries, 2);
        assert!((autopilot.limit_markup - 0.10).abs() < f64::EPSILON);
        assert_eq!(autopilot.workflow.poll_attempts, 12);
        assert_eq!(autopilot.workflow.poll_interval, Duration::from_secs(2));
    }
}
