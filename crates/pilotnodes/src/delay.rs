use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pilotcore::{NodeContext, NodeError, NodeKind, NodeStrategy, Payload, PayloadExt, StrategyInfo};
use serde_json::{json, Value};
use tokio::time::{sleep, Duration};

const DEFAULT_DURATION: u64 = 60;
const DEFAULT_UNIT: &str = "seconds";

/// Suspends the run for `duration` x `unit`.
pub struct DelayNode;

/// Milliseconds per unit name.
fn unit_multiplier(unit: &str) -> Option<f64> {
    match unit {
        "milliseconds" => Some(1.0),
        "seconds" => Some(1_000.0),
        "minutes" => Some(60_000.0),
        "hours" => Some(3_600_000.0),
        _ => None,
    }
}

/// Wait in milliseconds described by a delay node's config.
pub fn delay_ms(config: &Payload) -> Result<u64, NodeError> {
    let unit = config.get_str("unit").unwrap_or(DEFAULT_UNIT);
    let multiplier = unit_multiplier(unit)
        .ok_or_else(|| NodeError::InvalidConfig(format!("Unsupported delay unit: {}", unit)))?;

    let duration = match config.get("duration") {
        None | Some(Value::Null) => DEFAULT_DURATION as f64,
        Some(_) => config
            .get_f64("duration")
            .filter(|d| d.is_finite() && *d >= 0.0)
            .ok_or_else(|| {
                NodeError::InvalidConfig("duration must be a non-negative number".to_string())
            })?,
    };

    let wait = (duration * multiplier).round();
    if wait >= u64::MAX as f64 {
        return Err(NodeError::InvalidConfig(format!(
            "delay of {} {} is too long",
            duration, unit
        )));
    }
    Ok(wait as u64)
}

/// Wall-clock time `wait_ms` from now, if it can be represented.
fn resume_time(wait_ms: u64) -> Result<DateTime<Utc>, NodeError> {
    i64::try_from(wait_ms)
        .ok()
        .and_then(chrono::Duration::try_milliseconds)
        .and_then(|wait| Utc::now().checked_add_signed(wait))
        .ok_or_else(|| {
            NodeError::InvalidConfig(format!("delay of {}ms is out of range", wait_ms))
        })
}

#[async_trait]
impl NodeStrategy for DelayNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Delay
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let wait_ms = delay_ms(&ctx.config)?;
        let duration = ctx.get_config_or("duration", json!(DEFAULT_DURATION));
        let unit = ctx.get_config_or("unit", json!(DEFAULT_UNIT));
        let resume_at = resume_time(wait_ms)?;

        tracing::info!(node_id = %ctx.node_id, "Delaying for {}ms", wait_ms);

        sleep(Duration::from_millis(wait_ms)).await;

        Ok(json!({
            "delayed": true,
            "duration": duration,
            "unit": unit,
            "delayMs": wait_ms,
            "delayedUntil": resume_at.to_rfc3339(),
        }))
    }

    fn info(&self) -> StrategyInfo {
        StrategyInfo::new("Pause the run for a fixed duration", "time")
    }
}
