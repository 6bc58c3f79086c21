//! Production counters and a resolve-latency histogram (SPEC_FULL.md §B),
//! exported via the same `metrics` + `metrics-exporter-prometheus` pattern
//! as the teacher's server binary.

use std::time::Duration;

use fistfight_types::EndReason;
use metrics::{counter, histogram};

pub fn record_turn_resolved() {
    counter!("fistfight_turns_resolved_total").increment(1);
}

pub fn record_battle_ended(reason: EndReason) {
    counter!("fistfight_battles_ended_total", "reason" => end_reason_label(reason)).increment(1);
}

pub fn record_claim_collision() {
    counter!("fistfight_claim_lock_collisions_total").increment(1);
}

pub fn record_resolve_latency(elapsed: Duration) {
    histogram!("fistfight_resolve_turn_duration_seconds").record(elapsed.as_secs_f64());
}

fn end_reason_label(reason: EndReason) -> &'static str {
    match reason {
        EndReason::Normal => "normal",
        EndReason::DoubleForfeit => "double_forfeit",
        EndReason::Timeout => "timeout",
        EndReason::Cancelled => "cancelled",
        EndReason::AdminForced => "admin_forced",
        EndReason::SystemError => "system_error",
    }
}
