//! Four-stage gate pipeline and the decision log.
//!
//! ```text
//! NEW -> G1 baseline --fired--> REJECT (terminal)
//!          | pass
//!          +-> G2 value conflict \  independent advisory flags
//!          +-> G3 staleness      /
//!          +-> G4 arbitration -> ALLOW | ALLOW_RATIONALE | HOLD | OVERRIDE | ALLOW_RITUAL
//! ```
//!
//! G4 is the only stage that sees the system-level collapse flag. Identical
//! flags demand a substantive rationale in the stable regime and get a
//! rubber stamp once `nc >= critical_nc`.

use std::collections::VecDeque;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::config::AltrionConfig;
use crate::fmt::{fmt_fixed, fmt_signed_fixed};
use crate::model::{clamp, smoothstep, Metrics, ModelInputs};
use crate::particles::GateMark;
use crate::prng::RandomSource;

pub const G1_RATIONALE: &str = "Baseline constraint triggered.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Decision {
    Allow,
    Hold,
    Reject,
    AllowRitual,
    AllowRationale,
    Override,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Hold => "HOLD",
            Decision::Reject => "REJECT",
            Decision::AllowRitual => "ALLOW_RITUAL",
            Decision::AllowRationale => "ALLOW_RATIONALE",
            Decision::Override => "OVERRIDE",
        }
    }
}

/// How G4 behaved for a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum ArbitrationMode {
    Substantive,
    Ritualized,
}

/// Synthetic case inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct CaseInputs {
    /// Magnitude delta; positive means the proposal grows something.
    pub delta_m: f64,
    /// Value delta; below `theta` it conflicts with stated priorities.
    pub delta_p: f64,
    pub age_hours: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct GateOutcome {
    pub fired: bool,
    pub label: &'static str,
}

impl GateOutcome {
    const NOT_EVALUATED: GateOutcome = GateOutcome {
        fired: false,
        label: "Not_Evaluated",
    };
    const PASS: GateOutcome = GateOutcome {
        fired: false,
        label: "Pass",
    };

    fn flag(fired: bool, label: &'static str) -> Self {
        if fired {
            GateOutcome { fired, label }
        } else {
            GateOutcome::PASS
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct GateOutcomes {
    #[cfg_attr(feature = "serde", serde(rename = "G1"))]
    pub g1: GateOutcome,
    #[cfg_attr(feature = "serde", serde(rename = "G2"))]
    pub g2: GateOutcome,
    #[cfg_attr(feature = "serde", serde(rename = "G3"))]
    pub g3: GateOutcome,
    #[cfg_attr(feature = "serde", serde(rename = "G4"))]
    pub g4: GateOutcome,
}

impl GateOutcomes {
    /// Any advisory flag (G2/G3) fired.
    pub fn flagged(&self) -> bool {
        self.g2.fired || self.g3.fired
    }

    /// Index (0..4) of the furthest-downstream gate that fired.
    pub fn last_fired(&self) -> Option<usize> {
        [self.g1, self.g2, self.g3, self.g4]
            .iter()
            .rposition(|g| g.fired)
    }
}

/// What the system looked like when the case was decided.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct CaseContext {
    pub preset: &'static str,
    pub gamma: f64,
    pub workload: f64,
    pub friction: f64,
    pub nc: f64,
    pub error: f64,
    pub critical_nc: f64,
}

/// Result of running one case through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub gates: GateOutcomes,
    pub decision: Decision,
    pub mode: Option<ArbitrationMode>,
    pub auditable: bool,
    pub rationale: Option<String>,
}

impl Evaluation {
    /// Where the flow panel should show this outcome.
    pub fn token_mark(&self) -> Option<GateMark> {
        if self.gates.g1.fired {
            Some(GateMark::Reject)
        } else if self.gates.g2.fired {
            Some(GateMark::Flag { gate: 1 })
        } else if self.gates.g3.fired {
            Some(GateMark::Flag { gate: 2 })
        } else {
            None
        }
    }
}

/// Immutable audit entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseRecord {
    pub id: String,
    pub seq: u64,
    /// RFC 3339, millisecond precision.
    pub timestamp: String,
    pub context: CaseContext,
    pub inputs: CaseInputs,
    pub gates: GateOutcomes,
    pub decision: Decision,
    pub mode: Option<ArbitrationMode>,
    pub auditable: bool,
    pub rationale: Option<String>,
    /// One-line rendering for the log panel.
    pub summary: String,
}

pub fn case_id(seq: u64) -> String {
    format!("case-{seq:04}")
}

/// Probability that the baseline constraint is breached for the next case.
pub fn g1_probability(nc: f64, err: f64, critical_nc: f64) -> f64 {
    let proximity = smoothstep(clamp(nc / critical_nc, 0.0, 1.0));
    clamp(0.02 + 0.10 * err + 0.08 * proximity, 0.0, 0.5)
}

/// Draw case inputs biased by the current smoothed state.
pub fn synthesize_inputs<R: RandomSource + ?Sized>(
    rng: &mut R,
    metrics: &Metrics,
    inputs: &ModelInputs,
) -> CaseInputs {
    let delta_m = rng.range(-0.25, 0.75);
    let delta_p = rng.range(-0.45, 0.35) - 0.20 * metrics.nc;
    let age_hours = rng.range(0.0, 96.0) * (0.55 + 0.90 * inputs.workload);
    CaseInputs {
        delta_m,
        delta_p,
        age_hours,
    }
}

fn rationale_template(g2: bool, g3: bool) -> &'static str {
    match (g2, g3) {
        (true, true) => {
            "Value conflict and stale context reviewed; magnitude gain outweighs the priority drop on current data."
        }
        (true, false) => "Value conflict reviewed; magnitude gain justified against stated priorities.",
        (false, true) => "Context re-verified against current state before acceptance.",
        (false, false) => "Near-critical load: decision reviewed and rationale recorded.",
    }
}

/// Run one case through G1..G4.
///
/// `pending_override` is a user override waiting for a case that needs one;
/// it is taken when G4 consumes it.
pub fn evaluate<R: RandomSource + ?Sized>(
    cfg: &AltrionConfig,
    metrics: &Metrics,
    case: &CaseInputs,
    pending_override: &mut Option<String>,
    rng: &mut R,
) -> Evaluation {
    // G1: hard gate, short-circuits everything downstream.
    let p_reject = g1_probability(metrics.nc, metrics.err, cfg.critical_nc);
    if rng.chance(p_reject) {
        return Evaluation {
            gates: GateOutcomes {
                g1: GateOutcome {
                    fired: true,
                    label: "Baseline_Constraint_Breach",
                },
                g2: GateOutcome::NOT_EVALUATED,
                g3: GateOutcome::NOT_EVALUATED,
                g4: GateOutcome::NOT_EVALUATED,
            },
            decision: Decision::Reject,
            mode: None,
            auditable: true,
            rationale: Some(G1_RATIONALE.to_string()),
        };
    }

    let g2 = case.delta_p < cfg.theta && case.delta_m > 0.0;
    let g3 = case.age_hours > cfg.tau_hours;
    let flagged = g2 || g3;

    let mut gates = GateOutcomes {
        g1: GateOutcome::PASS,
        g2: GateOutcome::flag(g2, "Metric_Imbalance_High"),
        g3: GateOutcome::flag(g3, "Freshness_Threshold_Breach"),
        g4: GateOutcome::PASS,
    };

    // G4: arbitration.
    if metrics.is_collapsed(cfg.critical_nc) {
        // Overrides are swallowed by the ritual.
        pending_override.take();
        gates.g4 = GateOutcome {
            fired: flagged,
            label: "Ritualized_Rubber_Stamp",
        };
        return Evaluation {
            gates,
            decision: Decision::AllowRitual,
            mode: Some(ArbitrationMode::Ritualized),
            auditable: !flagged,
            rationale: None,
        };
    }

    let rationale_required = flagged || metrics.nc >= cfg.near_critical_nc();
    if !rationale_required {
        return Evaluation {
            gates,
            decision: Decision::Allow,
            mode: Some(ArbitrationMode::Substantive),
            auditable: true,
            rationale: None,
        };
    }

    gates.g4 = GateOutcome {
        fired: true,
        label: "Rationale_Required",
    };

    let (decision, auditable, rationale) = match pending_override.take() {
        Some(text) if text.trim().is_empty() => (Decision::AllowRitual, false, None),
        Some(text) => (Decision::Override, true, Some(text.trim().to_string())),
        None if rng.chance(metrics.engagement) => (
            Decision::AllowRationale,
            true,
            Some(rationale_template(g2, g3).to_string()),
        ),
        None => (Decision::Hold, true, None),
    };

    Evaluation {
        gates,
        decision,
        mode: Some(ArbitrationMode::Substantive),
        auditable,
        rationale,
    }
}

/// Log-panel line for a decided case.
pub fn summarize(id: &str, inputs: &CaseInputs, eval: &Evaluation) -> String {
    let mut fired: Vec<&str> = Vec::new();
    for (name, g) in [
        ("G1", eval.gates.g1),
        ("G2", eval.gates.g2),
        ("G3", eval.gates.g3),
    ] {
        if g.fired {
            fired.push(name);
        }
    }
    let flags = if fired.is_empty() {
        "clear".to_string()
    } else {
        fired.join(",")
    };
    let mut line = format!(
        "{id} Δm={} Δp={} age={}h [{flags}] → {}",
        fmt_signed_fixed(inputs.delta_m, 2),
        fmt_signed_fixed(inputs.delta_p, 2),
        fmt_fixed(inputs.age_hours, 0),
        eval.decision.as_str(),
    );
    if let Some(r) = &eval.rationale {
        line.push_str(" | R=\"");
        line.push_str(r);
        line.push('"');
    }
    line
}

/// Bounded ring buffer of decided cases.
#[derive(Debug, Clone)]
pub struct CaseLog {
    capacity: usize,
    records: VecDeque<CaseRecord>,
}

impl CaseLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: CaseRecord) {
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&CaseRecord> {
        self.records.back()
    }

    /// Display order.
    pub fn newest_first(&self) -> impl Iterator<Item = &CaseRecord> {
        self.records.iter().rev()
    }

    /// Export order.
    pub fn chronological(&self) -> impl Iterator<Item = &CaseRecord> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prng::Prng;

    /// Replays a fixed list of uniform samples.
    struct Scripted(Vec<f64>, usize);

    impl RandomSource for Scripted {
        fn next_f64(&mut self) -> f64 {
            let v = self.0[self.1 % self.0.len()];
            self.1 += 1;
            v
        }
    }

    fn metrics(nc: f64) -> Metrics {
        Metrics {
            nc,
            err: 0.3,
            engagement: 0.6,
        }
    }

    const FLAGGED_BOTH: CaseInputs = CaseInputs {
        delta_m: 0.4,
        delta_p: -0.35,
        age_hours: 90.0,
    };

    const CLEAN: CaseInputs = CaseInputs {
        delta_m: 0.1,
        delta_p: 0.1,
        age_hours: 10.0,
    };

    // First sample is the G1 draw: 0.99 never rejects.
    fn no_reject() -> Scripted {
        Scripted(vec![0.99], 0)
    }

    #[test]
    fn g1_short_circuits_to_auditable_reject() {
        let cfg = AltrionConfig::default();
        let mut rng = Scripted(vec![0.0], 0);
        let mut pending = Some("ignored".to_string());
        let eval = evaluate(&cfg, &metrics(0.8), &FLAGGED_BOTH, &mut pending, &mut rng);
        assert_eq!(eval.decision, Decision::Reject);
        assert!(eval.auditable);
        assert!(eval.gates.g1.fired);
        assert_eq!(eval.gates.g2, GateOutcome::NOT_EVALUATED);
        assert_eq!(eval.gates.g4, GateOutcome::NOT_EVALUATED);
        assert_eq!(eval.rationale.as_deref(), Some(G1_RATIONALE));
        // Override untouched by a rejected case.
        assert!(pending.is_some());
        assert_eq!(eval.token_mark(), Some(GateMark::Reject));
    }

    #[test]
    fn same_flags_diverge_between_regimes() {
        let cfg = AltrionConfig::default();

        let mut pending = None;
        let stable = evaluate(&cfg, &metrics(0.20), &FLAGGED_BOTH, &mut pending, &mut no_reject());
        assert_eq!(stable.mode, Some(ArbitrationMode::Substantive));
        assert!(stable.gates.g4.fired);
        assert_eq!(stable.gates.g4.label, "Rationale_Required");
        // 0.99 > engagement: reviewer does not answer, case is held.
        assert_eq!(stable.decision, Decision::Hold);
        assert!(stable.auditable);

        let collapsed = evaluate(&cfg, &metrics(0.45), &FLAGGED_BOTH, &mut pending, &mut no_reject());
        assert_eq!(collapsed.mode, Some(ArbitrationMode::Ritualized));
        assert_eq!(collapsed.decision, Decision::AllowRitual);
        assert!(collapsed.rationale.is_none());
        assert!(!collapsed.auditable);
        assert_eq!(stable.gates.g2, collapsed.gates.g2);
        assert_eq!(stable.gates.g3, collapsed.gates.g3);
    }

    #[test]
    fn collapsed_is_ritualized_regardless_of_flags() {
        let cfg = AltrionConfig::default();
        for case in [FLAGGED_BOTH, CLEAN] {
            let mut pending = Some("please review".to_string());
            let eval = evaluate(&cfg, &metrics(cfg.critical_nc), &case, &mut pending, &mut no_reject());
            assert_eq!(eval.mode, Some(ArbitrationMode::Ritualized));
            assert_eq!(eval.decision, Decision::AllowRitual);
            assert!(eval.rationale.is_none());
            assert!(pending.is_none());
        }
    }

    #[test]
    fn stable_and_unflagged_needs_no_rationale() {
        let cfg = AltrionConfig::default();
        let mut pending = None;
        let nc = cfg.critical_nc * 0.9 - 1e-6;
        let eval = evaluate(&cfg, &metrics(nc), &CLEAN, &mut pending, &mut no_reject());
        assert_eq!(eval.decision, Decision::Allow);
        assert!(!eval.gates.g4.fired);
        assert!(eval.rationale.is_none());
        assert!(eval.auditable);
    }

    #[test]
    fn near_critical_requires_rationale_without_flags() {
        let cfg = AltrionConfig::default();
        let mut pending = None;
        // Second draw (reviewer) 0.1 < engagement.
        let mut rng = Scripted(vec![0.99, 0.1], 0);
        let eval = evaluate(&cfg, &metrics(0.38), &CLEAN, &mut pending, &mut rng);
        assert_eq!(eval.decision, Decision::AllowRationale);
        assert!(eval.rationale.is_some());
    }

    #[test]
    fn override_with_text_is_justified_blank_is_ritual() {
        let cfg = AltrionConfig::default();

        let mut pending = Some("  Manual check of vendor data.  ".to_string());
        let eval = evaluate(&cfg, &metrics(0.2), &FLAGGED_BOTH, &mut pending, &mut no_reject());
        assert_eq!(eval.decision, Decision::Override);
        assert_eq!(eval.rationale.as_deref(), Some("Manual check of vendor data."));
        assert!(eval.auditable);
        assert!(pending.is_none());

        let mut pending = Some("   ".to_string());
        let eval = evaluate(&cfg, &metrics(0.2), &FLAGGED_BOTH, &mut pending, &mut no_reject());
        assert_eq!(eval.decision, Decision::AllowRitual);
        assert!(!eval.auditable);
    }

    #[test]
    fn override_waits_for_a_case_that_needs_it() {
        let cfg = AltrionConfig::default();
        let mut pending = Some("later".to_string());
        let eval = evaluate(&cfg, &metrics(0.1), &CLEAN, &mut pending, &mut no_reject());
        assert_eq!(eval.decision, Decision::Allow);
        assert_eq!(pending.as_deref(), Some("later"));
    }

    #[test]
    fn g2_needs_positive_magnitude() {
        let cfg = AltrionConfig::default();
        let mut pending = None;
        let case = CaseInputs {
            delta_m: -0.1,
            delta_p: -0.4,
            age_hours: 1.0,
        };
        let eval = evaluate(&cfg, &metrics(0.1), &case, &mut pending, &mut no_reject());
        assert!(!eval.gates.g2.fired);
        assert_eq!(eval.decision, Decision::Allow);
    }

    #[test]
    fn g1_probability_grows_with_error_and_proximity() {
        let c = 0.40;
        assert!(g1_probability(0.1, 0.5, c) > g1_probability(0.1, 0.1, c));
        assert!(g1_probability(0.39, 0.2, c) > g1_probability(0.1, 0.2, c));
        assert!(g1_probability(1.0, 1.0, c) <= 0.5);
    }

    #[test]
    fn synthesized_inputs_are_reproducible() {
        let m = Metrics::INITIAL;
        let i = ModelInputs::default();
        let a = synthesize_inputs(&mut Prng::new(11), &m, &i);
        let b = synthesize_inputs(&mut Prng::new(11), &m, &i);
        assert_eq!(a, b);
        assert!((-0.25..0.75).contains(&a.delta_m));
        assert!(a.age_hours >= 0.0);
    }

    #[test]
    fn case_log_is_bounded_and_ordered() {
        let mut log = CaseLog::new(3);
        for seq in 1..=5u64 {
            let eval = Evaluation {
                gates: GateOutcomes {
                    g1: GateOutcome::PASS,
                    g2: GateOutcome::PASS,
                    g3: GateOutcome::PASS,
                    g4: GateOutcome::PASS,
                },
                decision: Decision::Allow,
                mode: Some(ArbitrationMode::Substantive),
                auditable: true,
                rationale: None,
            };
            let id = case_id(seq);
            log.push(CaseRecord {
                summary: summarize(&id, &CLEAN, &eval),
                id,
                seq,
                timestamp: String::new(),
                context: CaseContext {
                    preset: "steady",
                    gamma: 0.5,
                    workload: 0.55,
                    friction: 0.62,
                    nc: 0.1,
                    error: 0.1,
                    critical_nc: 0.4,
                },
                inputs: CLEAN,
                gates: eval.gates,
                decision: eval.decision,
                mode: eval.mode,
                auditable: eval.auditable,
                rationale: None,
            });
        }
        assert_eq!(log.len(), 3);
        let newest: Vec<u64> = log.newest_first().map(|r| r.seq).collect();
        assert_eq!(newest, vec![5, 4, 3]);
        let chrono: Vec<&str> = log.chronological().map(|r| r.id.as_str()).collect();
        assert_eq!(chrono, vec!["case-0003", "case-0004", "case-0005"]);
        assert!(log.latest().unwrap().summary.starts_with("case-0005 Δm=+0.10"));
    }
}
