use crate::common::entity::VerdictStatus;
use crate::probe::entity::{CheckOutcome, CheckResult, CheckerKind};

use super::entity::{
    CONFIRMED_BASE_CONFIDENCE, CONFIRMED_CORROBORATION_STEP, CONFIRMED_MAX_CONFIDENCE,
    DNS_ONLY_AVAILABLE_CONFIDENCE, LAYER1_TAKEN_CONFIDENCE, LayerPlan,
    RDAP_AVAILABLE_CONFIDENCE, RDAP_TAKEN_CONFIDENCE, Verdict, WHOIS_TAKEN_CONFIDENCE,
};

/// Aggregated signal of one pipeline layer after tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LayerSignal {
    Registered,
    Unregistered,
    Inconclusive,
}

/// Fuses per-layer oracle results into a confidence-scored verdict.
///
/// The engine is pure and stateful-per-check: the async runner feeds it one
/// layer at a time and obeys the returned [`LayerPlan`]. Tie-break rules:
/// two checkers in the same layer that contradict each other downgrade the
/// layer to inconclusive; a deeper layer overrides a shallower one.
#[derive(Debug)]
pub struct FusionEngine {
    prior: VerdictStatus,
    deep_check: bool,
    layer1: Option<LayerSignal>,
    layer2: Option<LayerSignal>,
    results: Vec<CheckResult>,
}

impl FusionEngine {
    /// `prior` is the domain's previous verdict (drives flip confirmation),
    /// `deep_check` the scheduler's priority deep-check flag.
    pub fn new(prior: VerdictStatus, deep_check: bool) -> Self {
        Self {
            prior,
            deep_check,
            layer1: None,
            layer2: None,
            results: Vec::new(),
        }
    }

    /// Absorb layer 1 (DNS + HTTP, any order).
    ///
    /// A registered signal short-circuits to `LikelyTaken` unless the
    /// previous verdict was an available variant, in which case layer 2
    /// must confirm the flip before the downgrade is believed.
    pub fn absorb_layer1(&mut self, results: Vec<CheckResult>) -> LayerPlan {
        let registered = results
            .iter()
            .any(|r| r.outcome == CheckOutcome::Registered);
        let dns_unregistered = results
            .iter()
            .any(|r| r.kind == CheckerKind::Dns && r.outcome == CheckOutcome::Unregistered);

        let signal = if registered && dns_unregistered {
            LayerSignal::Inconclusive
        } else if registered {
            LayerSignal::Registered
        } else if dns_unregistered {
            LayerSignal::Unregistered
        } else {
            LayerSignal::Inconclusive
        };

        self.layer1 = Some(signal);
        self.results.extend(results);

        match signal {
            LayerSignal::Registered => {
                if self.prior.is_available_variant() {
                    // Flip from available to taken: confirm via RDAP first.
                    LayerPlan::Continue
                } else {
                    LayerPlan::Stop(Verdict::new(
                        VerdictStatus::LikelyTaken,
                        LAYER1_TAKEN_CONFIDENCE,
                        self.results.clone(),
                    ))
                }
            }
            LayerSignal::Unregistered | LayerSignal::Inconclusive => LayerPlan::Continue,
        }
    }

    /// Absorb layer 2 (RDAP). Deeper layer: overrides layer 1 on
    /// contradiction.
    pub fn absorb_layer2(&mut self, result: CheckResult) -> LayerPlan {
        let outcome = result.outcome;
        self.results.push(result);

        match outcome {
            CheckOutcome::Registered => {
                self.layer2 = Some(LayerSignal::Registered);
                LayerPlan::Stop(Verdict::new(
                    VerdictStatus::LikelyTaken,
                    RDAP_TAKEN_CONFIDENCE,
                    self.results.clone(),
                ))
            }
            CheckOutcome::Unregistered => {
                self.layer2 = Some(LayerSignal::Unregistered);
                if self.layer1 == Some(LayerSignal::Unregistered) || self.deep_check {
                    // Layers 1+2 agree (or a deep check was requested):
                    // WHOIS gets the final word.
                    LayerPlan::Continue
                } else {
                    LayerPlan::Stop(Verdict::new(
                        VerdictStatus::LikelyAvailable,
                        RDAP_AVAILABLE_CONFIDENCE,
                        self.results.clone(),
                    ))
                }
            }
            CheckOutcome::Inconclusive | CheckOutcome::Error => {
                self.layer2 = Some(LayerSignal::Inconclusive);
                LayerPlan::Continue
            }
        }
    }

    /// Absorb layer 3 (WHOIS) and settle the verdict.
    pub fn absorb_layer3(mut self, result: CheckResult) -> Verdict {
        let outcome = result.outcome;
        self.results.push(result);

        match outcome {
            CheckOutcome::Registered => Verdict::new(
                VerdictStatus::LikelyTaken,
                WHOIS_TAKEN_CONFIDENCE,
                self.results,
            ),
            CheckOutcome::Unregistered => {
                let corroborators = self
                    .results
                    .iter()
                    .filter(|r| {
                        r.kind != CheckerKind::Whois && r.outcome == CheckOutcome::Unregistered
                    })
                    .count();
                if corroborators == 0 {
                    // WHOIS alone, nothing shallower agreeing: availability
                    // is likely but stays unconfirmed.
                    return Verdict::new(
                        VerdictStatus::LikelyAvailable,
                        CONFIRMED_BASE_CONFIDENCE,
                        self.results,
                    );
                }
                let confidence = CONFIRMED_MAX_CONFIDENCE.min(
                    CONFIRMED_BASE_CONFIDENCE
                        + CONFIRMED_CORROBORATION_STEP * corroborators as f64,
                );
                Verdict::new(
                    VerdictStatus::ConfirmedAvailable,
                    confidence,
                    self.results,
                )
            }
            CheckOutcome::Inconclusive | CheckOutcome::Error => self.conclude(),
        }
    }

    /// Settle on the evidence gathered so far. Used when WHOIS was
    /// inconclusive or the per-check deadline ran out mid-pipeline.
    pub fn conclude(self) -> Verdict {
        match (self.layer1, self.layer2) {
            // RDAP's availability signal stands even when WHOIS is down.
            (_, Some(LayerSignal::Unregistered)) => Verdict::new(
                VerdictStatus::LikelyAvailable,
                RDAP_AVAILABLE_CONFIDENCE,
                self.results,
            ),
            (_, Some(LayerSignal::Registered)) => Verdict::new(
                VerdictStatus::LikelyTaken,
                RDAP_TAKEN_CONFIDENCE,
                self.results,
            ),
            // Only NXDOMAIN evidence survives.
            (Some(LayerSignal::Unregistered), _) => Verdict::new(
                VerdictStatus::LikelyAvailable,
                DNS_ONLY_AVAILABLE_CONFIDENCE,
                self.results,
            ),
            // Flip-confirmation path where the deeper layers never answered:
            // the layer-1 taken signal stands at its own confidence.
            (Some(LayerSignal::Registered), _) => Verdict::new(
                VerdictStatus::LikelyTaken,
                LAYER1_TAKEN_CONFIDENCE,
                self.results,
            ),
            _ => Verdict::unknown(self.results),
        }
    }
}
