pub mod chains;
mod score;
mod stack;

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::trace;
use webtrace_types::{
    ActionId, ActionRecord, Attribution, AttributionMethod, CaptureConfig, RequestRecord,
};

use crate::actions::ActionLog;
use crate::capture::NetworkCapture;
use chains::RequestChain;

/// Clock skew absorbed between request and user-gesture timestamps; a
/// request may start this far *before* its action and still match.
const NEGATIVE_TOLERANCE_MS: f64 = 10.0;

/// Maximum gap between a correlated parent's end and a dependent's start.
const CHAIN_GAP_MS: f64 = 100.0;

const PREFLIGHT_INHERIT_CONFIDENCE: f64 = 0.85;
const CHAIN_CONFIDENCE: f64 = 0.5;

/// Threshold above which a timing score counts as semantic evidence.
const SEMANTIC_METHOD_THRESHOLD: f64 = 0.5;

/// An action together with the requests attributed to it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationResult {
    pub action: ActionRecord,
    /// Attributed records, sorted by start time.
    pub requests: Vec<RequestRecord>,
    pub chains: Vec<RequestChain>,
    /// Mean of the member confidences.
    pub confidence: f64,
}

/// Attributes finalized requests to recorded actions using layered
/// evidence: preflight inheritance, stack traces, timing plus semantics,
/// and finally temporal chaining.
#[derive(Debug, Clone)]
pub struct Correlator {
    window_ms: f64,
    min_confidence: f64,
}

impl Correlator {
    pub fn new(window_ms: f64, min_confidence: f64) -> Self {
        Self {
            window_ms,
            min_confidence,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.max_correlation_window_ms, config.min_confidence)
    }

    /// Best attribution for one request given the current request and
    /// action state. Deterministic: the same inputs yield the same output.
    pub fn correlate_request(
        &self,
        request: &RequestRecord,
        requests: &[RequestRecord],
        actions: &[ActionRecord],
    ) -> Option<Attribution> {
        if let Some(attribution) = self.inherit_from_preflight_target(request, requests) {
            return Some(attribution);
        }
        if let Some(attribution) = self.attribute_by_stack(request, actions) {
            return Some(attribution);
        }
        if let Some(attribution) = self.attribute_by_timing(request, actions) {
            return Some(attribution);
        }
        self.attribute_by_request_chain(request, requests)
    }

    /// A preflight belongs to whatever caused the request it clears.
    fn inherit_from_preflight_target(
        &self,
        request: &RequestRecord,
        requests: &[RequestRecord],
    ) -> Option<Attribution> {
        let target_id = request.preflight_for.as_ref()?;
        let target = requests.iter().find(|r| r.request_id == *target_id)?;
        let inherited = target.attribution.as_ref()?;
        Some(Attribution {
            action_id: inherited.action_id,
            confidence: PREFLIGHT_INHERIT_CONFIDENCE,
            method: AttributionMethod::Chain,
        })
    }

    /// Strongest evidence: the initiator stack reaches a user-gesture
    /// frame whose event type is compatible with a nearby action.
    fn attribute_by_stack(
        &self,
        request: &RequestRecord,
        actions: &[ActionRecord],
    ) -> Option<Attribution> {
        let stack = request.initiator.stack.as_ref()?;
        let frame = stack::find_user_event(stack)?;
        let kinds = stack::compatible_kinds(&frame.event);
        if kinds.is_empty() {
            return None;
        }

        let mut best: Option<(&ActionRecord, f64)> = None;
        for action in actions {
            if !kinds.contains(&action.kind) {
                continue;
            }
            if !self.in_window(request, action) {
                continue;
            }
            let distance = (request.timing.start_ms - action.timestamp_ms).abs();
            // Strict comparison keeps the earliest action on equal distance.
            if best.is_none_or(|(_, smallest)| distance < smallest) {
                best = Some((action, distance));
            }
        }

        let (action, _) = best?;
        let confidence = (0.95 - 0.02 * frame.async_depth as f64).max(0.85);
        trace!(
            request = %request.request_id,
            action = %action.id,
            event = %frame.event,
            depth = frame.async_depth,
            "stack-trace attribution"
        );
        Some(Attribution {
            action_id: action.id,
            confidence,
            method: AttributionMethod::StackTrace,
        })
    }

    /// Score window candidates on proximity and request/action semantics.
    fn attribute_by_timing(
        &self,
        request: &RequestRecord,
        actions: &[ActionRecord],
    ) -> Option<Attribution> {
        let mut best: Option<(ActionId, f64)> = None;
        for action in actions {
            if !self.in_window(request, action) {
                continue;
            }
            let candidate = score::score_candidate(request, action);
            if candidate < self.min_confidence {
                continue;
            }
            if best.is_none_or(|(_, score)| candidate > score) {
                best = Some((action.id, candidate));
            }
        }

        let (action_id, confidence) = best?;
        let method = if confidence >= SEMANTIC_METHOD_THRESHOLD {
            AttributionMethod::TimingSemantic
        } else {
            AttributionMethod::TimingOnly
        };
        Some(Attribution {
            action_id,
            confidence,
            method,
        })
    }

    /// Last resort: inherit from a correlated request that finished just
    /// before this one started.
    fn attribute_by_request_chain(
        &self,
        request: &RequestRecord,
        requests: &[RequestRecord],
    ) -> Option<Attribution> {
        let mut parents: Vec<(&RequestRecord, f64)> = requests
            .iter()
            .filter(|candidate| candidate.request_id != request.request_id)
            .filter(|candidate| candidate.attribution.is_some())
            .filter_map(|candidate| candidate.timing.end_ms.map(|end| (candidate, end)))
            .collect();
        parents.sort_by(|a, b| b.1.total_cmp(&a.1));

        let (parent, _) = parents.into_iter().find(|(_, end_ms)| {
            let gap_ms = request.timing.start_ms - end_ms;
            (0.0..=CHAIN_GAP_MS).contains(&gap_ms)
        })?;
        let inherited = parent.attribution.as_ref()?;
        Some(Attribution {
            action_id: inherited.action_id,
            confidence: CHAIN_CONFIDENCE,
            method: AttributionMethod::Chain,
        })
    }

    fn in_window(&self, request: &RequestRecord, action: &ActionRecord) -> bool {
        let delta_ms = request.timing.start_ms - action.timestamp_ms;
        (-NEGATIVE_TOLERANCE_MS..=self.window_ms).contains(&delta_ms)
    }

    /// Attribute every request whose best match is the given action, write
    /// the results back, and detect chains within the group. Returns
    /// `None` when no request matched; that is not an error.
    pub fn correlate_action(
        &self,
        action_id: ActionId,
        capture: &mut NetworkCapture,
        actions: &mut ActionLog,
    ) -> Option<CorrelationResult> {
        actions.get(action_id)?;
        let all_actions = actions.all().to_vec();
        let mut working = capture.snapshot();

        for position in 0..working.len() {
            if working[position].attribution.is_some() {
                continue;
            }
            let attribution =
                self.correlate_request(&working[position], &working, &all_actions);
            if let Some(attribution) = attribution
                && attribution.action_id == action_id
            {
                capture.apply_attribution(&working[position].request_id, attribution.clone());
                working[position].attribution = Some(attribution);
            }
        }

        self.finalize_group(action_id, &working, actions)
    }

    /// Attribute every request that does not yet have an attribution,
    /// then finalize each touched action group. Results are sorted by
    /// action timestamp.
    pub fn correlate_all(
        &self,
        capture: &mut NetworkCapture,
        actions: &mut ActionLog,
    ) -> Vec<CorrelationResult> {
        let all_actions = actions.all().to_vec();
        let mut working = capture.snapshot();
        let mut touched: BTreeSet<ActionId> = BTreeSet::new();

        for position in 0..working.len() {
            if working[position].attribution.is_some() {
                continue;
            }
            let attribution =
                self.correlate_request(&working[position], &working, &all_actions);
            if let Some(attribution) = attribution {
                capture.apply_attribution(&working[position].request_id, attribution.clone());
                touched.insert(attribution.action_id);
                working[position].attribution = Some(attribution);
            }
        }

        let mut results: Vec<CorrelationResult> = touched
            .into_iter()
            .filter_map(|action_id| self.finalize_group(action_id, &working, actions))
            .collect();
        results.sort_by(|a, b| a.action.timestamp_ms.total_cmp(&b.action.timestamp_ms));
        results
    }

    fn finalize_group(
        &self,
        action_id: ActionId,
        working: &[RequestRecord],
        actions: &mut ActionLog,
    ) -> Option<CorrelationResult> {
        let mut members: Vec<RequestRecord> = working
            .iter()
            .filter(|record| {
                record
                    .attribution
                    .as_ref()
                    .is_some_and(|a| a.action_id == action_id)
            })
            .cloned()
            .collect();
        if members.is_empty() {
            return None;
        }
        members.sort_by(|a, b| a.timing.start_ms.total_cmp(&b.timing.start_ms));

        let member_ids: Vec<_> = members.iter().map(|r| r.request_id.clone()).collect();
        actions.set_resulting_requests(action_id, member_ids);
        let action = actions.get(action_id)?.clone();

        let chains = chains::detect_chains(&members);
        let confidence = members
            .iter()
            .filter_map(|record| record.attribution.as_ref())
            .map(|attribution| attribution.confidence)
            .sum::<f64>()
            / members.len() as f64;

        Some(CorrelationResult {
            action,
            requests: members,
            chains,
            confidence,
        })
    }
}
