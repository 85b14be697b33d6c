use webtrace_types::{ActionId, ActionRecord, NewAction, RequestId};

/// Append-only log of user-level actions.
///
/// Ids are assigned from a monotonic counter that survives `clear()`, so
/// an id never refers to two different actions within one process.
#[derive(Debug, Default)]
pub struct ActionLog {
    actions: Vec<ActionRecord>,
    next_id: u64,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, action: NewAction) -> ActionId {
        let id = ActionId::new(self.next_id);
        self.next_id += 1;
        self.actions.push(ActionRecord {
            id,
            kind: action.kind,
            selector: action.selector,
            description: action.description,
            timestamp_ms: action.timestamp_ms,
            page_url: action.page_url,
            resulting_requests: Vec::new(),
        });
        id
    }

    pub fn all(&self) -> &[ActionRecord] {
        &self.actions
    }

    pub fn get(&self, id: ActionId) -> Option<&ActionRecord> {
        self.actions.iter().find(|a| a.id == id)
    }

    /// Actions whose timestamp lies in `[from_ms, to_ms]`.
    pub fn in_window(&self, from_ms: f64, to_ms: f64) -> Vec<&ActionRecord> {
        self.actions
            .iter()
            .filter(|a| a.timestamp_ms >= from_ms && a.timestamp_ms <= to_ms)
            .collect()
    }

    /// Written by the correlator once attribution for an action completes.
    pub fn set_resulting_requests(&mut self, id: ActionId, requests: Vec<RequestId>) {
        if let Some(action) = self.actions.iter_mut().find(|a| a.id == id) {
            action.resulting_requests = requests;
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }
}
