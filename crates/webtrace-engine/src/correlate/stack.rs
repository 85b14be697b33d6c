use webtrace_types::{ActionKind, StackTrace};

/// Bound on async-parent traversal; pathological or cyclic inputs cannot
/// loop past this.
const MAX_ASYNC_DEPTH: usize = 50;

/// Frame descriptions the runtime assigns to user-gesture async roots.
const USER_EVENT_NAMES: [&str; 16] = [
    "click",
    "dblclick",
    "mousedown",
    "mouseup",
    "submit",
    "input",
    "change",
    "keydown",
    "keyup",
    "keypress",
    "touchstart",
    "touchend",
    "pointerdown",
    "pointerup",
    "focus",
    "blur",
];

/// The user-gesture frame a stack walk found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEventFrame {
    /// Lowercased DOM event name.
    pub event: String,
    /// Number of async-parent hops traversed to reach it.
    pub async_depth: usize,
}

/// Walk a stack's synchronous frames and then its async-parent chain,
/// looking for the user gesture that scheduled this request.
pub fn find_user_event(stack: &StackTrace) -> Option<UserEventFrame> {
    let mut current = Some(stack);
    let mut depth = 0usize;
    while let Some(trace) = current {
        if depth > MAX_ASYNC_DEPTH {
            break;
        }
        if let Some(description) = &trace.description {
            let lowered = description.trim().to_ascii_lowercase();
            if USER_EVENT_NAMES.contains(&lowered.as_str()) {
                return Some(UserEventFrame {
                    event: lowered,
                    async_depth: depth,
                });
            }
        }
        current = trace.parent.as_deref();
        depth += 1;
    }
    None
}

/// Action kinds a user-event frame can vouch for. Events outside this
/// table carry no attribution weight and fall through to timing evidence.
pub fn compatible_kinds(event: &str) -> &'static [ActionKind] {
    match event {
        "click" => &[ActionKind::Click],
        "submit" => &[ActionKind::Submit, ActionKind::Navigate],
        "input" | "change" | "keydown" => &[ActionKind::Type],
        _ => &[],
    }
}
