//! Repeated Call Guard
//!
//! Detects the model re-issuing the same tool call with identical arguments.
//! Tracks the last (tool name, argument hash) pair and a consecutive counter;
//! any different call resets it. Hitting the threshold aborts the run rather
//! than injecting a hint, since an evidence lookup that already answered will
//! answer identically forever.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use triage_llm::ToolCall;

#[derive(Debug)]
pub struct RepeatedCallGuard {
    /// Consecutive identical calls tolerated before tripping
    threshold: u32,
    /// Last seen (tool_name, args_hash) tuple
    last_call: Option<(String, u64)>,
    /// Count of consecutive identical calls
    consecutive_count: u32,
}

/// Raised when the guard trips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatedCall {
    pub tool: String,
    pub count: u32,
}

impl RepeatedCallGuard {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            last_call: None,
            consecutive_count: 0,
        }
    }

    /// Record one call; returns `Err` when the threshold is reached.
    pub fn observe(&mut self, call: &ToolCall) -> Result<(), RepeatedCall> {
        let args_hash = hash_arguments(&call.arguments);
        let key = (call.name.clone(), args_hash);

        match &self.last_call {
            Some(last) if *last == key => {
                self.consecutive_count += 1;
            }
            _ => {
                self.last_call = Some(key);
                self.consecutive_count = 1;
            }
        }

        if self.consecutive_count >= self.threshold {
            return Err(RepeatedCall {
                tool: call.name.clone(),
                count: self.consecutive_count,
            });
        }
        Ok(())
    }
}

fn hash_arguments(arguments: &serde_json::Value) -> u64 {
    // serde_json serializes map keys in stored order; canonicalize through
    // the string form of a sorted BTreeMap when the value is an object.
    let canonical = match arguments.as_object() {
        Some(map) => {
            let sorted: std::collections::BTreeMap<_, _> = map.iter().collect();
            serde_json::to_string(&sorted).unwrap_or_default()
        }
        None => arguments.to_string(),
    };
    let mut hasher = DefaultHasher::new();
    canonical.hash(&mut hasher);
    hasher.finish()
}
