//! Deterministic collaborators for unit tests.
use crate::facade::DataService;
use crate::oracle::ReasoningOracle;
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};

/// Data service answering from per-tool queues. The last queued answer
/// repeats; a tool with no answers fails.
#[derive(Default)]
pub(crate) struct RecordingService {
    responses: RefCell<BTreeMap<String, VecDeque<Value>>>,
    calls: RefCell<Vec<(String, Value)>>,
}

impl RecordingService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, tool: &str, value: Value) -> Self {
        self.responses
            .borrow_mut()
            .entry(tool.to_string())
            .or_default()
            .push_back(value);
        self
    }

    pub(crate) fn calls_to(&self, tool: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|(name, _)| name == tool)
            .count()
    }

    pub(crate) fn tools(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub(crate) fn arguments(&self, tool: &str) -> Vec<Value> {
        self.calls
            .borrow()
            .iter()
            .filter(|(name, _)| name == tool)
            .map(|(_, arguments)| arguments.clone())
            .collect()
    }
}

impl DataService for RecordingService {
    fn call_tool(&self, tool: &str, arguments: &Value) -> Result<Value> {
        self.calls
            .borrow_mut()
            .push((tool.to_string(), arguments.clone()));
        let mut responses = self.responses.borrow_mut();
        let queue = responses
            .get_mut(tool)
            .ok_or_else(|| anyhow!("no response scripted for {tool}"))?;
        let value = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        value.ok_or_else(|| anyhow!("no response scripted for {tool}"))
    }
}

/// Oracle replying from a queue (last reply repeats). `Err` entries fail.
#[derive(Default)]
pub(crate) struct ScriptedOracle {
    replies: RefCell<VecDeque<std::result::Result<String, String>>>,
    calls: RefCell<Vec<(String, String)>>,
}

impl ScriptedOracle {
    pub(crate) fn replying(text: &str) -> Self {
        let oracle = Self::default();
        oracle.replies.borrow_mut().push_back(Ok(text.to_string()));
        oracle
    }

    pub(crate) fn failing(message: &str) -> Self {
        let oracle = Self::default();
        oracle
            .replies
            .borrow_mut()
            .push_back(Err(message.to_string()));
        oracle
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub(crate) fn system_prompts(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|(system, _)| system.clone())
            .collect()
    }

    pub(crate) fn inputs(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|(_, input)| input.clone())
            .collect()
    }
}

impl ReasoningOracle for ScriptedOracle {
    fn generate(&self, system_prompt: &str, input: &str) -> Result<String> {
        self.calls
            .borrow_mut()
            .push((system_prompt.to_string(), input.to_string()));
        let mut replies = self.replies.borrow_mut();
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };
        match reply {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no reply scripted")),
        }
    }
}
