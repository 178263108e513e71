use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::runtime::ending::Ending;
use crate::runtime::parameter::Parameter;

pub type NodeIndex = usize;

/// Immutable graph template. Instances copy what they need from it on trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    pub id: String,
    pub name: String,
    pub nodes: Vec<BlueprintNode>,
    #[serde(default)]
    pub start_index: NodeIndex,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub settings: ListSettings,
}

/// Template node. `params` is handed to the factory registered under `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintNode {
    pub kind: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default = "single_continue")]
    pub endings: Vec<Ending>,
    #[serde(default)]
    pub params: Value,
}

fn enabled_by_default() -> bool {
    true
}

fn single_continue() -> Vec<Ending> {
    vec![Ending::Continue]
}

impl BlueprintNode {
    pub fn new(kind: impl Into<String>, params: Value) -> Self {
        Self {
            kind: kind.into(),
            id: String::new(),
            title: String::new(),
            enabled: true,
            endings: single_continue(),
            params,
        }
    }

    pub fn with_endings(mut self, endings: Vec<Ending>) -> Self {
        self.endings = endings;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ListMode {
    /// Blocks gameplay while running. Only these lists can be skipped.
    #[default]
    PauseGameplay,
    RunInBackground,
}

/// Execution flags carried from the template to every instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListSettings {
    pub mode: ListMode,
    pub skippable: bool,
    pub multi_instance: bool,
    pub survive_scene_change: bool,
    /// Keep scaled-time waits while pause menus freeze the game.
    pub unfreeze_pause_menus: Option<bool>,
    /// Seconds to wait before the first node when started from index 0.
    pub start_delay: f32,
}

impl Default for ListSettings {
    fn default() -> Self {
        Self {
            mode: ListMode::PauseGameplay,
            skippable: true,
            multi_instance: false,
            survive_scene_change: false,
            unfreeze_pause_menus: None,
            start_delay: 0.0,
        }
    }
}

impl ListSettings {
    pub fn is_skippable(&self) -> bool {
        self.mode == ListMode::PauseGameplay && self.skippable
    }
}
