use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use dashmap::DashMap;
use tracing::{debug, error, info, warn};
use crate::config::EngineConfig;
use crate::runtime::blueprint::{Blueprint, ListMode, NodeIndex};
use crate::runtime::clock::Clock;
use crate::runtime::context::{InstanceId, Services};
use crate::runtime::error::EngineError;
use crate::runtime::events::EventBus;
use crate::runtime::list::{ActionList, ListState};
use crate::runtime::node::{ActionDefinition, ActionNode};
use crate::runtime::parameter::ParameterValue;
use crate::runtime::registry::ActiveListManager;
use crate::runtime::storage::SaveSlot;
use crate::runtime::syscall::{Command, Syscall};
use crate::runtime::variables::{VarScope, Variables};

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// How to start a graph.
#[derive(Debug, Clone)]
pub struct TriggerOptions {
    /// Defaults to the graph's own start index.
    pub start_index: Option<NodeIndex>,
    pub add_to_skip_queue: bool,
    pub conversation_on_end: Option<String>,
    /// Overrides applied to the instance's parameters before it starts.
    pub parameters: Vec<(i32, ParameterValue)>,
    /// Run to completion instantly instead of starting normally.
    pub skip: bool,
}

impl Default for TriggerOptions {
    fn default() -> Self {
        Self {
            start_index: None,
            add_to_skip_queue: true,
            conversation_on_end: None,
            parameters: Vec::new(),
            skip: false,
        }
    }
}

impl TriggerOptions {
    pub fn from_index(start_index: NodeIndex) -> Self {
        Self { start_index: Some(start_index), ..Self::default() }
    }

    pub fn with_parameter(mut self, id: i32, value: ParameterValue) -> Self {
        self.parameters.push((id, value));
        self
    }

    pub fn with_conversation(mut self, conversation: impl Into<String>) -> Self {
        self.conversation_on_end = Some(conversation.into());
        self
    }
}

pub struct Engine {
    config: EngineConfig,
    // Raw templates
    blueprints: DashMap<String, Arc<Blueprint>>,
    // Factories by node kind
    node_registry: HashMap<String, Box<dyn ActionDefinition>>,
    // Parked nodes of single-instance graphs, prototypes of multi-instance ones
    executable_cache: HashMap<String, Vec<ActionNode>>,
    instances: Vec<ActionList>,
    disabled: HashSet<String>,
    registry: ActiveListManager,
    events: EventBus,
    clock: Clock,
    variables: Variables,
    syscall: Syscall,
    scene_loading: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            blueprints: DashMap::new(),
            node_registry: HashMap::new(),
            executable_cache: HashMap::new(),
            instances: Vec::new(),
            disabled: HashSet::new(),
            registry: ActiveListManager::new(),
            events: EventBus::new(),
            clock: Clock::new(),
            variables: Variables::new(),
            syscall: Syscall::new(),
            scene_loading: false,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn register_blueprint(&mut self, blueprint: Blueprint) {
        let id = blueprint.id.clone();
        if self.instances.iter().any(|l| l.graph_id() == id) {
            debug!(graph = %id, "Replacing blueprint with live instances; they keep the old nodes");
        }
        self.blueprints.insert(id.clone(), Arc::new(blueprint));
        self.executable_cache.remove(&id);
    }

    pub fn blueprint(&self, graph_id: &str) -> Option<Arc<Blueprint>> {
        self.blueprints.get(graph_id).map(|b| b.value().clone())
    }

    pub fn blueprint_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.blueprints.iter().map(|b| b.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn register_node(&mut self, definition: Box<dyn ActionDefinition>) {
        self.node_registry.insert(definition.name().to_string(), definition);
    }

    pub fn has_node_kind(&self, kind: &str) -> bool {
        self.node_registry.contains_key(kind)
    }

    /// Checks that every node kind is registered and accepts its params.
    pub fn validate_blueprint(&self, blueprint: &Blueprint) -> EngineResult<()> {
        for (index, node) in blueprint.nodes.iter().enumerate() {
            let def = self.node_registry.get(&node.kind).ok_or_else(|| EngineError::UnknownNodeKind {
                graph: blueprint.id.clone(),
                index,
                kind: node.kind.clone(),
            })?;
            def.validate(&node.params).map_err(|e| EngineError::InvalidNode {
                graph: blueprint.id.clone(),
                index,
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn registry(&self) -> &ActiveListManager {
        &self.registry
    }

    pub fn instances(&self) -> impl Iterator<Item = &ActionList> {
        self.instances.iter()
    }

    pub fn instance(&self, id: InstanceId) -> Option<&ActionList> {
        self.instances.iter().find(|l| l.id() == id)
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut ActionList> {
        self.instances.iter_mut().find(|l| l.id() == id)
    }

    pub fn instances_of(&self, graph_id: &str) -> Vec<InstanceId> {
        self.instances.iter().filter(|l| l.graph_id() == graph_id).map(ActionList::id).collect()
    }

    pub fn is_running(&self, id: InstanceId) -> bool {
        self.instance(id).is_some_and(ActionList::is_running)
    }

    pub fn is_graph_running(&self, graph_id: &str) -> bool {
        self.registry.is_graph_running(graph_id)
    }

    /// True while any gameplay-blocking list is running.
    pub fn is_gameplay_blocked(&self) -> bool {
        self.instances
            .iter()
            .any(|l| l.is_running() && l.settings().mode == ListMode::PauseGameplay)
    }

    pub fn set_graph_enabled(&mut self, graph_id: &str, enabled: bool) {
        if enabled {
            self.disabled.remove(graph_id);
        } else {
            self.disabled.insert(graph_id.to_string());
        }
    }

    pub fn is_graph_enabled(&self, graph_id: &str) -> bool {
        !self.disabled.contains(graph_id)
    }

    pub fn trigger(&mut self, graph_id: &str, options: TriggerOptions) -> EngineResult<InstanceId> {
        let id = self.start_internal(graph_id, options)?;
        self.flush_commands();
        self.collect_finished();
        Ok(id)
    }

    pub fn interact(&mut self, graph_id: &str) -> EngineResult<InstanceId> {
        self.trigger(graph_id, TriggerOptions::default())
    }

    pub fn interact_from(&mut self, graph_id: &str, start_index: NodeIndex, add_to_skip_queue: bool) -> EngineResult<InstanceId> {
        self.trigger(graph_id, TriggerOptions { add_to_skip_queue, ..TriggerOptions::from_index(start_index) })
    }

    pub fn run_from_index(&mut self, graph_id: &str, start_index: NodeIndex) -> EngineResult<InstanceId> {
        self.interact_from(graph_id, start_index, true)
    }

    /// Skips an instance from the index it was started at.
    pub fn skip(&mut self, id: InstanceId) -> EngineResult<()> {
        let start = self.instance(id).map(ActionList::start_index).ok_or(EngineError::UnknownInstance(id))?;
        self.skip_from(id, start)
    }

    pub fn skip_from(&mut self, id: InstanceId, start_index: NodeIndex) -> EngineResult<()> {
        self.with_list(id, |list, sv| list.skip(start_index, sv))
            .ok_or(EngineError::UnknownInstance(id))?;
        self.flush_commands();
        self.collect_finished();
        Ok(())
    }

    /// Skips everything in the skip queue, in registration order.
    pub fn skip_all(&mut self) {
        let requests = self.registry.take_skip_queue();
        info!(count = requests.len(), "Skipping queued lists");
        for request in requests {
            let target = match request.instance_id.filter(|id| self.instance(*id).is_some()) {
                Some(id) => Some(id),
                None => match self.spawn(&request.graph_id) {
                    Ok(id) => Some(id),
                    Err(e) => {
                        warn!(graph = %request.graph_id, error = %e, "Cannot skip queued list");
                        None
                    }
                },
            };
            if let Some(id) = target {
                self.with_list(id, |list, sv| {
                    if request.conversation_on_end.is_some() {
                        list.set_conversation_on_end(request.conversation_on_end.clone());
                    }
                    list.skip(request.start_index, sv);
                });
            }
            self.flush_commands();
        }
        self.collect_finished();
    }

    pub fn pause(&mut self, id: InstanceId) -> EngineResult<()> {
        self.with_list(id, |list, sv| list.pause(sv)).ok_or(EngineError::UnknownInstance(id))?;
        self.flush_commands();
        self.collect_finished();
        Ok(())
    }

    pub fn resume(
        &mut self,
        id: InstanceId,
        start_index: NodeIndex,
        resume_indices: &[NodeIndex],
        parameter_data: &str,
        rerun_actions: bool,
    ) -> EngineResult<()> {
        self.with_list(id, |list, sv| list.resume(start_index, resume_indices, parameter_data, rerun_actions, sv))
            .ok_or(EngineError::UnknownInstance(id))?;
        self.flush_commands();
        self.collect_finished();
        Ok(())
    }

    /// Resumes every paused run of a graph, including runs restored from a save.
    pub fn resume_paused(&mut self, graph_id: &str, rerun_actions: bool) -> EngineResult<Vec<InstanceId>> {
        let resumed = self.resume_paused_internal(graph_id, rerun_actions)?;
        self.flush_commands();
        self.collect_finished();
        Ok(resumed)
    }

    pub fn kill(&mut self, id: InstanceId) -> EngineResult<()> {
        self.with_list(id, |list, sv| list.kill(sv)).ok_or(EngineError::UnknownInstance(id))?;
        self.release_instance(id);
        self.flush_commands();
        self.collect_finished();
        Ok(())
    }

    /// Kills every instance of a graph and forgets its restored records. Returns the number killed.
    pub fn kill_graph(&mut self, graph_id: &str) -> usize {
        let killed = self.kill_graph_internal(graph_id);
        self.flush_commands();
        self.collect_finished();
        killed
    }

    pub fn kill_all(&mut self) {
        for id in self.instances.iter().map(ActionList::id).collect::<Vec<_>>() {
            self.with_list(id, |list, sv| list.kill(sv));
            self.release_instance(id);
        }
        self.registry.clear();
        self.syscall.drain();
    }

    /// Resets an instance's registry record, halting the instance without events.
    pub fn reset_record(&mut self, id: InstanceId, remove_from_skip_queue: bool) -> EngineResult<()> {
        let Engine { instances, registry, .. } = self;
        let record = registry.record_mut(id).ok_or(EngineError::UnknownInstance(id))?;
        let list = instances.iter_mut().find(|l| l.id() == id);
        record.reset(list, remove_from_skip_queue);
        self.registry.purge();
        self.collect_finished();
        Ok(())
    }

    pub fn tick(&mut self, delta: Duration) {
        self.clock.advance(delta);
        let ids: Vec<InstanceId> = self.instances.iter().map(ActionList::id).collect();
        for id in ids {
            self.with_list(id, |list, sv| list.update(sv));
            self.flush_commands();
        }
        self.collect_finished();
    }

    pub fn begin_scene_change(&mut self) {
        info!("Scene change started");
        self.scene_loading = true;
    }

    pub fn end_scene_change(&mut self) {
        info!("Scene change finished");
        self.scene_loading = false;
    }

    pub fn is_scene_loading(&self) -> bool {
        self.scene_loading
    }

    /// Serialises every resumable or queued record. Running lists are left out.
    pub fn save_data(&self) -> String {
        self.registry.save_data()
    }

    /// Kills everything and replaces the registry with the saved records.
    pub fn load_data(&mut self, data: &str) {
        self.kill_all();
        self.registry.load_data(data);
    }

    pub fn save_slot(&self) -> SaveSlot {
        SaveSlot {
            active_lists: self.save_data(),
            global_variables: self.variables.snapshot(VarScope::Global),
        }
    }

    pub fn load_slot(&mut self, slot: SaveSlot) {
        self.load_data(&slot.active_lists);
        self.variables.restore(VarScope::Global, slot.global_variables);
    }

    fn start_internal(&mut self, graph_id: &str, options: TriggerOptions) -> EngineResult<InstanceId> {
        if !self.blueprints.contains_key(graph_id) {
            return Err(EngineError::UnknownGraph(graph_id.to_string()));
        }
        if self.disabled.contains(graph_id) {
            warn!(graph = graph_id, "Graph is disabled, trigger ignored");
            return Err(EngineError::Disabled(graph_id.to_string()));
        }

        let id = self.spawn(graph_id)?;
        self.with_list(id, |list, sv| {
            if options.conversation_on_end.is_some() {
                list.set_conversation_on_end(options.conversation_on_end.clone());
            }
            for (param_id, value) in &options.parameters {
                if !list.parameters_mut().set(*param_id, value.clone()) {
                    warn!(graph = %list.graph_id(), param_id, "Parameter override not applied");
                }
            }
            let start = options.start_index.unwrap_or(list.default_start());
            if options.skip {
                list.skip(start, sv);
            } else {
                list.interact(start, options.add_to_skip_queue, sv);
            }
        });
        Ok(id)
    }

    /// Finds or creates the instance a trigger should run on.
    fn spawn(&mut self, graph_id: &str) -> EngineResult<InstanceId> {
        let blueprint = self.blueprint(graph_id).ok_or_else(|| EngineError::UnknownGraph(graph_id.to_string()))?;

        let nodes = if blueprint.settings.multi_instance {
            if !self.executable_cache.contains_key(graph_id) {
                let prototype = self.prepare_nodes(&blueprint);
                self.executable_cache.insert(graph_id.to_string(), prototype);
            }
            self.executable_cache.get(graph_id).cloned().unwrap_or_default()
        } else {
            if let Some(existing) = self.instances.iter().find(|l| l.graph_id() == graph_id) {
                return Ok(existing.id());
            }
            match self.executable_cache.remove(graph_id) {
                Some(parked) => parked,
                None => self.prepare_nodes(&blueprint),
            }
        };

        let list = ActionList::from_template(blueprint, nodes);
        let id = list.id();
        debug!(instance_id = %id, graph = graph_id, "Instance created");
        self.instances.push(list);
        Ok(id)
    }

    fn prepare_nodes(&self, blueprint: &Blueprint) -> Vec<ActionNode> {
        blueprint
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| {
                let behaviour = match self.node_registry.get(&node.kind) {
                    Some(def) => match def.prepare(node.params.clone()) {
                        Ok(b) => Some(b),
                        Err(e) => {
                            warn!(graph = %blueprint.id, index, kind = %node.kind, error = %e, "Node failed to prepare, passing over it");
                            None
                        }
                    },
                    None => {
                        warn!(graph = %blueprint.id, index, kind = %node.kind, "No definition for node kind, passing over it");
                        None
                    }
                };
                ActionNode::from_blueprint(node, behaviour)
            })
            .collect()
    }

    fn with_list<R>(&mut self, id: InstanceId, f: impl FnOnce(&mut ActionList, &mut Services<'_>) -> R) -> Option<R> {
        let Engine { instances, registry, events, clock, variables, syscall, config, scene_loading, .. } = self;
        let list = instances.iter_mut().find(|l| l.id() == id)?;
        let mut services = Services {
            clock: &*clock,
            variables: &*variables,
            registry,
            events,
            syscall,
            config: &*config,
            scene_loading: *scene_loading,
        };
        Some(f(list, &mut services))
    }

    /// Applies buffered cross-graph commands, including those raised while applying.
    fn flush_commands(&mut self) {
        let mut budget = self.config.max_commands_per_flush;
        loop {
            let commands = self.syscall.drain();
            if commands.is_empty() {
                return;
            }
            for command in commands {
                if budget == 0 {
                    error!(limit = self.config.max_commands_per_flush, "Command budget exhausted, dropping the rest");
                    self.syscall.drain();
                    return;
                }
                budget -= 1;
                self.apply(command);
            }
        }
    }

    fn apply(&mut self, command: Command) {
        debug!(?command, "Applying command");
        match command {
            Command::Start { graph_id, start_index, add_to_skip_queue, skip } => {
                let options = TriggerOptions {
                    start_index: Some(start_index),
                    add_to_skip_queue,
                    skip,
                    ..TriggerOptions::default()
                };
                if let Err(e) = self.start_internal(&graph_id, options) {
                    warn!(graph = %graph_id, error = %e, "Cannot start graph");
                }
            }
            Command::Kill { graph_id } => {
                self.kill_graph_internal(&graph_id);
            }
            Command::Pause { graph_id } => {
                for id in self.instances_of(&graph_id) {
                    self.with_list(id, |list, sv| list.pause(sv));
                }
            }
            Command::Resume { graph_id, rerun } => {
                if let Err(e) = self.resume_paused_internal(&graph_id, rerun) {
                    warn!(graph = %graph_id, error = %e, "Cannot resume graph");
                }
            }
            Command::Skip { graph_id } => {
                for id in self.instances_of(&graph_id) {
                    self.with_list(id, |list, sv| {
                        if list.is_running() {
                            list.skip(list.start_index(), sv);
                        }
                    });
                }
            }
        }
    }

    fn resume_paused_internal(&mut self, graph_id: &str, rerun_actions: bool) -> EngineResult<Vec<InstanceId>> {
        if !self.blueprints.contains_key(graph_id) {
            return Err(EngineError::UnknownGraph(graph_id.to_string()));
        }
        let mut resumed = Vec::new();

        let attached: Vec<_> = self
            .registry
            .records()
            .iter()
            .filter(|r| r.graph_id == graph_id && r.is_paused())
            .filter_map(|r| r.instance_id.map(|id| (id, r.clone())))
            .collect();
        for (id, record) in attached {
            let done = self.with_list(id, |list, sv| {
                list.resume(record.start_index, &record.resume_indices, &record.parameter_data, rerun_actions, sv)
            });
            if done.is_some() {
                resumed.push(id);
            }
        }

        while let Some(record) = self.registry.take_detached_paused(graph_id) {
            let id = self.spawn(graph_id)?;
            self.with_list(id, |list, sv| {
                list.set_conversation_on_end(record.conversation_on_end.clone());
                list.resume(record.start_index, &record.resume_indices, &record.parameter_data, rerun_actions, sv);
            });
            resumed.push(id);
        }

        if resumed.is_empty() {
            debug!(graph = graph_id, "Nothing paused to resume");
        }
        Ok(resumed)
    }

    fn kill_graph_internal(&mut self, graph_id: &str) -> usize {
        let ids = self.instances_of(graph_id);
        for &id in &ids {
            self.with_list(id, |list, sv| list.kill(sv));
            self.release_instance(id);
        }
        self.registry.remove_detached(graph_id);
        ids.len()
    }

    fn release_instance(&mut self, id: InstanceId) {
        if let Some(pos) = self.instances.iter().position(|l| l.id() == id) {
            let list = self.instances.remove(pos);
            self.park(list);
        }
    }

    /// Returns a single-instance list's nodes to the cache for the next trigger.
    fn park(&mut self, list: ActionList) {
        if list.settings().multi_instance {
            return;
        }
        let current = self.blueprints.get(list.graph_id()).map(|b| b.value().clone());
        let fresh = match (current, list.template()) {
            (Some(current), Some(template)) => Arc::ptr_eq(&current, template),
            _ => false,
        };
        if fresh {
            let graph_id = list.graph_id().to_string();
            self.executable_cache.insert(graph_id, list.into_nodes());
        }
    }

    /// Drops instances that are done and have no record worth keeping.
    fn collect_finished(&mut self) {
        self.registry.purge();
        let mut kept = Vec::with_capacity(self.instances.len());
        for list in std::mem::take(&mut self.instances) {
            let survives = list.settings().survive_scene_change;
            let done = match list.state() {
                ListState::Finished => !survives,
                ListState::Idle => !survives && self.registry.record(list.id()).is_none(),
                ListState::Running | ListState::Paused => false,
            };
            if done {
                debug!(instance_id = %list.id(), graph = %list.graph_id(), "Instance released");
                self.park(list);
            } else {
                kept.push(list);
            }
        }
        self.instances = kept;
    }
}
