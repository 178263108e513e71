use uuid::Uuid;
use crate::config::EngineConfig;
use crate::runtime::blueprint::NodeIndex;
use crate::runtime::clock::Clock;
use crate::runtime::events::EventBus;
use crate::runtime::registry::ActiveListManager;
use crate::runtime::syscall::Syscall;
use crate::runtime::variables::Variables;

pub type InstanceId = Uuid;

/// Engine-owned collaborators lent to a list for one operation.
pub struct Services<'a> {
    pub clock: &'a Clock,
    pub variables: &'a Variables,
    pub registry: &'a mut ActiveListManager,
    pub events: &'a mut EventBus,
    pub syscall: &'a mut Syscall,
    pub config: &'a EngineConfig,
    pub scene_loading: bool,
}

/// What a node sees while it runs.
pub struct Context<'a> {
    pub instance_id: InstanceId,
    pub graph_id: &'a str,
    pub node_index: NodeIndex,
    pub is_skipping: bool,
    pub clock: &'a Clock,
    pub variables: &'a Variables,
    registry: &'a ActiveListManager,
    syscall: &'a mut Syscall,
    running: bool,
}

impl<'a> Context<'a> {
    pub fn new(
        instance_id: InstanceId,
        graph_id: &'a str,
        node_index: NodeIndex,
        is_skipping: bool,
        services: &'a mut Services<'_>,
    ) -> Self {
        Self {
            instance_id,
            graph_id,
            node_index,
            is_skipping,
            clock: services.clock,
            variables: services.variables,
            registry: &*services.registry,
            syscall: &mut *services.syscall,
            running: false,
        }
    }

    /// Whether the node is mid-execution. Set it in `run` to be called again later.
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn syscall(&mut self) -> &mut Syscall {
        self.syscall
    }

    pub fn is_graph_running(&self, graph_id: &str) -> bool {
        self.registry.is_graph_running(graph_id)
    }
}
