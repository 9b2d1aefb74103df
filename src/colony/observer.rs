use tracing::{debug, info, trace};

use crate::colony::agent::{Agent, AgentId, DeathEvent};
use crate::colony::statistics::TickStatistics;
use crate::geometry::Position;

/// Receives colony events as they happen.
///
/// The colony never logs on its own; whoever drives it decides where the
/// events go. All methods default to no-ops.
pub trait ColonyObserver {
    fn agent_added(&mut self, _agent: &Agent) {}

    fn agent_moved(&mut self, _agent: AgentId, _from: Position, _to: Position) {}

    /// A chosen move left the grid or collided and was reverted.
    fn move_rejected(&mut self, _agent: AgentId, _from: Position, _to: Position) {}

    fn agent_died(&mut self, _tick: u64, _event: &DeathEvent) {}

    fn tick_completed(&mut self, _statistics: &TickStatistics) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ColonyObserver for NullObserver {}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ColonyObserver for TracingObserver {
    fn agent_added(&mut self, agent: &Agent) {
        debug!(
            agent = %agent.id(),
            position = %agent.position(),
            body_radius = agent.body_radius(),
            "Agent added"
        );
    }

    fn agent_moved(&mut self, agent: AgentId, from: Position, to: Position) {
        trace!(%agent, %from, %to, "Agent moved");
    }

    fn move_rejected(&mut self, agent: AgentId, from: Position, to: Position) {
        debug!(%agent, %from, %to, "Move rejected");
    }

    fn agent_died(&mut self, tick: u64, event: &DeathEvent) {
        info!(
            tick,
            agent = %event.agent,
            position = %event.position,
            core_temp = event.core_temp,
            cause = ?event.cause,
            "Agent died"
        );
    }

    fn tick_completed(&mut self, statistics: &TickStatistics) {
        debug!(
            tick = statistics.tick,
            alive = statistics.alive,
            deaths = statistics.deaths_this_tick,
            moves = statistics.moves_committed,
            rejected = statistics.moves_rejected,
            mean_core_temp = statistics.mean_core_temp,
            "Tick complete"
        );
    }
}

/// Fans events out to both observers, left first.
impl<A: ColonyObserver, B: ColonyObserver> ColonyObserver for (A, B) {
    fn agent_added(&mut self, agent: &Agent) {
        self.0.agent_added(agent);
        self.1.agent_added(agent);
    }

    fn agent_moved(&mut self, agent: AgentId, from: Position, to: Position) {
        self.0.agent_moved(agent, from, to);
        self.1.agent_moved(agent, from, to);
    }

    fn move_rejected(&mut self, agent: AgentId, from: Position, to: Position) {
        self.0.move_rejected(agent, from, to);
        self.1.move_rejected(agent, from, to);
    }

    fn agent_died(&mut self, tick: u64, event: &DeathEvent) {
        self.0.agent_died(tick, event);
        self.1.agent_died(tick, event);
    }

    fn tick_completed(&mut self, statistics: &TickStatistics) {
        self.0.tick_completed(statistics);
        self.1.tick_completed(statistics);
    }
}
