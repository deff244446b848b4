//! Filter lifecycle wrapper.
//!
//! A [`VersioningFilter`] is what a filter chain talks to: it is created
//! around a sink, initialized once from arguments, fed events, then shut
//! down. Events outside the running phase are dropped with a warning.

use tracing::{error, info, warn};

use crate::config::FilterConfig;
use crate::engine::{EngineStats, VersioningEngine};
use crate::sink::Sink;
use crate::types::{Edge, Event, Vertex};

enum Phase<S: Sink> {
    Uninitialized(S),
    Running(VersioningEngine<S>),
    ShutDown(S),
    // Only observable if a transition panics midway
    Poisoned,
}

/// Versioning filter: `initialize` → `put_vertex`/`put_edge` → `shutdown`.
pub struct VersioningFilter<S: Sink> {
    phase: Phase<S>,
    final_stats: Option<EngineStats>,
}

impl<S: Sink> VersioningFilter<S> {
    /// Uninitialized filter feeding `sink`.
    pub fn new(sink: S) -> Self {
        Self {
            phase: Phase::Uninitialized(sink),
            final_stats: None,
        }
    }

    /// Start the filter. Returns `false` if it is not in its initial state or
    /// the configuration is rejected; the filter then stays uninitialized.
    pub fn initialize(&mut self, config: &FilterConfig) -> bool {
        let sink = match std::mem::replace(&mut self.phase, Phase::Poisoned) {
            Phase::Uninitialized(sink) => sink,
            other => {
                warn!("Versioning filter already initialized");
                self.phase = other;
                return false;
            }
        };

        // Validated here so a rejected config leaves the sink in place
        if let Err(e) = config.validate() {
            error!(error = %e, "Rejecting versioning filter configuration");
            self.phase = Phase::Uninitialized(sink);
            return false;
        }
        info!(arguments = %config, "Versioning filter initialized");
        self.phase = Phase::Running(VersioningEngine::from_validated(config, sink));
        true
    }

    /// Parse `arguments` and start the filter.
    pub fn initialize_from_arguments(&mut self, arguments: &str) -> bool {
        info!(arguments, "Initializing versioning filter");
        match FilterConfig::from_arguments(arguments) {
            Ok(config) => self.initialize(&config),
            Err(e) => {
                error!(error = %e, "Invalid versioning filter arguments");
                false
            }
        }
    }

    /// Whether events are being processed.
    pub fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Running(_))
    }

    /// Accept one vertex.
    pub fn put_vertex(&mut self, vertex: &Vertex) {
        match &mut self.phase {
            Phase::Running(engine) => engine.put_vertex(vertex),
            _ => warn!("Versioning filter not running, dropping vertex"),
        }
    }

    /// Accept one edge.
    pub fn put_edge(&mut self, edge: &Edge) {
        match &mut self.phase {
            Phase::Running(engine) => engine.put_edge(edge),
            _ => warn!("Versioning filter not running, dropping edge"),
        }
    }

    /// Accept either kind of event.
    pub fn process(&mut self, event: &Event) {
        match event {
            Event::Vertex(vertex) => self.put_vertex(vertex),
            Event::Edge(edge) => self.put_edge(edge),
        }
    }

    /// Stop the filter. Returns `false` if it was not running.
    pub fn shutdown(&mut self) -> bool {
        match std::mem::replace(&mut self.phase, Phase::Poisoned) {
            Phase::Running(mut engine) => {
                self.final_stats = Some(engine.shutdown());
                self.phase = Phase::ShutDown(engine.into_sink());
                true
            }
            other => {
                warn!("Versioning filter shut down while not running");
                self.phase = other;
                false
            }
        }
    }

    /// The running engine, if any.
    pub fn engine(&self) -> Option<&VersioningEngine<S>> {
        match &self.phase {
            Phase::Running(engine) => Some(engine),
            _ => None,
        }
    }

    /// Counters from the running engine, or the final ones after shutdown.
    pub fn stats(&self) -> Option<EngineStats> {
        match &self.phase {
            Phase::Running(engine) => Some(*engine.stats()),
            _ => self.final_stats,
        }
    }

    /// The downstream sink, in any phase but a poisoned one.
    pub fn sink(&self) -> Option<&S> {
        match &self.phase {
            Phase::Uninitialized(sink) | Phase::ShutDown(sink) => Some(sink),
            Phase::Running(engine) => Some(engine.sink()),
            Phase::Poisoned => None,
        }
    }

    /// Consume the filter, returning the sink.
    pub fn into_sink(self) -> Option<S> {
        match self.phase {
            Phase::Uninitialized(sink) | Phase::ShutDown(sink) => Some(sink),
            Phase::Running(engine) => Some(engine.into_sink()),
            Phase::Poisoned => None,
        }
    }
}
