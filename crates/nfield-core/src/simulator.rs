//! The simulator: element ownership, wiring, and the tick loop.
//!
//! A [`Simulator`] owns a set of labelled elements and the connections
//! between them. On every tick it binds, for each element in turn, the
//! ordered sequence of input views declared by the wiring, then steps the
//! element. Elements step in registration order: neural-field architectures
//! are inherently recurrent (field → interaction kernel → field), so no
//! topological order can exist in general, and a connection whose producer
//! steps later in the tick simply delivers the previous tick's output.
//!
//! The simulator advances time as `t_zero + tick * delta_t` with an integer
//! tick counter, so repeated stepping accumulates no floating-point drift.

use crate::element::{expect_input_count, Element, FloatValue, Time};
use crate::errors::{NFieldError, NFieldResult};
use petgraph::dot::{Config, Dot};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Graph;
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;

use ndarray::{ArrayD, ArrayViewD};

/// A directed graph with elements as nodes and signal routes as edges.
pub type EGraph = Graph<RefCell<Box<dyn Element>>, Connection>;

/// Edge weight describing one signal route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Output component read from the source; `None` means its default.
    pub component: Option<String>,
    /// Position in the target's ordered input sequence.
    pub slot: usize,
}

/// Build a new simulator from a set of elements and connections.
///
/// The builder validates the wiring (unique labels, known endpoints,
/// declared source components, input arity) before any element is stepped,
/// so misconfiguration fails at build time rather than mid-run.
pub struct SimulatorBuilder {
    elements: Vec<Box<dyn Element>>,
    connections: Vec<(String, Option<String>, String)>,
    t_zero: Time,
    t_max: Time,
    delta_t: Time,
}

impl SimulatorBuilder {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            connections: Vec::new(),
            t_zero: 0.0,
            t_max: 100.0,
            delta_t: 1.0,
        }
    }

    /// Set the time window and step width of the simulation.
    pub fn with_time(mut self, t_zero: Time, t_max: Time, delta_t: Time) -> Self {
        self.t_zero = t_zero;
        self.t_max = t_max;
        self.delta_t = delta_t;
        self
    }

    /// Register an element. Registration order is step order.
    pub fn with_element(mut self, element: Box<dyn Element>) -> Self {
        self.elements.push(element);
        self
    }

    /// Route the source element's default output component into the next
    /// free input slot of the target.
    pub fn with_connection(mut self, source: &str, target: &str) -> Self {
        self.connections
            .push((source.to_string(), None, target.to_string()));
        self
    }

    /// Route a named output component of the source into the next free input
    /// slot of the target.
    pub fn with_component_connection(mut self, source: &str, component: &str, target: &str) -> Self {
        self.connections
            .push((source.to_string(), Some(component.to_string()), target.to_string()));
        self
    }

    /// Validate the wiring and assemble a concrete simulator.
    pub fn build(self) -> NFieldResult<Simulator> {
        if self.delta_t <= 0.0 {
            return Err(NFieldError::UnsupportedConfiguration {
                element: "simulator".to_string(),
                reason: format!("delta_t must be positive, got {}", self.delta_t),
            });
        }

        let mut graph: EGraph = Graph::new();
        let mut label_index: HashMap<String, NodeIndex> = HashMap::new();
        let mut order = Vec::with_capacity(self.elements.len());

        for element in self.elements {
            let label = element.label().to_string();
            if label_index.contains_key(&label) {
                return Err(NFieldError::DuplicateLabel(label));
            }
            let node = graph.add_node(RefCell::new(element));
            label_index.insert(label, node);
            order.push(node);
        }

        let mut slots: HashMap<NodeIndex, usize> = HashMap::new();
        for (source, component, target) in &self.connections {
            let source_node = *label_index
                .get(source)
                .ok_or_else(|| NFieldError::UnknownElement(source.clone()))?;
            let target_node = *label_index
                .get(target)
                .ok_or_else(|| NFieldError::UnknownElement(target.clone()))?;
            if source_node == target_node {
                return Err(NFieldError::UnsupportedConfiguration {
                    element: target.clone(),
                    reason: "an element cannot be wired to itself; route self-coupling through \
                             an interaction element"
                        .to_string(),
                });
            }

            // Component names are validated against the source's declared
            // table here so a typo fails at build time.
            if let Some(name) = component {
                let element = graph[source_node].borrow();
                if !element.components().contains(name) {
                    return Err(NFieldError::UnknownComponent {
                        element: source.clone(),
                        name: name.clone(),
                    });
                }
            }

            if source_node.index() > target_node.index() {
                log::debug!(
                    "{} is stepped after {}; the connection delivers the previous tick's output",
                    source,
                    target
                );
            }

            let slot = slots.entry(target_node).or_insert(0);
            graph.add_edge(
                source_node,
                target_node,
                Connection {
                    component: component.clone(),
                    slot: *slot,
                },
            );
            *slot += 1;
        }

        let mut bindings: Vec<Vec<(NodeIndex, Option<String>)>> = vec![Vec::new(); graph.node_count()];
        for &node in &order {
            let mut incoming: Vec<(usize, NodeIndex, Option<String>)> = graph
                .edges_directed(node, petgraph::Direction::Incoming)
                .map(|edge| {
                    (
                        edge.weight().slot,
                        edge.source(),
                        edge.weight().component.clone(),
                    )
                })
                .collect();
            incoming.sort_by_key(|(slot, _, _)| *slot);

            let element = graph[node].borrow();
            expect_input_count(element.label(), element.input_arity(), incoming.len())?;
            drop(element);

            bindings[node.index()] = incoming
                .into_iter()
                .map(|(_, source, component)| (source, component))
                .collect();
        }

        let num_ticks = ((self.t_max - self.t_zero) / self.delta_t).round() as usize;
        log::debug!(
            "built simulator with {} elements, {} connections, {} ticks",
            order.len(),
            graph.edge_count(),
            num_ticks
        );

        Ok(Simulator {
            elements: graph,
            order,
            bindings,
            label_index,
            t_zero: self.t_zero,
            delta_t: self.delta_t,
            num_ticks,
            tick: 0,
            initialized: false,
        })
    }
}

impl Default for SimulatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A wired set of elements advanced together over discrete ticks.
///
/// Execution is single-threaded and synchronous. Output buffers are owned
/// and written exclusively by their producing element; during a tick the
/// simulator holds shared borrows of the producers while the consumer steps
/// under an exclusive borrow, which makes any aliasing mistake a loud
/// runtime failure rather than silent corruption.
#[derive(Debug, Serialize, Deserialize)]
pub struct Simulator {
    elements: EGraph,
    /// Step order: registration order of the elements.
    order: Vec<NodeIndex>,
    /// Per node (by index), the ordered input sources resolved from the wiring.
    bindings: Vec<Vec<(NodeIndex, Option<String>)>>,
    label_index: HashMap<String, NodeIndex>,
    t_zero: Time,
    delta_t: Time,
    num_ticks: usize,
    tick: usize,
    initialized: bool,
}

impl Simulator {
    /// Initialise every element in step order and reset the tick counter.
    ///
    /// Must run before the first `step()` and after any reconfiguration that
    /// dirtied elements; `run()` calls it automatically when needed.
    pub fn init(&mut self) -> NFieldResult<()> {
        for &node in &self.order {
            self.elements[node].borrow_mut().init()?;
        }
        self.tick = 0;
        self.initialized = true;
        Ok(())
    }

    /// Advance the simulation one tick.
    ///
    /// Each element receives the ordered input views resolved from the
    /// wiring and the time value of the new tick. If any element fails the
    /// error is surfaced unchanged and `current_time()` does not advance.
    pub fn step(&mut self) -> NFieldResult<()> {
        let time = self.t_zero + (self.tick + 1) as FloatValue * self.delta_t;
        for &node in &self.order {
            self.step_element_node(node, time)?;
        }
        self.tick += 1;
        Ok(())
    }

    fn step_element_node(&self, node: NodeIndex, time: Time) -> NFieldResult<()> {
        let bindings = &self.bindings[node.index()];
        let sources: Vec<Ref<'_, Box<dyn Element>>> = bindings
            .iter()
            .map(|(source, _)| self.elements[*source].borrow())
            .collect();
        let views: Vec<ArrayViewD<'_, FloatValue>> = sources
            .iter()
            .zip(bindings)
            .map(|(source, (_, component))| source.output(component.as_deref()))
            .collect::<NFieldResult<_>>()?;
        self.elements[node].borrow_mut().step(time, self.delta_t, &views)
    }

    /// Step until the end of the time window, initialising first if needed.
    pub fn run(&mut self) -> NFieldResult<()> {
        if !self.initialized {
            self.init()?;
        }
        while !self.finished() {
            self.step()?;
        }
        Ok(())
    }

    /// The time value of the most recently completed tick.
    pub fn current_time(&self) -> Time {
        self.t_zero + self.tick as FloatValue * self.delta_t
    }

    pub fn delta_t(&self) -> Time {
        self.delta_t
    }

    /// True once the simulation has reached the end of its time window.
    pub fn finished(&self) -> bool {
        self.tick >= self.num_ticks
    }

    fn node(&self, label: &str) -> NFieldResult<NodeIndex> {
        self.label_index
            .get(label)
            .copied()
            .ok_or_else(|| NFieldError::UnknownElement(label.to_string()))
    }

    /// Borrow an element for inspection.
    ///
    /// The guard must be dropped before the simulator steps again.
    pub fn element(&self, label: &str) -> NFieldResult<Ref<'_, Box<dyn Element>>> {
        Ok(self.elements[self.node(label)?].borrow())
    }

    /// Borrow an element for reconfiguration between ticks.
    pub fn element_mut(&mut self, label: &str) -> NFieldResult<RefMut<'_, Box<dyn Element>>> {
        Ok(self.elements[self.node(label)?].borrow_mut())
    }

    /// Owned snapshot of a named output component, for consumers that keep
    /// data across ticks (plotting, storage).
    pub fn get_output(
        &self,
        label: &str,
        component: Option<&str>,
    ) -> NFieldResult<ArrayD<FloatValue>> {
        Ok(self.element(label)?.output(component)?.to_owned())
    }

    /// Set one parameter of one element by name.
    ///
    /// If the parameter requires re-initialisation the element becomes dirty
    /// and [`Simulator::init_element`] (or a full `init()`) must run before
    /// the next tick.
    pub fn set_element_parameter(
        &mut self,
        label: &str,
        name: &str,
        value: crate::parameters::ParamValue,
    ) -> NFieldResult<()> {
        self.element_mut(label)?.set_parameter(name, value)
    }

    /// Re-initialise a single element after reconfiguration.
    pub fn init_element(&mut self, label: &str) -> NFieldResult<()> {
        self.element_mut(label)?.init()
    }

    /// Create a diagram that represents the element graph.
    ///
    /// Useful for debugging.
    pub fn as_dot(&self) -> Dot<'_, &EGraph> {
        Dot::with_attr_getters(
            &self.elements,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &|_, er| {
                format!(
                    "label = {:?}",
                    er.weight().component.as_deref().unwrap_or("")
                )
            },
            &|_, (_, cell)| format!("label = {:?}", cell.borrow().label()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Phase;
    use crate::example_elements::{TestRelay, TestStimulus};
    use crate::parameters::ParamValue;

    fn chain() -> Simulator {
        SimulatorBuilder::new()
            .with_time(0.0, 5.0, 1.0)
            .with_element(Box::new(TestStimulus::new("stim", 4, 2.0)))
            .with_element(Box::new(TestRelay::new("relay", 4)))
            .with_connection("stim", "relay")
            .build()
            .unwrap()
    }

    #[test]
    fn step_and_run() {
        let mut sim = chain();
        sim.init().unwrap();
        assert_eq!(sim.current_time(), 0.0);

        sim.step().unwrap();
        sim.step().unwrap();
        assert_eq!(sim.current_time(), 2.0);

        sim.run().unwrap();
        assert!(sim.finished());
        assert_eq!(sim.current_time(), 5.0);

        let relayed = sim.get_output("relay", None).unwrap();
        assert_eq!(relayed.shape(), &[4]);
        assert!(relayed.iter().all(|&v| v == 2.0));
    }

    #[test]
    fn run_initialises_automatically() {
        let mut sim = chain();
        sim.run().unwrap();
        assert!(sim.finished());
    }

    #[test]
    fn bare_step_without_init_fails_and_time_stands_still() {
        let mut sim = chain();
        let err = sim.step().unwrap_err();
        assert!(matches!(err, NFieldError::StaleState { .. }));
        assert_eq!(sim.current_time(), 0.0);
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let err = SimulatorBuilder::new()
            .with_element(Box::new(TestStimulus::new("stim", 4, 1.0)))
            .with_element(Box::new(TestStimulus::new("stim", 4, 1.0)))
            .build()
            .unwrap_err();
        assert!(matches!(err, NFieldError::DuplicateLabel(label) if label == "stim"));
    }

    #[test]
    fn unknown_endpoints_are_rejected() {
        let err = SimulatorBuilder::new()
            .with_element(Box::new(TestStimulus::new("stim", 4, 1.0)))
            .with_connection("stim", "nowhere")
            .build()
            .unwrap_err();
        assert!(matches!(err, NFieldError::UnknownElement(label) if label == "nowhere"));
    }

    #[test]
    fn undeclared_source_component_is_rejected_at_build() {
        let err = SimulatorBuilder::new()
            .with_element(Box::new(TestStimulus::new("stim", 4, 1.0)))
            .with_element(Box::new(TestRelay::new("relay", 4)))
            .with_component_connection("stim", "activation", "relay")
            .build()
            .unwrap_err();
        assert!(matches!(err, NFieldError::UnknownComponent { .. }));
    }

    #[test]
    fn arity_is_validated_at_build() {
        // Relay expects exactly one input but none are wired.
        let err = SimulatorBuilder::new()
            .with_element(Box::new(TestStimulus::new("stim", 4, 1.0)))
            .with_element(Box::new(TestRelay::new("relay", 4)))
            .build()
            .unwrap_err();
        assert!(matches!(err, NFieldError::InputArityMismatch { .. }));
    }

    #[test]
    fn self_connection_is_rejected() {
        let err = SimulatorBuilder::new()
            .with_element(Box::new(TestRelay::new("relay", 4)))
            .with_connection("relay", "relay")
            .build()
            .unwrap_err();
        assert!(matches!(err, NFieldError::UnsupportedConfiguration { .. }));
    }

    #[test]
    fn recurrent_wiring_reads_the_previous_tick() {
        // relay_b is registered after relay_a but feeds it, so relay_a sees
        // relay_b's output from the previous tick: a one-tick delay line.
        let mut sim = SimulatorBuilder::new()
            .with_time(0.0, 3.0, 1.0)
            .with_element(Box::new(TestRelay::new("relay_a", 1)))
            .with_element(Box::new(TestStimulus::new("stim", 1, 7.0)))
            .with_element(Box::new(TestRelay::new("relay_b", 1)))
            .with_connection("relay_b", "relay_a")
            .with_connection("stim", "relay_b")
            .build()
            .unwrap();
        sim.init().unwrap();

        sim.step().unwrap();
        // relay_b has not stepped yet when relay_a reads it.
        assert_eq!(sim.get_output("relay_a", None).unwrap()[[0]], 0.0);
        assert_eq!(sim.get_output("relay_b", None).unwrap()[[0]], 7.0);

        sim.step().unwrap();
        assert_eq!(sim.get_output("relay_a", None).unwrap()[[0]], 7.0);
    }

    #[test]
    fn reconfigure_between_ticks() {
        let mut sim = chain();
        sim.init().unwrap();
        sim.step().unwrap();

        sim.set_element_parameter("stim", "value", ParamValue::Scalar(9.0))
            .unwrap();
        assert_eq!(sim.element("stim").unwrap().lifecycle().phase(), Phase::Dirty);

        // Stepping now fails because the stimulus is dirty.
        let err = sim.step().unwrap_err();
        assert!(matches!(err, NFieldError::StaleState { .. }));

        sim.init_element("stim").unwrap();
        sim.step().unwrap();
        assert!(sim
            .get_output("relay", None)
            .unwrap()
            .iter()
            .all(|&v| v == 9.0));
    }

    #[test]
    fn dot() {
        let sim = chain();
        let rendered = format!("{:?}", sim.as_dot());
        assert!(rendered.contains("label = \"stim\""));
        assert!(rendered.contains("label = \"relay\""));
    }

    #[test]
    fn serialise_and_deserialise_simulator() {
        let mut sim = chain();
        sim.init().unwrap();
        sim.step().unwrap();

        let serialised = serde_json::to_string(&sim).unwrap();
        let mut restored: Simulator = serde_json::from_str(&serialised).unwrap();

        assert_eq!(restored.current_time(), sim.current_time());
        assert_eq!(
            restored.get_output("relay", None).unwrap(),
            sim.get_output("relay", None).unwrap()
        );

        restored.run().unwrap();
        assert!(restored.finished());
    }
}
