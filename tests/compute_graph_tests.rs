// Host-side tests for the ping-pong compute graph, using a backend that only
// records what the graph asks of it.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use app_core::{ComputeBackend, ComputeGraph, EngineError, GraphState, VariableId};

#[derive(Default)]
struct Log {
    next_target: u32,
    runs: Vec<(String, Vec<u32>, u32)>,
    released_targets: Vec<u32>,
    released_passes: Vec<String>,
    released_sources: usize,
    seeded: Vec<u32>,
}

struct RecordingBackend {
    log: Rc<RefCell<Log>>,
    supported: bool,
}

impl RecordingBackend {
    fn new(supported: bool) -> (Self, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        (
            Self {
                log: log.clone(),
                supported,
            },
            log,
        )
    }
}

impl ComputeBackend for RecordingBackend {
    type Target = u32;
    type Source = ();
    type Shader = &'static str;
    type Pass = String;

    fn check_capabilities(&self, _width: u32) -> Result<(), String> {
        if self.supported {
            Ok(())
        } else {
            Err("no float render targets".into())
        }
    }

    fn create_target(&mut self, _label: &str, _width: u32) -> u32 {
        let mut log = self.log.borrow_mut();
        log.next_target += 1;
        log.next_target
    }

    fn seed_target(&mut self, _source: &(), target: &mut u32) {
        self.log.borrow_mut().seeded.push(*target);
    }

    fn create_pass(&mut self, _label: &str, shader: &'static str, _input_count: usize) -> String {
        shader.to_string()
    }

    fn run_pass(&mut self, pass: &String, inputs: &[&u32], output: &mut u32) {
        let inputs = inputs.iter().map(|t| **t).collect();
        self.log
            .borrow_mut()
            .runs
            .push((pass.clone(), inputs, *output));
    }

    fn release_target(&mut self, target: u32) {
        self.log.borrow_mut().released_targets.push(target);
    }

    fn release_pass(&mut self, pass: String) {
        self.log.borrow_mut().released_passes.push(pass);
    }

    fn release_source(&mut self, _source: ()) {
        self.log.borrow_mut().released_sources += 1;
    }
}

type Fixture = (
    ComputeGraph<RecordingBackend>,
    Rc<RefCell<Log>>,
    VariableId,
    VariableId,
);

fn two_variable_graph(supported: bool) -> Fixture {
    let (backend, log) = RecordingBackend::new(supported);
    let mut graph = ComputeGraph::new(8, backend);
    let vel = graph.add_variable("velocity", "vel_pass", ()).unwrap();
    let pos = graph.add_variable("position", "pos_pass", ()).unwrap();
    graph.set_dependencies(vel, &[pos, vel]).unwrap();
    graph.set_dependencies(pos, &[pos, vel]).unwrap();
    (graph, log, vel, pos)
}

#[test]
fn every_target_is_seeded_from_its_initial_value() {
    let (_graph, log, _, _) = two_variable_graph(true);
    let seeded = log.borrow().seeded.clone();
    assert_eq!(seeded, vec![1, 2, 3, 4]);
}

#[test]
fn current_index_alternates_and_passes_never_read_their_output() {
    let (mut graph, log, _, pos) = two_variable_graph(true);
    graph.init().unwrap();
    assert_eq!(graph.current_index(), 0);

    let mut seen = Vec::new();
    for _ in 0..6 {
        let before = *graph.current_target(pos).unwrap();
        graph.compute().unwrap();
        seen.push(graph.current_index());
        let after = *graph.current_target(pos).unwrap();
        assert_ne!(before, after, "position must move to the other bank");
    }
    assert_eq!(seen, vec![1, 0, 1, 0, 1, 0]);

    let log = log.borrow();
    assert_eq!(log.runs.len(), 12);
    for (pass, inputs, output) in &log.runs {
        assert!(
            !inputs.contains(output),
            "{pass} read the target it was writing"
        );
    }
    // Registration order within a batch.
    assert_eq!(log.runs[0].0, "vel_pass");
    assert_eq!(log.runs[1].0, "pos_pass");
    // Both passes of one batch read the same bank.
    assert_eq!(log.runs[0].1, log.runs[1].1);
}

#[test]
fn dispose_releases_everything_exactly_once() {
    let (mut graph, log, _, _) = two_variable_graph(true);
    graph.init().unwrap();
    graph.compute().unwrap();
    graph.dispose();
    graph.dispose();
    assert_eq!(graph.state(), GraphState::Disposed);
    assert_eq!(graph.compute(), Err(EngineError::Disposed));
    drop(graph);

    let log = log.borrow();
    let unique: HashSet<_> = log.released_targets.iter().collect();
    assert_eq!(log.released_targets.len(), 4);
    assert_eq!(unique.len(), 4);
    assert_eq!(log.released_passes.len(), 2);
    assert_eq!(log.released_sources, 2);
}

#[test]
fn drop_disposes_an_uninitialized_graph() {
    let (graph, log, _, _) = two_variable_graph(true);
    drop(graph);
    let log = log.borrow();
    assert_eq!(log.released_targets.len(), 4);
    assert!(log.released_passes.is_empty());
}

#[test]
fn capability_failure_keeps_the_graph_from_computing() {
    let (mut graph, log, _, _) = two_variable_graph(false);
    let err = graph.init().unwrap_err();
    assert!(matches!(err, EngineError::Capability(_)));
    assert_eq!(graph.state(), GraphState::Failed);
    assert_eq!(graph.compute(), Err(EngineError::NotReady));
    assert!(log.borrow().runs.is_empty());
}

#[test]
fn compute_before_init_is_rejected() {
    let (mut graph, _, _, _) = two_variable_graph(true);
    assert_eq!(graph.compute(), Err(EngineError::NotReady));
}

#[test]
fn registration_errors() {
    let (backend, _) = RecordingBackend::new(true);
    let mut graph = ComputeGraph::new(4, backend);
    let a = graph.add_variable("a", "a", ()).unwrap();
    assert_eq!(
        graph.add_variable("a", "a2", ()),
        Err(EngineError::DuplicateVariable("a".into()))
    );
    assert_eq!(
        graph.set_dependencies(VariableId(7), &[a]),
        Err(EngineError::UnknownVariable(7))
    );
    assert_eq!(graph.find_variable("a"), Some(a));
    assert_eq!(graph.variable_name(a), Some("a"));

    graph.init().unwrap();
    assert_eq!(
        graph.add_variable("b", "b", ()),
        Err(EngineError::AlreadyInitialized)
    );
    assert_eq!(
        graph.set_dependencies(a, &[]),
        Err(EngineError::AlreadyInitialized)
    );
}

#[test]
fn foreign_and_duplicate_dependencies_fail_init() {
    let (backend, _) = RecordingBackend::new(true);
    let mut graph = ComputeGraph::new(4, backend);
    let a = graph.add_variable("a", "a", ()).unwrap();
    graph.set_dependencies(a, &[VariableId(3)]).unwrap();
    assert!(matches!(
        graph.init(),
        Err(EngineError::InvalidDependency { .. })
    ));

    let (backend, _) = RecordingBackend::new(true);
    let mut graph = ComputeGraph::new(4, backend);
    let a = graph.add_variable("a", "a", ()).unwrap();
    graph.set_dependencies(a, &[a, a]).unwrap();
    assert!(matches!(
        graph.init(),
        Err(EngineError::InvalidDependency { .. })
    ));
}

#[test]
fn self_dependency_reads_the_previous_bank() {
    let (backend, log) = RecordingBackend::new(true);
    let mut graph = ComputeGraph::new(4, backend);
    let a = graph.add_variable("a", "a", ()).unwrap();
    graph.set_dependencies(a, &[a]).unwrap();
    graph.init().unwrap();
    graph.compute().unwrap();
    graph.compute().unwrap();
    let log = log.borrow();
    let runs = &log.runs;
    // targets 1 (bank 0) and 2 (bank 1)
    assert_eq!(runs[0].1, vec![1]);
    assert_eq!(runs[0].2, 2);
    assert_eq!(runs[1].1, vec![2]);
    assert_eq!(runs[1].2, 1);
}
